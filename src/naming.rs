//! Filename templates for downloaded episodes.
//!
//! A naming scheme is a small format string over two variables:
//! `{name}` (the anime name) and `{episode}` (the episode number). The episode
//! accepts a width with optional zero padding, e.g. `{episode:03d}` or
//! `{episode:3}`. Doubled braces (`{{`, `}}`) produce literal braces.
//!
//! The rendered name gets the fixed [`MEDIA_EXTENSION`] appended.

use std::fmt::Write as _;
use std::str::FromStr;

use thiserror::Error;

/// Extension of every downloaded episode.
pub const MEDIA_EXTENSION: &str = "mp4";

/// Scheme used when none is configured.
pub const DEFAULT_NAMING_SCHEME: &str = "{name} - {episode:03d}";

/// Errors produced while parsing a naming scheme.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// A placeholder refers to an unknown variable.
    #[error("unknown placeholder '{{{placeholder}}}' in naming scheme '{scheme}'\n  Suggestion: only {{name}} and {{episode}} are available")]
    UnknownPlaceholder {
        /// The full naming scheme.
        scheme: String,
        /// The placeholder body without braces.
        placeholder: String,
    },

    /// A placeholder format spec is not supported.
    #[error("unsupported format '{spec}' for {{{variable}}} in naming scheme '{scheme}'")]
    UnsupportedFormat {
        /// The full naming scheme.
        scheme: String,
        /// The variable the format was applied to.
        variable: String,
        /// The format spec after the colon.
        spec: String,
    },

    /// An opening or closing brace has no partner.
    #[error("unbalanced brace in naming scheme '{scheme}'")]
    UnbalancedBrace {
        /// The full naming scheme.
        scheme: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    Episode { width: usize, zero_pad: bool },
}

/// A parsed naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    source: String,
    segments: Vec<Segment>,
}

impl NamingScheme {
    /// Parses a naming scheme.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError`] for unknown placeholders, unsupported format
    /// specs and unbalanced braces.
    pub fn parse(scheme: &str) -> Result<Self, NamingError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = scheme.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(NamingError::UnbalancedBrace {
                        scheme: scheme.to_string(),
                    });
                }
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        body.push(inner);
                    }
                    if !closed {
                        return Err(NamingError::UnbalancedBrace {
                            scheme: scheme.to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(scheme, &body)?);
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: scheme.to_string(),
            segments,
        })
    }

    /// Returns the scheme text this was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the base name (without extension) for one episode.
    ///
    /// Path separators in the result are replaced with `_` so the file always
    /// lands directly in the destination directory.
    #[must_use]
    pub fn render(&self, name: &str, episode: u32) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Name => rendered.push_str(name),
                Segment::Episode { width, zero_pad: true } => {
                    let _ = write!(rendered, "{episode:0width$}");
                }
                Segment::Episode { width, zero_pad: false } => {
                    let _ = write!(rendered, "{episode:width$}");
                }
            }
        }
        rendered.replace(['/', '\\'], "_")
    }

    /// Renders the final filename for one episode, extension included.
    #[must_use]
    pub fn filename(&self, name: &str, episode: u32) -> String {
        format!("{}.{MEDIA_EXTENSION}", self.render(name, episode))
    }
}

impl Default for NamingScheme {
    fn default() -> Self {
        Self {
            source: DEFAULT_NAMING_SCHEME.to_string(),
            segments: vec![
                Segment::Name,
                Segment::Literal(" - ".to_string()),
                Segment::Episode {
                    width: 3,
                    zero_pad: true,
                },
            ],
        }
    }
}

impl FromStr for NamingScheme {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_placeholder(scheme: &str, body: &str) -> Result<Segment, NamingError> {
    let (variable, spec) = match body.split_once(':') {
        Some((variable, spec)) => (variable.trim(), Some(spec.trim())),
        None => (body.trim(), None),
    };

    match (variable, spec) {
        ("name", None | Some("" | "s")) => Ok(Segment::Name),
        ("episode", None) => Ok(Segment::Episode {
            width: 0,
            zero_pad: false,
        }),
        ("episode", Some(spec)) => parse_integer_spec(spec).ok_or_else(|| {
            NamingError::UnsupportedFormat {
                scheme: scheme.to_string(),
                variable: variable.to_string(),
                spec: spec.to_string(),
            }
        }),
        ("name", Some(spec)) => Err(NamingError::UnsupportedFormat {
            scheme: scheme.to_string(),
            variable: variable.to_string(),
            spec: spec.to_string(),
        }),
        _ => Err(NamingError::UnknownPlaceholder {
            scheme: scheme.to_string(),
            placeholder: body.to_string(),
        }),
    }
}

/// Accepts `d`, `3d`, `03d`, `3` and `03`.
fn parse_integer_spec(spec: &str) -> Option<Segment> {
    let digits = spec.strip_suffix('d').unwrap_or(spec);
    if digits.is_empty() {
        return Some(Segment::Episode {
            width: 0,
            zero_pad: false,
        });
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let zero_pad = digits.len() > 1 && digits.starts_with('0');
    let width = digits.parse::<usize>().ok()?;
    if width > 16 {
        return None;
    }
    Some(Segment::Episode { width, zero_pad })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scheme_pads_episode_to_three_digits() {
        let scheme = NamingScheme::default();
        assert_eq!(scheme.filename("One Piece", 7), "One Piece - 007.mp4");
        assert_eq!(scheme.filename("One Piece", 1234), "One Piece - 1234.mp4");
    }

    #[test]
    fn test_default_scheme_matches_parsed_default() {
        assert_eq!(
            NamingScheme::parse(DEFAULT_NAMING_SCHEME).unwrap(),
            NamingScheme::default()
        );
    }

    #[test]
    fn test_custom_scheme_formats() {
        let scheme = NamingScheme::parse("{name} E{episode:02}").unwrap();
        assert_eq!(scheme.render("Mushishi", 3), "Mushishi E03");

        let scheme = NamingScheme::parse("{episode} {name}").unwrap();
        assert_eq!(scheme.render("Mushishi", 3), "3 Mushishi");

        let scheme = NamingScheme::parse("{episode:4d}").unwrap();
        assert_eq!(scheme.render("x", 12), "  12");
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let scheme = NamingScheme::parse("{{{name}}} {episode}").unwrap();
        assert_eq!(scheme.render("K-On", 1), "{K-On} 1");
    }

    #[test]
    fn test_rendered_name_has_no_path_separators() {
        let scheme = NamingScheme::default();
        assert_eq!(scheme.render("Fate/Zero", 1), "Fate_Zero - 001");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = NamingScheme::parse("{title} - {episode}").unwrap_err();
        assert!(matches!(err, NamingError::UnknownPlaceholder { ref placeholder, .. } if placeholder == "title"));
    }

    #[test]
    fn test_unsupported_format_rejected() {
        assert!(matches!(
            NamingScheme::parse("{episode:x}").unwrap_err(),
            NamingError::UnsupportedFormat { .. }
        ));
        assert!(matches!(
            NamingScheme::parse("{name:03d}").unwrap_err(),
            NamingError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn test_unbalanced_braces_rejected() {
        for bad in ["{name", "name}", "{name} {episode"] {
            assert!(
                matches!(NamingScheme::parse(bad), Err(NamingError::UnbalancedBrace { .. })),
                "expected '{bad}' to be rejected"
            );
        }
    }
}
