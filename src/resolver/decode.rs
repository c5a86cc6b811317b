//! Pure decode pipeline turning a watch page body into a media URL.
//!
//! The site has used two shapes for its download anchor:
//!
//! - **Cipher**: the anchor's `href` is a JavaScript variable. The variable is
//!   assigned an escaped string literal that, after unescaping, an optional
//!   one-character substitution (`X=X.replace(/a/g,"b");`), base64 decoding
//!   and RC4 decryption, yields the URL.
//! - **Raw**: the anchor's `href` is the plain `http...` URL.
//!
//! [`detect_link_scheme`] probes the cipher shape first and falls back to the
//! raw shape. Nothing here performs I/O, so the pipeline is deterministic for
//! a given body.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use tracing::debug;
use url::Url;

use super::rc4::rc4_apply;
use super::{LinkKind, ParseFailure, ResolveOutcome, ResolvedUrl, SiteConfig};

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// `href='"+ X +"'><div class='dl2'>`
static ALIAS_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"href=['"]['"]\s*\+\s*(\w+)\s*\+\s*['"]['"]\s*>\s*<div\s+class=['"]dl2['"]"#,
    )
});

static RAW_ANCHOR_RES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        compile_static_regex(r#"<a\s+class=['"]an['"]\s+href=['"](https?://[^'"]+)['"]"#),
        compile_static_regex(
            r#"href=['"](https?://[^'"]+)['"]\s*>\s*<div\s+class=['"]dl2['"]"#,
        ),
    ]
});

/// Lenient about padding, like the browser's `atob`.
const BASE64_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The obfuscated link as found on a cipher-shaped page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherLink {
    /// Name of the JavaScript variable holding the link.
    pub variable: String,
    /// The string literal assigned to the variable, still escaped.
    pub escaped: String,
    /// Optional `(from, to)` substitution applied before base64 decoding.
    pub substitution: Option<(char, char)>,
}

impl CipherLink {
    /// Runs the unescape, substitute, base64 and RC4 stages.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseFailure`] of the first stage that rejects its input.
    pub fn decrypt(&self, key: &str) -> Result<String, ParseFailure> {
        let unescaped = unescape_js(&self.escaped)?;
        debug!(variable = %self.variable, unescaped = %unescaped, "unescaped cipher string");

        let substituted = match self.substitution {
            Some((from, to)) => {
                debug!(%from, %to, "applying character substitution");
                unescaped.replace(from, &to.to_string())
            }
            None => {
                debug!("no character substitution on page");
                unescaped
            }
        };

        let compact: String = substituted
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let cipher = BASE64_ENGINE
            .decode(compact.as_bytes())
            .map_err(|e| ParseFailure::InvalidBase64 {
                reason: e.to_string(),
            })?;

        let plain = rc4_apply(key.as_bytes(), &cipher).ok_or(ParseFailure::EmptyKey)?;
        // The page decrypts with String.fromCharCode, one char per byte.
        let decrypted: String = plain.iter().map(|&b| char::from(b)).collect();
        debug!(decrypted = %decrypted, "decrypted link");
        Ok(decrypted)
    }
}

/// Which anchor shape a page uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkScheme {
    /// Encrypted link behind a JavaScript variable.
    Cipher(CipherLink),
    /// Plain URL in the anchor.
    Raw(String),
}

/// Finds the download anchor, trying the cipher shape before the raw shape.
///
/// # Errors
///
/// Returns the cipher probe's [`ParseFailure`] when neither shape matches.
pub fn detect_link_scheme(body: &str) -> Result<LinkScheme, ParseFailure> {
    let cipher_failure = match probe_cipher(body) {
        Ok(link) => return Ok(LinkScheme::Cipher(link)),
        Err(failure) => failure,
    };

    RAW_ANCHOR_RES
        .iter()
        .find_map(|re| re.captures(body))
        .and_then(|caps| caps.get(1))
        .map(|m| LinkScheme::Raw(m.as_str().to_string()))
        .ok_or(cipher_failure)
}

fn probe_cipher(body: &str) -> Result<CipherLink, ParseFailure> {
    let variable = ALIAS_ANCHOR_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ParseFailure::AnchorNotFound)?;
    debug!(variable = %variable, "found link variable");

    let name = regex::escape(&variable);
    let not_found = || ParseFailure::CipherStringNotFound {
        variable: variable.clone(),
    };

    let assignment =
        Regex::new(&format!(r#"\b{name}\s*=\s*"([^"]+)"\s*;"#)).map_err(|_| not_found())?;
    let escaped = assignment
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(not_found)?;
    debug!(escaped = %escaped, "found escaped cipher string");

    let substitution = Regex::new(&format!(
        r#"\b{name}\s*=\s*{name}\.replace\(/\\?(.)/g\s*,\s*"(.)"\)\s*;"#
    ))
    .ok()
    .and_then(|re| re.captures(body))
    .and_then(|caps| {
        let from = caps.get(1)?.as_str().chars().next()?;
        let to = caps.get(2)?.as_str().chars().next()?;
        Some((from, to))
    });

    Ok(CipherLink {
        variable,
        escaped,
        substitution,
    })
}

/// Decodes a watch page body.
///
/// The rate-limit check runs first, so a throttled page is reported as
/// [`ResolveOutcome::RateLimited`] even if it also carries a download anchor.
#[must_use]
pub fn decode_watch_page(body: &str, site: &SiteConfig) -> ResolveOutcome {
    if site.is_rate_limited(body) {
        debug!("rate-limit marker found on page");
        return ResolveOutcome::RateLimited;
    }

    let scheme = match detect_link_scheme(body) {
        Ok(scheme) => scheme,
        Err(failure) => return ResolveOutcome::ParseFailed(failure),
    };

    let (raw, kind) = match scheme {
        LinkScheme::Raw(url) => {
            debug!(url = %url, "found raw download link");
            (url, LinkKind::Raw)
        }
        LinkScheme::Cipher(link) => match link.decrypt(&site.cipher_key) {
            Ok(url) => (url, LinkKind::Cipher),
            Err(failure) => return ResolveOutcome::ParseFailed(failure),
        },
    };

    match absolutize(&raw, site) {
        Some(url) => ResolveOutcome::Resolved(ResolvedUrl { url, kind }),
        None => ResolveOutcome::ParseFailed(ParseFailure::NotAUrl { decrypted: raw }),
    }
}

/// Accepts absolute `http(s)` URLs and scheme-relative `//host/...` links.
fn absolutize(candidate: &str, site: &SiteConfig) -> Option<String> {
    let candidate = candidate.trim();
    let absolute = if candidate.starts_with("//") {
        let scheme = Url::parse(&site.base_url)
            .map(|url| url.scheme().to_string())
            .unwrap_or_else(|_| "http".to_string());
        format!("{scheme}:{candidate}")
    } else {
        candidate.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(absolute)
}

/// Undoes JavaScript string-literal escaping.
///
/// Supports `\xNN`, `\uNNNN` (including surrogate pairs), `\u{...}`, legacy
/// octal `\0` to `\377`, the single-character escapes and line
/// continuations; any other escaped character stands for itself.
///
/// # Errors
///
/// Returns [`ParseFailure::InvalidEscape`] for truncated or malformed
/// sequences and lone surrogates.
pub fn unescape_js(input: &str) -> Result<String, ParseFailure> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }

        let invalid = || ParseFailure::InvalidEscape { offset };
        let (_, escape) = chars.next().ok_or_else(invalid)?;
        match escape {
            'x' => {
                let value = take_hex(&mut chars, 2).ok_or_else(invalid)?;
                output.push(char::from_u32(value).ok_or_else(invalid)?);
            }
            'u' => {
                let value = take_unicode_escape(&mut chars).ok_or_else(invalid)?;
                let value = if (0xD800..0xDC00).contains(&value) {
                    // High surrogate: must be followed by `\uDC00`..`\uDFFF`.
                    if chars.next().map(|(_, c)| c) != Some('\\')
                        || chars.next().map(|(_, c)| c) != Some('u')
                    {
                        return Err(invalid());
                    }
                    let low = take_hex(&mut chars, 4).ok_or_else(invalid)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(invalid());
                    }
                    0x10000 + ((value - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    value
                };
                output.push(char::from_u32(value).ok_or_else(invalid)?);
            }
            'n' => output.push('\n'),
            'r' => output.push('\r'),
            't' => output.push('\t'),
            'b' => output.push('\u{8}'),
            'f' => output.push('\u{c}'),
            'v' => output.push('\u{b}'),
            '0'..='7' => {
                let value = take_octal(&mut chars, escape);
                output.push(char::from_u32(value).ok_or_else(invalid)?);
            }
            '\n' => {}
            other => output.push(other),
        }
    }

    Ok(output)
}

fn take_unicode_escape<I>(chars: &mut std::iter::Peekable<I>) -> Option<u32>
where
    I: Iterator<Item = (usize, char)>,
{
    if chars.peek().map(|(_, c)| *c) != Some('{') {
        return take_hex(chars, 4);
    }
    chars.next();
    let mut value: u32 = 0;
    let mut digits = 0;
    for (_, c) in chars.by_ref() {
        if c == '}' {
            return (digits > 0).then_some(value);
        }
        value = value.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
        digits += 1;
    }
    None
}

/// Reads the rest of a legacy octal escape. A leading `0`-`3` takes up to
/// two more digits, `4`-`7` at most one, so the value stays below `0o400`.
fn take_octal<I>(chars: &mut std::iter::Peekable<I>, first: char) -> u32
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value = first.to_digit(8).unwrap_or(0);
    let extra = if value <= 3 { 2 } else { 1 };
    for _ in 0..extra {
        let Some(digit) = chars.peek().and_then(|(_, c)| c.to_digit(8)) else {
            break;
        };
        chars.next();
        value = value * 8 + digit;
    }
    value
}

fn take_hex<I>(chars: &mut std::iter::Peekable<I>, count: usize) -> Option<u32>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value = 0;
    for _ in 0..count {
        let (_, c) = chars.next()?;
        value = value * 16 + c.to_digit(16)?;
    }
    Some(value)
}
