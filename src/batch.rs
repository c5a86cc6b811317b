//! Batch spec loading.
//!
//! A batch spec is a JSON array of anime records:
//!
//! ```json
//! [
//!   { "name": "Mushishi", "dest_dir": "~/anime/$SEASON/Mushishi" },
//!   { "name": "Mushishi Zoku Shou", "dest_dir": "/srv/anime", "episodes": "5-latest",
//!     "naming_scheme": "{name} {episode:02d}" }
//! ]
//! ```
//!
//! Every record is validated before anything touches the network: one bad
//! selection or naming scheme rejects the whole file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::naming::{NamingError, NamingScheme};
use crate::selection::{Selection, SelectionError};

/// One anime to download, fully validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeJob {
    /// Name to look up.
    pub name: String,
    /// Destination directory, with `~` and variables expanded.
    pub dest_dir: PathBuf,
    /// Episodes to fetch.
    pub selection: Selection,
    /// Final file name template.
    pub naming: NamingScheme,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    name: String,
    dest_dir: String,
    #[serde(default)]
    episodes: Option<String>,
    #[serde(default)]
    naming_scheme: Option<String>,
}

/// Errors from loading a batch spec.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The spec file does not exist.
    #[error("batch spec '{path}' does not exist")]
    NotFound {
        /// The given path.
        path: PathBuf,
    },

    /// The spec file could not be read.
    #[error("cannot read batch spec '{path}': {source}")]
    Io {
        /// The given path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The spec is not a JSON array of records.
    #[error("invalid batch spec: {source}\n  Suggestion: expected a JSON array of {{\"name\", \"dest_dir\"}} objects")]
    Json {
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A record has an empty name.
    #[error("batch entry #{index} has an empty name")]
    EmptyName {
        /// 1-based record index.
        index: usize,
    },

    /// A record's `episodes` is malformed.
    #[error("batch entry #{index} ('{name}'): {source}")]
    Selection {
        /// 1-based record index.
        index: usize,
        /// The record's anime name.
        name: String,
        /// The selection error.
        #[source]
        source: SelectionError,
    },

    /// A record's `naming_scheme` is malformed.
    #[error("batch entry #{index} ('{name}'): {source}")]
    Naming {
        /// 1-based record index.
        index: usize,
        /// The record's anime name.
        name: String,
        /// The naming error.
        #[source]
        source: NamingError,
    },
}

/// Loads and validates the batch spec at `path`.
///
/// Records without `naming_scheme` use `default_naming`.
///
/// # Errors
///
/// Returns [`BatchError`] for a missing or unreadable file, malformed JSON,
/// or any invalid record.
pub fn load_batch(path: &Path, default_naming: &NamingScheme) -> Result<Vec<AnimeJob>, BatchError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            BatchError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            BatchError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let jobs = parse_batch(&contents, default_naming)?;
    debug!(path = %path.display(), jobs = jobs.len(), "batch spec loaded");
    Ok(jobs)
}

/// Parses and validates a batch spec document.
///
/// # Errors
///
/// Returns [`BatchError`] for malformed JSON or any invalid record.
pub fn parse_batch(json: &str, default_naming: &NamingScheme) -> Result<Vec<AnimeJob>, BatchError> {
    let entries: Vec<BatchEntry> =
        serde_json::from_str(json).map_err(|source| BatchError::Json { source })?;

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let index = i + 1;
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                return Err(BatchError::EmptyName { index });
            }

            let selection = match entry.episodes.as_deref().map(str::trim) {
                None | Some("") => Selection::all(),
                Some(expr) => Selection::parse(expr).map_err(|source| BatchError::Selection {
                    index,
                    name: name.clone(),
                    source,
                })?,
            };

            let naming = match entry.naming_scheme.as_deref() {
                None => default_naming.clone(),
                Some(scheme) => NamingScheme::parse(scheme).map_err(|source| BatchError::Naming {
                    index,
                    name: name.clone(),
                    source,
                })?,
            };

            Ok(AnimeJob {
                dest_dir: expand_path(&entry.dest_dir),
                name,
                selection,
                naming,
            })
        })
        .collect()
}

/// Expands `$VAR`/`${VAR}` from the environment, then a leading `~`.
///
/// Unknown variables are left as written.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    expand_path_with(raw, |name| std::env::var_os(name))
}

fn expand_path_with<F>(raw: &str, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    let expanded = expand_vars(raw, &lookup);

    let home = || lookup("HOME").filter(|h| !h.is_empty());
    if expanded == "~" {
        if let Some(home) = home() {
            return PathBuf::from(home);
        }
    } else if let Some(rest) = expanded.strip_prefix("~/")
        && let Some(home) = home()
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(expanded)
}

fn expand_vars<F>(raw: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<OsString>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, written, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &rest[pos..pos + end + 3], end + 3),
                None => ("", "$", 1),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &rest[pos..=pos + end], end + 1)
        };

        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value.to_string_lossy()),
            None => out.push_str(written),
        }
        rest = &rest[pos + consumed..];
    }

    out.push_str(rest);
    out
}
