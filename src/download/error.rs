//! Error types for the download module.
//!
//! [`DownloadError`] describes one failed media fetch; the orchestrator
//! classifies it and either retries or gives up. [`AcquireError`] is what
//! escapes an acquisition: the conditions that are neither a
//! [`DownloadState`](super::DownloadState) nor retryable.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::ParseFailure;

/// Errors from a single media fetch.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The media URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The media URL.
        url: String,
    },

    /// Non-success response other than 416.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The media URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server rejected the resume offset (HTTP 416).
    #[error("range starting at byte {offset} not satisfiable for {url}")]
    RangeNotSatisfiable {
        /// The media URL.
        url: String,
        /// The requested resume offset.
        offset: u64,
    },

    /// Local file system error (create, write, rename, lock).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The resolved media URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The body ended before the advertised length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// The temp file.
        path: PathBuf,
        /// Bytes the server announced for this response.
        expected_bytes: u64,
        /// Bytes actually received.
        actual_bytes: u64,
    },

    /// The cancellation signal fired mid-transfer.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The media URL.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a range-not-satisfiable error.
    pub fn range_not_satisfiable(url: impl Into<String>, offset: u64) -> Self {
        Self::RangeNotSatisfiable {
            url: url.into(),
            offset,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }
}

/// Non-retryable outcomes of an acquisition.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The watch page no longer matches any known obfuscation shape.
    #[error(
        "cannot decode watch page for '{anime}' episode {episode}: {failure}\n  Suggestion: the site changed its page format; the link decoder needs updating"
    )]
    ResolverOutdated {
        /// Anime name.
        anime: String,
        /// Episode number.
        episode: u32,
        /// Which decode stage failed.
        failure: ParseFailure,
    },

    /// The cancellation signal fired. The temp file is kept for resuming.
    #[error("download of '{anime}' episode {episode} cancelled")]
    Cancelled {
        /// Anime name.
        anime: String,
        /// Episode number.
        episode: u32,
    },

    /// Local file system failure.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A fetch error that should have been retried but escaped the loop.
    #[error(transparent)]
    Download(DownloadError),
}

impl From<DownloadError> for AcquireError {
    fn from(error: DownloadError) -> Self {
        match error {
            DownloadError::Io { path, source } => Self::Io { path, source },
            other => Self::Download(other),
        }
    }
}

impl AcquireError {
    /// Creates a resolver-outdated error.
    pub fn resolver_outdated(anime: impl Into<String>, episode: u32, failure: ParseFailure) -> Self {
        Self::ResolverOutdated {
            anime: anime.into(),
            episode,
            failure,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(anime: impl Into<String>, episode: u32) -> Self {
        Self::Cancelled {
            anime: anime.into(),
            episode,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("http://cdn.example/ep1.mp4", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("http://cdn.example/ep1.mp4"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_range_display() {
        let msg = DownloadError::range_not_satisfiable("http://cdn.example/ep1.mp4", 1024)
            .to_string();
        assert!(msg.contains("1024"), "Expected offset in: {msg}");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let msg = DownloadError::io(PathBuf::from("/tmp/~ep.mp4"), io_error).to_string();
        assert!(msg.contains("/tmp/~ep.mp4"), "Expected path in: {msg}");
    }

    #[test]
    fn test_resolver_outdated_has_suggestion() {
        let msg = AcquireError::resolver_outdated("Mushishi", 3, ParseFailure::AnchorNotFound)
            .to_string();
        assert!(msg.contains("'Mushishi' episode 3"), "Expected unit in: {msg}");
        assert!(msg.contains("Suggestion:"), "Expected suggestion in: {msg}");
    }
}
