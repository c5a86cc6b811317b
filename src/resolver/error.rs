//! Error types for resolver operations.
//!
//! [`ResolveError`] covers transport failures while fetching a page. Pages
//! that were fetched but could not be decoded are not errors: they are
//! reported as [`ResolveOutcome::ParseFailed`](super::ResolveOutcome) with a
//! [`ParseFailure`] reason.

use thiserror::Error;

/// Transport-level failures while fetching a page.
///
/// All of these are transient from the orchestrator's point of view.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The page URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request timed out.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The page URL.
        url: String,
    },

    /// The site answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The page URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The configured site URL could not be turned into a request URL.
    #[error("invalid site URL '{base}': {source}\n  Suggestion: check --base-url")]
    InvalidSiteUrl {
        /// The configured base URL.
        base: String,
        /// The parse error.
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client construction failed: {source}")]
    Client {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ResolveError {
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

    /// Creates an invalid site URL error.
    pub fn invalid_site_url(base: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidSiteUrl {
            base: base.into(),
            source,
        }
    }
}

/// Why a fetched page could not be decoded into a media URL.
///
/// Every variant means the page no longer matches the known obfuscation
/// shapes and the decode pipeline needs updating. None of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// No download anchor of either known shape was found.
    #[error("download anchor not found")]
    AnchorNotFound,

    /// The anchor names a variable that is never assigned a string.
    #[error("cipher string for variable '{variable}' not found")]
    CipherStringNotFound {
        /// The alias captured from the anchor.
        variable: String,
    },

    /// The cipher string contains a malformed escape sequence.
    #[error("malformed escape sequence at offset {offset} in cipher string")]
    InvalidEscape {
        /// Byte offset of the backslash.
        offset: usize,
    },

    /// The (substituted) cipher string is not valid base64.
    #[error("cipher string is not valid base64: {reason}")]
    InvalidBase64 {
        /// The decoder's complaint.
        reason: String,
    },

    /// The configured cipher key is empty.
    #[error("cipher key is empty")]
    EmptyKey,

    /// Decryption produced something that is not an absolute HTTP URL.
    #[error("decrypted link is not an http(s) URL: '{decrypted}'")]
    NotAUrl {
        /// The decrypted text.
        decrypted: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message() {
        let err = ResolveError::http_status("http://animeheaven.eu/watch.php", 503);
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("watch.php"));
    }

    #[test]
    fn test_invalid_site_url_has_suggestion() {
        let source = url::Url::parse("nope").unwrap_err();
        let err = ResolveError::invalid_site_url("nope", source);
        assert!(err.to_string().contains("--base-url"));
    }

    #[test]
    fn test_parse_failure_messages() {
        let failure = ParseFailure::CipherStringNotFound {
            variable: "abc".to_string(),
        };
        assert!(failure.to_string().contains("'abc'"));
        assert!(ParseFailure::AnchorNotFound.to_string().contains("anchor"));
    }
}
