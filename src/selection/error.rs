//! Error types for episode selection parsing.

use thiserror::Error;

/// Errors produced while parsing a textual episode selection.
///
/// A selection error is a configuration problem: it is reported as soon as
/// the expression is parsed and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The expression contained no terms at all.
    #[error("empty episode selection\n  Suggestion: use e.g. \"1,2,7-9\", \"latest\" or \"latest-5\"")]
    Empty,

    /// A single comma-separated term could not be understood.
    #[error("invalid episode selection term '{token}': {reason}")]
    InvalidTerm {
        /// The offending term, exactly as written.
        token: String,
        /// Why the term was rejected.
        reason: String,
    },
}

impl SelectionError {
    /// Creates an `InvalidTerm` error for the given token.
    #[must_use]
    pub fn invalid_term(token: &str, reason: &str) -> Self {
        Self::InvalidTerm {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_term_message_names_token() {
        let err = SelectionError::invalid_term("7-x", "'x' is not an episode number");
        let msg = err.to_string();
        assert!(msg.contains("'7-x'"));
        assert!(msg.contains("not an episode number"));
    }

    #[test]
    fn test_empty_message_has_suggestion() {
        assert!(SelectionError::Empty.to_string().contains("Suggestion"));
    }
}
