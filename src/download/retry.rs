//! Retry policy for episode acquisition.
//!
//! A [`RetryPolicy`] is a finite, ordered list of waits. Attempt `n` sleeps
//! for the `n`-th wait before it runs, so the number of waits is the maximum
//! number of attempts and their sum is the worst-case time spent waiting.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use anime_downloader_core::download::RetryPolicy;
//!
//! let policy: RetryPolicy = "0,60,15".parse().unwrap();
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.worst_case_wait(), Duration::from_secs(75));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use super::DownloadError;
use super::constants::DEFAULT_RETRY_WAIT_SECS;

/// How a failed fetch affects the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Try again with the next wait, if any remain.
    Transient,
    /// Local failure that another attempt cannot fix.
    Fatal,
    /// The cancellation signal fired.
    Cancelled,
}

/// One scheduled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Wait before this attempt.
    pub wait: Duration,
}

/// Invalid `--retry-waits` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid retry waits '{input}': {reason}\n  Suggestion: use comma-separated seconds, e.g. 0,60,15,10,5")]
pub struct RetryWaitsError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Ordered waits consumed one per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    waits: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_RETRY_WAIT_SECS)
    }
}

impl RetryPolicy {
    /// Creates a policy from explicit waits.
    ///
    /// An empty list still allows one immediate attempt.
    #[must_use]
    pub fn new(waits: Vec<Duration>) -> Self {
        let waits = if waits.is_empty() {
            vec![Duration::ZERO]
        } else {
            waits
        };
        Self { waits }
    }

    /// Creates a policy from waits in whole seconds.
    #[must_use]
    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// The waits, in order.
    #[must_use]
    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.waits.len()).unwrap_or(u32::MAX)
    }

    /// Total time spent waiting if every attempt fails.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        self.waits.iter().sum()
    }

    /// The attempts this policy allows, in order.
    pub fn attempts(&self) -> impl Iterator<Item = Attempt> + '_ {
        (1..).zip(self.waits.iter()).map(|(number, wait)| Attempt {
            number,
            wait: *wait,
        })
    }
}

impl FromStr for RetryPolicy {
    type Err = RetryWaitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| RetryWaitsError {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(fail("no waits given".to_string()));
        }
        let secs = trimmed
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<u64>()
                    .map_err(|_| fail(format!("'{part}' is not a whole number of seconds")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_secs(&secs))
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .waits
            .iter()
            .map(|wait| wait.as_secs().to_string())
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Classifies a fetch error for the attempt loop.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, `HttpStatus` | Transient |
/// | `RangeNotSatisfiable` | Transient (temp file discarded before the next attempt) |
/// | Integrity | Transient (resumes from what arrived) |
/// | `InvalidUrl` | Transient (the next resolve may differ) |
/// | Io | Fatal |
/// | Cancelled | Cancelled |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::HttpStatus { .. }
        | DownloadError::RangeNotSatisfiable { .. }
        | DownloadError::Integrity { .. }
        | DownloadError::InvalidUrl { .. } => FailureType::Transient,
        DownloadError::Io { .. } => FailureType::Fatal,
        DownloadError::Cancelled { .. } => FailureType::Cancelled,
    }
}
