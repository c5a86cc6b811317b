//! Exit code logic for the downloader process.
//!
//! Single responsibility: fold per-anime outcomes into one process exit.

use crate::ProcessExit;

/// How one anime job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    /// Every selected episode is downloaded or owned by someone else.
    Completed,
    NotFound,
    /// An episode ended `FAILED` or hit a local IO error.
    Failed,
    ResolverOutdated,
    Cancelled,
    /// Catalog lookup failed for a reason other than not found.
    Error,
}

/// Determines the process exit outcome from all job outcomes.
///
/// A decoder mismatch outranks everything since it cancels the other jobs;
/// a user interrupt outranks ordinary failures.
pub(crate) fn determine_exit_outcome(outcomes: &[JobOutcome]) -> ProcessExit {
    let any = |wanted: JobOutcome| outcomes.contains(&wanted);

    if any(JobOutcome::ResolverOutdated) {
        ProcessExit::ResolverOutdated
    } else if any(JobOutcome::Cancelled) {
        ProcessExit::Cancelled
    } else if any(JobOutcome::Failed) {
        ProcessExit::Failed
    } else if any(JobOutcome::NotFound) || any(JobOutcome::Error) {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}

#[cfg(test)]
mod tests {
    use super::{JobOutcome, determine_exit_outcome};
    use crate::ProcessExit;

    #[test]
    fn test_exit_outcome_success_when_all_completed() {
        assert_eq!(
            determine_exit_outcome(&[JobOutcome::Completed, JobOutcome::Completed]),
            ProcessExit::Success
        );
        assert_eq!(determine_exit_outcome(&[]), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_failed_beats_not_found() {
        assert_eq!(
            determine_exit_outcome(&[JobOutcome::NotFound, JobOutcome::Failed]),
            ProcessExit::Failed
        );
    }

    #[test]
    fn test_exit_outcome_not_found() {
        assert_eq!(
            determine_exit_outcome(&[JobOutcome::Completed, JobOutcome::NotFound]),
            ProcessExit::Failure
        );
    }

    #[test]
    fn test_exit_outcome_outdated_beats_the_cancellations_it_caused() {
        assert_eq!(
            determine_exit_outcome(&[
                JobOutcome::Cancelled,
                JobOutcome::ResolverOutdated,
                JobOutcome::Cancelled
            ]),
            ProcessExit::ResolverOutdated
        );
    }

    #[test]
    fn test_exit_outcome_cancelled() {
        assert_eq!(
            determine_exit_outcome(&[JobOutcome::Failed, JobOutcome::Cancelled]),
            ProcessExit::Cancelled
        );
    }
}
