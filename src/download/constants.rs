//! Constants for the download module (artifact names, retry defaults).

use std::time::Duration;

/// Prefix of the partial file next to the final destination.
pub const TEMP_FILE_PREFIX: &str = "~";

/// Suffix appended to the temp file name to form the lock file name.
pub const LOCK_FILE_SUFFIX: &str = ".lock";

/// Default retry waits in seconds. The leading zero is the first attempt.
pub const DEFAULT_RETRY_WAIT_SECS: [u64; 5] = [0, 60, 15, 10, 5];

/// Granularity of retry waits, for progress display.
pub const WAIT_TICK: Duration = Duration::from_secs(1);
