//! Episode acquisition state machine.
//!
//! [`EpisodeDownloader::acquire`] takes one download unit from "maybe on
//! disk" to a terminal [`DownloadState`]:
//!
//! ```text
//! START
//!   final file exists                      -> ASSIGNED_OR_DONE
//!   lock held elsewhere                    -> ASSIGNED_OR_DONE
//! ATTEMPT (one per retry wait)
//!   wait (cancellable)
//!   resolve
//!     RateLimited / transport error        -> next attempt
//!     ParseFailed                          -> remove temp, ResolverOutdated
//!     Resolved(url)
//!       fetch from temp length, append     -> rename temp to final, DOWNLOADED
//!       transient fetch error              -> next attempt
//!       range rejected                     -> next attempt, temp removed first
//!       local IO error                     -> remove temp, Io
//! EXHAUSTED                                -> FAILED (temp kept)
//! ```
//!
//! The lock is released and its file removed on every exit taken after it
//! was acquired. Cancellation keeps the temp file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::constants::{LOCK_FILE_SUFFIX, TEMP_FILE_PREFIX, WAIT_TICK};
use super::error::{AcquireError, DownloadError};
use super::lock::{EpisodeLock, LockAttempt};
use super::observer::{DownloadObserver, NoopObserver};
use super::retry::{FailureType, RetryPolicy, classify_error};
use crate::naming::NamingScheme;
use crate::resolver::{EpisodeResolver, ResolveOutcome};

/// One `(anime, episode)` to acquire and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeUnit {
    /// Anime name as the site spells it.
    pub anime: String,
    /// Episode number.
    pub episode: u32,
    /// Directory receiving the final file and the transient artifacts.
    pub dest_dir: PathBuf,
    /// Template for the final file name.
    pub naming: NamingScheme,
}

/// On-disk paths of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    /// Published file.
    pub final_path: PathBuf,
    /// Partial file, `~<filename>`.
    pub temp_path: PathBuf,
    /// Lock file, `~<filename>.lock`.
    pub lock_path: PathBuf,
}

impl EpisodeUnit {
    /// Creates a unit.
    pub fn new(
        anime: impl Into<String>,
        episode: u32,
        dest_dir: impl Into<PathBuf>,
        naming: NamingScheme,
    ) -> Self {
        Self {
            anime: anime.into(),
            episode,
            dest_dir: dest_dir.into(),
            naming,
        }
    }

    /// Final file name, `<scheme>.mp4`.
    #[must_use]
    pub fn filename(&self) -> String {
        self.naming.filename(&self.anime, self.episode)
    }

    /// Final, temp and lock paths.
    #[must_use]
    pub fn paths(&self) -> UnitPaths {
        let filename = self.filename();
        let temp_name = format!("{TEMP_FILE_PREFIX}{filename}");
        UnitPaths {
            final_path: self.dest_dir.join(&filename),
            lock_path: self.dest_dir.join(format!("{temp_name}{LOCK_FILE_SUFFIX}")),
            temp_path: self.dest_dir.join(temp_name),
        }
    }
}

impl fmt::Display for EpisodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} episode {}", self.anime, self.episode)
    }
}

/// Terminal state of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Already on disk, or another process is on it. Do not retry.
    AssignedOrDone,
    /// Fully written and published under the final name.
    Downloaded,
    /// Every attempt failed. The temp file is kept for resuming.
    Failed,
}

impl DownloadState {
    /// True unless the state is [`DownloadState::Failed`].
    #[must_use]
    pub fn is_ok(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AssignedOrDone => "ASSIGNED_OR_DONE",
            Self::Downloaded => "DOWNLOADED",
            Self::Failed => "FAILED",
        })
    }
}

/// Drives acquisitions. One instance serves every unit; units share nothing
/// but the resolver, the HTTP connection pool and the cancellation signal.
pub struct EpisodeDownloader {
    resolver: Arc<dyn EpisodeResolver>,
    client: HttpClient,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl fmt::Debug for EpisodeDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeDownloader")
            .field("resolver", &self.resolver.name())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

enum AttemptResult {
    Done,
    Retry,
    /// The server rejected the resume offset; the next attempt starts at zero.
    RetryFromZero,
}

impl EpisodeDownloader {
    /// Creates a downloader.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn EpisodeResolver>,
        client: HttpClient,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            client,
            retry,
            cancel,
        }
    }

    /// The retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The cancellation signal observed by every acquisition.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Acquires `unit` without progress reporting.
    ///
    /// # Errors
    ///
    /// See [`EpisodeDownloader::acquire_with_observer`].
    pub async fn acquire(&self, unit: &EpisodeUnit) -> Result<DownloadState, AcquireError> {
        self.acquire_with_observer(unit, &NoopObserver).await
    }

    /// Acquires `unit`, reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::ResolverOutdated`] when the watch page no longer
    ///   decodes (temp file removed).
    /// - [`AcquireError::Cancelled`] when the cancellation signal fires (temp
    ///   file kept).
    /// - [`AcquireError::Io`] on local file system failures.
    #[instrument(skip(self, unit, observer), fields(anime = %unit.anime, episode = unit.episode))]
    pub async fn acquire_with_observer(
        &self,
        unit: &EpisodeUnit,
        observer: &dyn DownloadObserver,
    ) -> Result<DownloadState, AcquireError> {
        let paths = unit.paths();

        tokio::fs::create_dir_all(&unit.dest_dir)
            .await
            .map_err(|e| AcquireError::io(&unit.dest_dir, e))?;

        if path_exists(&paths.final_path).await {
            debug!(path = %paths.final_path.display(), "final file exists");
            return Ok(finish(unit, observer, DownloadState::AssignedOrDone));
        }

        let lock = match EpisodeLock::try_acquire(&paths.lock_path)? {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Contended => {
                info!("another process holds this episode");
                return Ok(finish(unit, observer, DownloadState::AssignedOrDone));
            }
        };

        // Another process may have published between the check and the lock.
        let result = if path_exists(&paths.final_path).await {
            Ok(DownloadState::AssignedOrDone)
        } else {
            self.run_attempts(unit, &paths, observer).await
        };

        if let Err(e) = lock.release() {
            warn!(error = %e, "failed to release lock");
        }

        result.map(|state| finish(unit, observer, state))
    }

    async fn run_attempts(
        &self,
        unit: &EpisodeUnit,
        paths: &UnitPaths,
        observer: &dyn DownloadObserver,
    ) -> Result<DownloadState, AcquireError> {
        let max_attempts = self.retry.max_attempts();
        let mut discard_temp = false;

        for attempt in self.retry.attempts() {
            self.wait(unit, attempt.wait, observer).await?;
            if std::mem::take(&mut discard_temp) {
                remove_temp(&paths.temp_path).await;
            }
            observer.on_attempt(unit, attempt.number, max_attempts);
            debug!(attempt = attempt.number, max_attempts, "starting attempt");

            match self.attempt(unit, paths, observer).await? {
                AttemptResult::Done => return Ok(DownloadState::Downloaded),
                AttemptResult::Retry => {}
                AttemptResult::RetryFromZero => discard_temp = true,
            }
        }

        warn!(max_attempts, "all attempts failed, keeping partial file");
        Ok(DownloadState::Failed)
    }

    async fn attempt(
        &self,
        unit: &EpisodeUnit,
        paths: &UnitPaths,
        observer: &dyn DownloadObserver,
    ) -> Result<AttemptResult, AcquireError> {
        let resolved = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                return Err(AcquireError::cancelled(&unit.anime, unit.episode));
            }
            resolved = self.resolver.resolve(&unit.anime, unit.episode) => resolved,
        };

        let url = match resolved {
            Ok(ResolveOutcome::Resolved(resolved)) => resolved.url,
            Ok(ResolveOutcome::RateLimited) => {
                warn!("rate limited by the site");
                return Ok(AttemptResult::Retry);
            }
            Ok(ResolveOutcome::ParseFailed(failure)) => {
                remove_temp(&paths.temp_path).await;
                return Err(AcquireError::resolver_outdated(
                    &unit.anime,
                    unit.episode,
                    failure,
                ));
            }
            Err(e) => {
                warn!(error = %e, "resolving failed");
                return Ok(AttemptResult::Retry);
            }
        };

        let fetched = self
            .client
            .fetch_resumable(&url, &paths.temp_path, &self.cancel, unit, observer)
            .await;

        match fetched {
            Ok(_) => {
                publish(paths).await?;
                Ok(AttemptResult::Done)
            }
            Err(e) => match classify_error(&e) {
                FailureType::Transient => {
                    warn!(error = %e, "fetch failed");
                    if matches!(e, DownloadError::RangeNotSatisfiable { .. }) {
                        Ok(AttemptResult::RetryFromZero)
                    } else {
                        Ok(AttemptResult::Retry)
                    }
                }
                FailureType::Cancelled => {
                    info!("cancelled, partial file kept");
                    Err(AcquireError::cancelled(&unit.anime, unit.episode))
                }
                FailureType::Fatal => {
                    remove_temp(&paths.temp_path).await;
                    Err(e.into())
                }
            },
        }
    }

    async fn wait(
        &self,
        unit: &EpisodeUnit,
        wait: Duration,
        observer: &dyn DownloadObserver,
    ) -> Result<(), AcquireError> {
        if wait.is_zero() {
            return Ok(());
        }

        info!(wait_secs = wait.as_secs(), "waiting before next attempt");
        observer.on_wait_start(unit, wait);
        let deadline = Instant::now() + wait;

        let result = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Ok(());
            }
            let tick = remaining.min(WAIT_TICK);
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    break Err(AcquireError::cancelled(&unit.anime, unit.episode));
                }
                () = tokio::time::sleep(tick) => {
                    observer.on_wait_tick(unit, remaining.saturating_sub(tick));
                }
            }
        };

        observer.on_wait_end(unit);
        result
    }
}

fn finish(
    unit: &EpisodeUnit,
    observer: &dyn DownloadObserver,
    state: DownloadState,
) -> DownloadState {
    info!(state = %state, "episode finished");
    observer.on_finished(unit, state);
    state
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn publish(paths: &UnitPaths) -> Result<(), AcquireError> {
    if let Err(e) = tokio::fs::rename(&paths.temp_path, &paths.final_path).await {
        remove_temp(&paths.temp_path).await;
        return Err(AcquireError::io(&paths.final_path, e));
    }
    info!(path = %paths.final_path.display(), "published");
    Ok(())
}

async fn remove_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
