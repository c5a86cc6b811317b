//! Crash-safe, resumable episode acquisition.
//!
//! This module turns an unreliable, rate-limited, interruptible fetch into an
//! idempotent file acquisition.
//!
//! # Features
//!
//! - Per-episode lock file; contention resolves to `ASSIGNED_OR_DONE`
//! - Range-resumable streaming into `~<filename>`, published by rename
//! - Finite retry waits, cancellable between chunks and during waits
//! - Distinct, non-retryable error when the watch page no longer decodes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use anime_downloader_core::download::{EpisodeDownloader, EpisodeUnit, HttpClient, RetryPolicy};
//! use anime_downloader_core::naming::NamingScheme;
//! use anime_downloader_core::resolver::{AnimeHeavenResolver, SiteConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Arc::new(AnimeHeavenResolver::new(SiteConfig::default())?);
//! let downloader = EpisodeDownloader::new(
//!     resolver,
//!     HttpClient::new()?,
//!     RetryPolicy::default(),
//!     CancellationToken::new(),
//! );
//! let unit = EpisodeUnit::new("Mushishi", 1, "./Mushishi", NamingScheme::default());
//! let state = downloader.acquire(&unit).await?;
//! println!("{unit}: {state}");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod lock;
mod observer;
mod orchestrator;
mod retry;

pub use client::{FetchSummary, HttpClient};
pub use constants::{DEFAULT_RETRY_WAIT_SECS, LOCK_FILE_SUFFIX, TEMP_FILE_PREFIX};
pub use error::{AcquireError, DownloadError};
pub use lock::{EpisodeLock, LockAttempt};
pub use observer::{DownloadObserver, NoopObserver};
pub use orchestrator::{DownloadState, EpisodeDownloader, EpisodeUnit, UnitPaths};
pub use retry::{Attempt, FailureType, RetryPolicy, RetryWaitsError, classify_error};
