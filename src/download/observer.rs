//! Progress hooks for acquisitions.
//!
//! Everything defaults to doing nothing; the binary implements the hooks
//! with progress bars.

use std::time::Duration;

use super::{DownloadState, EpisodeUnit};

/// Receives progress events of one acquisition.
pub trait DownloadObserver: Send + Sync {
    /// An attempt is about to run.
    fn on_attempt(&self, _unit: &EpisodeUnit, _attempt: u32, _max_attempts: u32) {}

    /// A retry wait of `wait` starts.
    fn on_wait_start(&self, _unit: &EpisodeUnit, _wait: Duration) {}

    /// One wait tick elapsed; `remaining` is left.
    fn on_wait_tick(&self, _unit: &EpisodeUnit, _remaining: Duration) {}

    /// The wait is over (or was cancelled).
    fn on_wait_end(&self, _unit: &EpisodeUnit) {}

    /// Streaming starts at byte `offset`; `total` is the full size when known.
    fn on_transfer_start(&self, _unit: &EpisodeUnit, _offset: u64, _total: Option<u64>) {}

    /// `bytes` more bytes were written to the temp file.
    fn on_transfer_progress(&self, _unit: &EpisodeUnit, _bytes: u64) {}

    /// Streaming stopped, successfully or not.
    fn on_transfer_end(&self, _unit: &EpisodeUnit) {}

    /// The acquisition reached a terminal state.
    fn on_finished(&self, _unit: &EpisodeUnit, _state: DownloadState) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}
