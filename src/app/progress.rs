//! Progress bars for episode acquisitions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anime_downloader_core::{DownloadObserver, DownloadState, EpisodeUnit};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const TRANSFER_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const UNKNOWN_SIZE_TEMPLATE: &str = "{spinner} {msg} {bytes} {bytes_per_sec}";
const WAIT_TEMPLATE: &str = "{msg} retrying in {wide_bar} {pos}/{len}s";

/// Draws one bar per active episode: bytes while streaming, seconds while
/// waiting out a retry delay.
pub(crate) struct ProgressObserver {
    multi: MultiProgress,
    visible: bool,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressObserver {
    pub(crate) fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            visible,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn show(&self, unit: &EpisodeUnit, bar: ProgressBar) {
        let bar = self.multi.add(bar);
        bar.set_message(unit.to_string());
        let previous = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unit.to_string(), bar);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    fn with_bar(&self, unit: &EpisodeUnit, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.get(&unit.to_string()) {
            f(bar);
        }
    }

    fn clear(&self, unit: &EpisodeUnit) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&unit.to_string());
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    #[cfg(test)]
    fn active_bars(&self) -> usize {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

impl DownloadObserver for ProgressObserver {
    fn on_wait_start(&self, unit: &EpisodeUnit, wait: Duration) {
        let bar = ProgressBar::new(wait.as_secs());
        bar.set_style(style(WAIT_TEMPLATE, ProgressStyle::default_bar));
        self.show(unit, bar);
    }

    fn on_wait_tick(&self, unit: &EpisodeUnit, remaining: Duration) {
        self.with_bar(unit, |bar| {
            let total = bar.length().unwrap_or(0);
            bar.set_position(total.saturating_sub(remaining.as_secs()));
        });
    }

    fn on_wait_end(&self, unit: &EpisodeUnit) {
        self.clear(unit);
    }

    fn on_transfer_start(&self, unit: &EpisodeUnit, offset: u64, total: Option<u64>) {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(style(TRANSFER_TEMPLATE, ProgressStyle::default_bar));
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(style(UNKNOWN_SIZE_TEMPLATE, ProgressStyle::default_spinner));
                bar
            }
        };
        bar.set_position(offset);
        bar.reset_eta();
        self.show(unit, bar);
    }

    fn on_transfer_progress(&self, unit: &EpisodeUnit, bytes: u64) {
        self.with_bar(unit, |bar| bar.inc(bytes));
    }

    fn on_transfer_end(&self, unit: &EpisodeUnit) {
        self.clear(unit);
    }

    fn on_finished(&self, unit: &EpisodeUnit, state: DownloadState) {
        self.clear(unit);
        if self.visible {
            let _ = self.multi.println(format!("{unit}: {state}"));
        }
    }
}
