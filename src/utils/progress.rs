//! Progress indicators for long-running operations.
//!
//! Wraps `indicatif` so callers do not need to care whether progress output is
//! enabled. When `LAUNCHKIT_NO_PROGRESS` is set (the `--no-progress` flag sets
//! it) every bar is hidden.

use crate::constants::NO_PROGRESS_ENV;
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// A progress bar or spinner that may be hidden.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Byte-count bar for a download of `total` bytes.
    pub fn new_download(total: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(total);
            bar.set_style(ProgressStyle::download());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Spinner for work of unknown size.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(ProgressStyle::spinner());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Tracks a download whose total size may only be known once the first
/// progress report arrives.
pub struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub const fn new() -> Self {
        Self {
            bar: None,
        }
    }

    /// Apply one `(received, total)` report; `total == 0` means unknown.
    pub fn update(&mut self, received: u64, total: u64) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = if total > 0 {
                ProgressBar::new_download(total)
            } else {
                ProgressBar::new_spinner()
            };
            bar.set_prefix("Downloading");
            bar
        });

        bar.set_position(received);
        if total == 0 {
            bar.set_message(format!("{} KB", received / 1024));
        }
    }

    pub fn finish(self, msg: impl Into<String>) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(msg);
        }
    }

    pub fn abandon(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Style presets.
pub struct ProgressStyle;

impl ProgressStyle {
    pub fn download() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("━╸━")
    }

    pub fn spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{prefix:.bold} {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}
