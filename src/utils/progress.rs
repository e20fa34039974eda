//! Download progress display.
//!
//! [`DownloadProgress`] turns the `(downloaded, total)` callbacks of
//! [`ArtifactDownloader::download`](crate::upgrade::ArtifactDownloader::download)
//! into an `indicatif` bar. The shape is picked on the first update: a byte
//! bar when the server announced a length, a spinner otherwise.
//!
//! # Environment Variables
//!
//! - `FKEY_NO_PROGRESS`: Set to any value to hide all progress output

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Whether progress output is disabled through `FKEY_NO_PROGRESS`.
fn is_progress_disabled() -> bool {
    std::env::var_os("FKEY_NO_PROGRESS").is_some()
}

/// Progress display for a single download.
///
/// # Examples
///
/// ```rust,no_run
/// use fkey_updater::utils::progress::DownloadProgress;
///
/// let mut progress = DownloadProgress::new("Downloading", false);
/// progress.update(512, Some(1024));
/// progress.update(1024, Some(1024));
/// progress.finish("Downloaded");
/// ```
#[derive(Debug)]
pub struct DownloadProgress {
    label: String,
    hidden: bool,
    bar: Option<IndicatifBar>,
}

impl DownloadProgress {
    /// Create a display labelled `label`. Nothing is drawn until the first
    /// update. `hidden` (or `FKEY_NO_PROGRESS`) suppresses all drawing.
    pub fn new(label: impl Into<String>, hidden: bool) -> Self {
        Self {
            label: label.into(),
            hidden: hidden || is_progress_disabled(),
            bar: None,
        }
    }

    /// Record `downloaded` bytes out of `total` (`None` when unknown).
    pub fn update(&mut self, downloaded: u64, total: Option<u64>) {
        let bar = self.bar.get_or_insert_with(|| create_bar(&self.label, total, self.hidden));
        if let Some(total) = total
            && bar.length() != Some(total)
        {
            bar.set_length(total);
        }
        bar.set_position(downloaded);
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, IndicatifBar::position)
    }

    /// Total bytes, if known.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.bar.as_ref().and_then(IndicatifBar::length)
    }

    /// Stop the display and leave `message` in place.
    pub fn finish(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.into());
        }
    }

    /// Stop the display after a failure, keeping the last position visible.
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }
}

fn create_bar(label: &str, total: Option<u64>, hidden: bool) -> IndicatifBar {
    let bar = if hidden {
        let bar = IndicatifBar::hidden();
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar
    } else if let Some(total) = total {
        let bar = IndicatifBar::new(total);
        bar.set_style(bytes_style());
        bar
    } else {
        let bar = IndicatifBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };
    bar.set_prefix(label.to_string());
    bar
}

fn bytes_style() -> IndicatifStyle {
    IndicatifStyle::with_template(
        "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
    )
    .map_or_else(|_| IndicatifStyle::default_bar(), |style| style.progress_chars("━╸━"))
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::with_template("{prefix:.bold} {spinner:.cyan} {bytes} {msg}").map_or_else(
        |_| IndicatifStyle::default_spinner(),
        |style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    )
}
