//! Progress bar adapter using indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use yawn_dataset_core::{ProgressEvent, ProgressSink};

/// Progress bar adapter for CLI output.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress bar.
    ///
    /// # Arguments
    ///
    /// * `total` - Total number of videos, if known
    /// * `quiet` - If true, suppress all output
    /// * `show_bar` - If true, show progress bar; otherwise show per-video status
    #[must_use]
    pub fn new(total: Option<u64>, quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = if show_bar {
            let bar = total.map_or_else(IndicatifBar::new_spinner, IndicatifBar::new);

            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }

            Some(bar)
        } else {
            None
        };

        Self { bar, quiet }
    }
}

impl ProgressSink for ProgressBar {
    fn on_event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }

        match event {
            ProgressEvent::VideoStarted { path, index, total } => {
                if let Some(bar) = &self.bar {
                    if let Some(t) = total {
                        bar.set_length(t as u64);
                    }
                    bar.set_position(index as u64);
                    bar.set_message(path);
                } else {
                    eprintln!("Current video {path}");
                }
            }
            ProgressEvent::VideoCompleted { path, result } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                } else if result.images_saved() > 0 {
                    eprintln!(
                        "{path}: {} opened, {} closed",
                        result.opened_counter, result.closed_counter
                    );
                }
            }
            ProgressEvent::VideoFailed { path, reason } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                eprintln!("WARN: Abandoned {path}: {reason}");
            }
            ProgressEvent::Finished { processed, failed } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!("Done: {processed} processed, {failed} failed"));
                }
            }
        }
    }
}
