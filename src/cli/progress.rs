//! Terminal progress display for batch downloads
//!
//! When stderr is a terminal the batch is rendered as an indicatif progress
//! bar. Otherwise snapshots become periodic log lines, so redirected output
//! stays readable.

use std::time::{Duration, Instant};

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::app::ProgressSnapshot;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Minimum spacing between progress log lines when not on a terminal
const LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Renders orchestrator snapshots for the user
pub struct ProgressDisplay {
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display; the bar is only drawn if `enabled` and stderr is a tty
    pub fn new(enabled: bool, total: usize) -> Self {
        let bar = (enabled && atty::is(atty::Stream::Stderr)).then(|| {
            let bar = ProgressBar::new(total as u64);
            let style = match ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                Ok(style) => style.progress_chars("##-"),
                Err(e) => {
                    debug!("Progress bar template error: {}", e);
                    ProgressStyle::default_bar()
                }
            };
            bar.set_style(style);
            bar.set_message("Downloading zone files");
            bar
        });

        Self { bar }
    }

    /// Whether a progress bar is being drawn
    pub fn is_interactive(&self) -> bool {
        self.bar.is_some()
    }

    /// Snapshot consumer to hand to the orchestrator
    pub fn sink(&self) -> impl FnMut(ProgressSnapshot) + Send + 'static {
        let bar = self.bar.clone();
        let mut last_logged: Option<(usize, Instant)> = None;

        move |snapshot: ProgressSnapshot| match &bar {
            Some(bar) => {
                bar.set_length(snapshot.total as u64);
                bar.set_position(snapshot.processed() as u64);
                bar.set_message(format!(
                    "{} failed, {} in flight, {}/s",
                    snapshot.failed,
                    snapshot.in_flight,
                    HumanBytes(snapshot.rate_bps() as u64)
                ));
            }
            None => {
                let due = match last_logged {
                    None => true,
                    Some((processed, at)) => {
                        processed != snapshot.processed() && at.elapsed() >= LOG_INTERVAL
                    }
                };
                if due {
                    info!(
                        "Progress: {:.1}% ({})",
                        snapshot.completion_percentage(),
                        snapshot
                    );
                    last_logged = Some((snapshot.processed(), Instant::now()));
                }
            }
        }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
