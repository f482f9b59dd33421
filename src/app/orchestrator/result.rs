//! Final outcome of a batch run
//!
//! Every URL handed to the orchestrator ends up in exactly one of
//! `succeeded` (by final path), `permanently_failed`, or `skipped`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::HumanBytes;

use crate::errors::{AppError, TransferError};

/// Why a batch stopped before working through every URL
#[derive(Debug)]
pub enum BatchAbort {
    /// A disk or re-authentication failure that no other URL could escape;
    /// the error itself is recorded against `url` in `permanently_failed`
    Systemic { url: String, reason: String },
    /// Shutdown was requested
    Interrupted,
}

impl fmt::Display for BatchAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchAbort::Systemic { url, reason } => write!(f, "aborted on {}: {}", url, reason),
            BatchAbort::Interrupted => f.write_str("interrupted by shutdown request"),
        }
    }
}

/// Counters describing how a batch ran
#[derive(Debug, Clone)]
pub struct BatchStats {
    pub total_links: usize,
    pub bytes_written: u64,
    /// Rounds started, the first attempt included
    pub rounds: u32,
    pub attempts: usize,
    pub peak_in_flight: usize,
    pub auth_exchanges: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Immutable record of a finished batch
#[derive(Debug)]
pub struct BatchResult {
    succeeded: BTreeSet<PathBuf>,
    permanently_failed: BTreeMap<String, TransferError>,
    skipped: Vec<String>,
    abort: Option<BatchAbort>,
    stats: BatchStats,
}

impl BatchResult {
    pub(crate) fn new(
        succeeded: BTreeSet<PathBuf>,
        permanently_failed: BTreeMap<String, TransferError>,
        skipped: Vec<String>,
        abort: Option<BatchAbort>,
        stats: BatchStats,
    ) -> Self {
        Self {
            succeeded,
            permanently_failed,
            skipped,
            abort,
            stats,
        }
    }

    /// Final paths of committed files
    pub fn succeeded(&self) -> &BTreeSet<PathBuf> {
        &self.succeeded
    }

    /// URL to last error, for URLs that will not be attempted again
    pub fn permanently_failed(&self) -> &BTreeMap<String, TransferError> {
        &self.permanently_failed
    }

    /// URLs never attempted (or not re-attempted) because the batch stopped early
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn abort(&self) -> Option<&BatchAbort> {
        self.abort.as_ref()
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Every URL produced a file
    pub fn is_complete(&self) -> bool {
        self.abort.is_none() && self.permanently_failed.is_empty() && self.skipped.is_empty()
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(self.abort, Some(BatchAbort::Interrupted))
    }

    /// Convert an incomplete batch into an error for the caller's exit status
    pub fn ensure_complete(&self) -> Result<(), AppError> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(AppError::BatchIncomplete {
                failed: self.permanently_failed.len(),
                skipped: self.skipped.len(),
            })
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} of {} zone files downloaded ({}) in {}",
            self.succeeded.len(),
            self.stats.total_links,
            HumanBytes(self.stats.bytes_written),
            format_duration(self.stats.duration)
        );

        if !self.permanently_failed.is_empty() {
            summary.push_str(&format!(", {} failed", self.permanently_failed.len()));
        }
        if !self.skipped.is_empty() {
            summary.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        if let Some(abort) = &self.abort {
            summary.push_str(&format!("; {}", abort));
        }
        summary
    }
}

/// Format a duration as human-readable string
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}
