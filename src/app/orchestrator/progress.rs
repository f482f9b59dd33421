//! Progress tracking for batch downloads
//!
//! Transfers only ever touch atomic counters through a [`TransferProgress`]
//! handle. A reporter task samples those counters on its own interval and
//! hands [`ProgressSnapshot`]s to whatever sink the caller supplies, so a slow
//! terminal can never hold up a transfer.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::HumanBytes;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Shared counters for one batch
#[derive(Debug)]
pub struct ProgressTracker {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    bytes_received: AtomicU64,
    active_bytes: AtomicU64,
    bytes_committed: AtomicU64,
    started: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ProgressTracker {
    /// Create a tracker expecting `total` URLs
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            retried: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            bytes_received: AtomicU64::new(0),
            active_bytes: AtomicU64::new(0),
            bytes_committed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Register a starting transfer; it counts as in flight until the handle drops
    pub fn begin_transfer(self: &Arc<Self>) -> TransferProgress {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        TransferProgress {
            tracker: Arc::clone(self),
            bytes: 0,
        }
    }

    /// A URL finished with a committed file
    pub fn record_success(&self, bytes_written: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_committed
            .fetch_add(bytes_written, Ordering::Relaxed);
    }

    /// A URL was given up on
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A URL was queued for another round
    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest number of simultaneously running transfers seen so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Read every counter
    ///
    /// Counters are read independently, so a snapshot taken mid-update may be
    /// off by one transfer; it is for display only.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            active_bytes: self.active_bytes.load(Ordering::Relaxed),
            bytes_committed: self.bytes_committed.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Start sampling on a fixed interval until `shutdown` fires or closes
    ///
    /// The sink runs on the reporter task; if it panics only the reporter dies.
    pub fn spawn_reporter<F>(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
        mut sink: F,
    ) -> JoinHandle<()>
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => sink(tracker.snapshot()),
                    _ = shutdown.recv() => {
                        debug!("Progress reporter received shutdown signal");
                        break;
                    }
                }
            }
        })
    }
}

/// Byte counter owned by one transfer attempt
#[derive(Debug)]
pub struct TransferProgress {
    tracker: Arc<ProgressTracker>,
    bytes: u64,
}

impl TransferProgress {
    /// Count bytes just written to the temporary file
    pub fn record(&mut self, bytes: u64) {
        self.bytes += bytes;
        self.tracker.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.tracker.active_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes this attempt has written so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for TransferProgress {
    fn drop(&mut self) {
        self.tracker
            .active_bytes
            .fetch_sub(self.bytes, Ordering::Relaxed);
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Point-in-time view of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    /// Bytes received by every attempt, including ones that later failed
    pub bytes_received: u64,
    /// Bytes written by transfers still running
    pub active_bytes: u64,
    /// Bytes in files committed under their final name
    pub bytes_committed: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// URLs with a final outcome
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }

    /// Average receive rate since the batch started
    pub fn rate_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_received as f64 / secs
        } else {
            0.0
        }
    }

    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed() as f64 / self.total as f64) * 100.0
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} done, {} failed, {} in flight, {} received ({}/s)",
            self.completed,
            self.total,
            self.failed,
            self.in_flight,
            HumanBytes(self.bytes_received),
            HumanBytes(self.rate_bps() as u64)
        )
    }
}
