//! Batch download orchestration
//!
//! The [`Orchestrator`] turns a list of zone file URLs into committed files.
//! It is the only owner of the pending and retry queues: transfers run as
//! spawned tasks and report their outcome back over a channel, and the
//! coordinator loop alone decides what happens next.
//!
//! # Rounds
//!
//! Every URL gets one attempt in round 0. URLs whose attempt failed with a
//! retryable error are held until the round drains, then resubmitted, up to
//! `retry_rounds` extra rounds. After that they are recorded as permanent
//! failures with their last error; nothing is retried indefinitely.
//!
//! # Aborts
//!
//! A systemic failure (the disk refused a rename, or re-authentication
//! failed) or a shutdown request stops dispatching. Transfers already running
//! are allowed to finish and are recorded normally; URLs never dispatched are
//! reported as skipped.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use czds_fetcher::app::{
//!     ClientConfig, Endpoints, LinkCatalog, Orchestrator, OrchestratorConfig, Session,
//! };
//! use czds_fetcher::auth::Credentials;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("user@example.com", "secret")?;
//! let session = Arc::new(Session::new(
//!     &ClientConfig::default(),
//!     Endpoints::default(),
//!     credentials,
//! )?);
//! session.authenticate().await?;
//!
//! let links = LinkCatalog::fetch(&session).await?;
//! let config = OrchestratorConfig::default().with_concurrency_limit(4);
//! let result = Orchestrator::new(config, session)?.run(links).await?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod progress;
pub mod result;
pub mod signals;

#[cfg(test)]
pub mod tests;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::client::Session;
use crate::app::transfer::{Transfer, TransferOutcome};
use crate::constants::orchestrator as defaults;
use crate::errors::{Result, TransferError};

pub use config::OrchestratorConfig;
pub use progress::{ProgressSnapshot, ProgressTracker, TransferProgress};
pub use result::{BatchAbort, BatchResult, BatchStats};
pub use signals::{create_shutdown_channel, SignalHandler};

type ProgressSink = Box<dyn FnMut(ProgressSnapshot) + Send + 'static>;

/// Outcome of one attempt, sent from a transfer task to the coordinator
struct Report {
    url: String,
    round: u32,
    outcome: TransferOutcome,
}

/// Drives a bounded pool of concurrent transfers over a link list
pub struct Orchestrator {
    config: OrchestratorConfig,
    session: Arc<Session>,
    progress: Arc<ProgressTracker>,
    sink: Option<ProgressSink>,
}

impl Orchestrator {
    /// Create an orchestrator sharing `session` with every transfer
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` (as `AppError::Config`) if the
    /// configuration does not validate
    pub fn new(config: OrchestratorConfig, session: Arc<Session>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session,
            progress: Arc::new(ProgressTracker::default()),
            sink: None,
        })
    }

    /// Receive a progress snapshot every `progress_interval`
    pub fn with_progress_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Shared counters, readable while the batch runs
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    /// Download every link
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the destination directory cannot be created.
    /// Per-URL failures are reported in the [`BatchResult`], not as errors.
    pub async fn run(self, links: Vec<String>) -> Result<BatchResult> {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let result = self.run_with_shutdown(links, shutdown_rx).await;
        drop(shutdown_tx);
        result
    }

    /// Download every link, stopping dispatch when `shutdown` fires
    ///
    /// A closed shutdown channel is not a shutdown request.
    pub async fn run_with_shutdown(
        self,
        links: Vec<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<BatchResult> {
        let Orchestrator {
            config,
            session,
            progress,
            sink,
        } = self;

        tokio::fs::create_dir_all(&config.destination_dir).await?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let total_links = links.len();
        progress.set_total(total_links);

        info!(
            "Downloading {} zone files into {} with up to {} concurrent transfers",
            total_links,
            config.destination_dir.display(),
            config.concurrency_limit
        );

        let (reporter_tx, reporter_rx) = broadcast::channel(1);
        let reporter = sink
            .map(|sink| progress.spawn_reporter(config.progress_interval, reporter_rx, sink));

        let (report_tx, mut report_rx) = mpsc::channel::<Report>(config.concurrency_limit);

        let mut pending: VecDeque<String> = links.into();
        let mut next_round: Vec<String> = Vec::new();
        let mut round: u32 = 0;
        let mut in_flight = 0usize;
        let mut attempts = 0usize;
        let mut bytes_written = 0u64;
        let mut shutdown_closed = false;

        let mut succeeded = BTreeSet::new();
        let mut permanently_failed: BTreeMap<String, TransferError> = BTreeMap::new();
        let mut abort: Option<BatchAbort> = None;

        loop {
            while abort.is_none() && in_flight < config.concurrency_limit {
                let Some(url) = pending.pop_front() else {
                    break;
                };
                spawn_transfer(&config, &session, &progress, url, round, report_tx.clone());
                in_flight += 1;
                attempts += 1;
            }

            if in_flight == 0 {
                if abort.is_some() || next_round.is_empty() {
                    break;
                }

                let pause = retry_pause(config.retry_round_delay);
                if !pause.is_zero() {
                    info!(
                        "Waiting {:.1}s before retry round {}",
                        pause.as_secs_f64(),
                        round + 1
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = shutdown_requested(&mut shutdown, &mut shutdown_closed) => {
                            info!("Shutdown requested before retry round; stopping");
                            abort = Some(BatchAbort::Interrupted);
                            continue;
                        }
                    }
                }

                round += 1;
                info!(
                    "Starting retry round {}/{} for {} zone files",
                    round,
                    config.retry_rounds,
                    next_round.len()
                );
                pending.extend(next_round.drain(..));
                continue;
            }

            tokio::select! {
                report = report_rx.recv() => {
                    // The coordinator holds a sender, so the channel cannot close here
                    let Some(Report { url, round: attempt_round, outcome }) = report else {
                        break;
                    };
                    in_flight -= 1;

                    match outcome {
                        TransferOutcome::Success { path, bytes_written: written } => {
                            progress.record_success(written);
                            bytes_written += written;
                            succeeded.insert(path);
                        }
                        TransferOutcome::RetryableFailure(e) if attempt_round < config.retry_rounds => {
                            debug!("Queueing {} for round {}: {}", url, attempt_round + 1, e);
                            progress.record_retry();
                            next_round.push(url);
                        }
                        TransferOutcome::RetryableFailure(e) => {
                            warn!("Giving up on {} after {} rounds: {}", url, attempt_round + 1, e);
                            progress.record_failure();
                            permanently_failed.insert(url, e);
                        }
                        TransferOutcome::PermanentFailure(e) => {
                            progress.record_failure();
                            if e.is_systemic() && !matches!(abort, Some(BatchAbort::Systemic { .. })) {
                                error!("Aborting batch: {}", e);
                                abort = Some(BatchAbort::Systemic {
                                    url: url.clone(),
                                    reason: e.to_string(),
                                });
                            }
                            permanently_failed.insert(url, e);
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown, &mut shutdown_closed), if abort.is_none() => {
                    info!("Shutdown requested; waiting for {} running transfers", in_flight);
                    abort = Some(BatchAbort::Interrupted);
                }
            }
        }

        let _ = reporter_tx.send(());
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                warn!("Progress reporter stopped abnormally: {}", e);
            }
        }

        let mut skipped: Vec<String> = pending.into_iter().collect();
        skipped.extend(next_round);

        let stats = BatchStats {
            total_links,
            bytes_written,
            rounds: if attempts == 0 { 0 } else { round + 1 },
            attempts,
            peak_in_flight: progress.peak_in_flight(),
            auth_exchanges: session.exchange_count(),
            started_at,
            duration: clock.elapsed(),
        };

        let result = BatchResult::new(succeeded, permanently_failed, skipped, abort, stats);
        info!("{}", result.summary());
        Ok(result)
    }
}

fn spawn_transfer(
    config: &OrchestratorConfig,
    session: &Arc<Session>,
    progress: &Arc<ProgressTracker>,
    url: String,
    round: u32,
    report_tx: mpsc::Sender<Report>,
) {
    let mut transfer =
        Transfer::new(url.clone(), &config.destination_dir).with_progress(progress.begin_transfer());
    if let Some(timeout) = config.transfer_timeout {
        transfer = transfer.with_timeout(timeout);
    }
    let session = Arc::clone(session);

    tokio::spawn(async move {
        let outcome = guarded(&url, async move { transfer.run(&session).await }).await;
        if report_tx.send(Report { url, round, outcome }).await.is_err() {
            debug!("Coordinator stopped before the outcome was reported");
        }
    });
}

/// Run a transfer future, turning a panic into a retryable failure
///
/// The coordinator counts on exactly one report per dispatched URL.
async fn guarded<F>(url: &str, transfer: F) -> TransferOutcome
where
    F: Future<Output = TransferOutcome>,
{
    match AssertUnwindSafe(transfer).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("Transfer task for {} panicked", url);
            TransferOutcome::RetryableFailure(TransferError::retryable("transfer task panicked"))
        }
    }
}

/// The configured pause plus jitter, or nothing if no pause is configured
fn retry_pause(delay: Duration) -> Duration {
    if delay.is_zero() {
        return Duration::ZERO;
    }
    delay + Duration::from_millis(fastrand::u64(0..=defaults::RETRY_ROUND_JITTER_MS))
}

/// Resolve when shutdown is requested; never resolve once the channel closed
async fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>, closed: &mut bool) {
    if !*closed {
        match shutdown.recv().await {
            Err(RecvError::Closed) => *closed = true,
            Ok(()) | Err(RecvError::Lagged(_)) => return,
        }
    }
    std::future::pending::<()>().await
}
