//! Configuration for the batch orchestrator
//!
//! Concurrency, retry budget, per-transfer deadline, and progress cadence.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{files, orchestrator};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Directory zone files are written into
    pub destination_dir: PathBuf,
    /// Maximum number of transfers running at once
    pub concurrency_limit: usize,
    /// Extra rounds a retryable URL gets after its first attempt
    pub retry_rounds: u32,
    /// Pause before each retry round
    pub retry_round_delay: Duration,
    /// Deadline for a single transfer attempt
    pub transfer_timeout: Option<Duration>,
    /// How often progress is sampled
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            destination_dir: PathBuf::from(files::DEFAULT_WORKING_DIR),
            concurrency_limit: orchestrator::DEFAULT_CONCURRENCY_LIMIT,
            retry_rounds: orchestrator::DEFAULT_RETRY_ROUNDS,
            retry_round_delay: orchestrator::DEFAULT_RETRY_ROUND_DELAY,
            transfer_timeout: Some(orchestrator::DEFAULT_TRANSFER_TIMEOUT),
            progress_interval: orchestrator::PROGRESS_TICK,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_destination_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination_dir = dir.into();
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_retry_rounds(mut self, rounds: u32) -> Self {
        self.retry_rounds = rounds;
        self
    }

    pub fn with_retry_round_delay(mut self, delay: Duration) -> Self {
        self.retry_round_delay = delay;
        self
    }

    /// `None` disables the per-transfer deadline
    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency_limit == 0 {
            return Err(invalid(
                "concurrency_limit",
                "0",
                "At least one transfer must be allowed to run",
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(invalid(
                "progress_interval",
                "0",
                "Progress interval cannot be zero",
            ));
        }

        if self.transfer_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid(
                "transfer_timeout",
                "0",
                "Transfer timeout cannot be zero; omit it to disable the deadline",
            ));
        }

        if self.destination_dir.as_os_str().is_empty() {
            return Err(invalid(
                "destination_dir",
                "",
                "Destination directory cannot be empty",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
