//! Prelude module for CZDS Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use czds_fetcher::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use czds_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let credentials = resolve_credentials(None, None, true)?;
//!     let session = Arc::new(Session::new(
//!         &ClientConfig::default(),
//!         Endpoints::default(),
//!         credentials,
//!     )?);
//!     session.authenticate().await?;
//!
//!     let links = LinkCatalog::fetch(&session).await?;
//!     let result = Orchestrator::new(OrchestratorConfig::default(), session)?
//!         .run(links)
//!         .await?;
//!     result.ensure_complete()?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result, TransferError};

// Essential app components
pub use crate::app::{
    BatchAbort, BatchResult, BatchStats, ClientConfig, Endpoints, LinkCatalog, Orchestrator,
    OrchestratorConfig, ProgressSnapshot, ProgressTracker, Session, Transfer, TransferOutcome,
};

// Credentials
pub use crate::auth::{check_credentials, resolve_credentials, Credentials};

// Configuration file
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_RATE_LIMIT_RPS, DEFAULT_RETRY_ROUNDS, ENV_PASSWORD,
    ENV_USERNAME, USER_AGENT,
};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let _endpoints = Endpoints::default();
        let orchestrator_config = OrchestratorConfig::default();
        assert_eq!(orchestrator_config.concurrency_limit, DEFAULT_CONCURRENCY_LIMIT);

        let _has_creds = check_credentials();
        assert!(USER_AGENT.contains("czds-fetcher"));
    }

    #[test]
    fn test_session_from_prelude_types() {
        let credentials = Credentials::new("user@example.com", "secret").unwrap();
        let session =
            Session::new(&ClientConfig::default(), Endpoints::default(), credentials).unwrap();
        assert_eq!(session.username(), "user@example.com");
        assert_eq!(session.exchange_count(), 0);
    }
}
