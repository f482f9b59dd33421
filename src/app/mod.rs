//! Core application logic for CZDS Fetcher
//!
//! This module contains the authenticated session, the link catalog, single
//! file transfers, and the batch orchestrator that drives them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use czds_fetcher::app::{ClientConfig, Endpoints, LinkCatalog, Session, Transfer};
//! use czds_fetcher::auth::Credentials;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::new("user@example.com", "secret")?;
//! let session = Session::new(&ClientConfig::default(), Endpoints::default(), credentials)?;
//! session.authenticate().await?;
//!
//! // Download the first zone file the account can see
//! let links = LinkCatalog::fetch(&session).await?;
//! if let Some(url) = links.first() {
//!     let outcome = Transfer::new(url.as_str(), "./zonefiles").run(&session).await;
//!     println!("{:?}", outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod orchestrator;
pub mod transfer;

// Re-export main public API
pub use client::{AccessToken, ClientConfig, Endpoints, LinkCatalog, Session, TokenGeneration};
pub use orchestrator::{
    BatchAbort, BatchResult, BatchStats, Orchestrator, OrchestratorConfig, ProgressSnapshot,
    ProgressTracker, SignalHandler,
};
pub use transfer::{Transfer, TransferOutcome};
