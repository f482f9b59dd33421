//! CZDS Fetcher Library
//!
//! A Rust library for downloading zone files from ICANN's Centralized Zone
//! Data Service. Provides an authenticated session with single-flight token
//! refresh, atomic per-file transfers, and a bounded-concurrency batch
//! orchestrator with retry rounds.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
