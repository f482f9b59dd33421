//! Credential management for the ICANN account API
//!
//! # Examples
//!
//! ```rust,no_run
//! use czds_fetcher::auth::resolve_credentials;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Environment first, then prompt on the terminal
//! let credentials = resolve_credentials(None, None, true)?;
//! println!("Logging in as {}", credentials.username());
//! # Ok(())
//! # }
//! ```

pub mod credentials;

// Re-export main public API
pub use credentials::{
    check_credentials, prompt_password, prompt_username, resolve_credentials, Credentials,
};
