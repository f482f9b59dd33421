//! Error types for CZDS Fetcher
//!
//! Errors are split by the component that raises them. Authentication and
//! catalog errors are fatal to a whole run; transfer errors are classified
//! per URL as permanent, retryable, or systemic (aborting the batch).

use std::path::PathBuf;

use thiserror::Error;

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The service rejected the credentials (HTTP 401 on token exchange, or a
    /// second 401 right after a fresh token was issued)
    #[error("Authentication rejected: {message}")]
    Unauthorized { message: String },

    /// The authentication service failed on its side
    #[error("Authentication server error: HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    /// The service answered with something we cannot interpret
    #[error("Authentication protocol error: {reason}")]
    ProtocolError { reason: String },

    /// HTTP request failed during authentication
    #[error("HTTP request failed during authentication")]
    Http(#[from] reqwest::Error),

    /// A concurrent re-authentication this caller was waiting on failed
    #[error("Re-authentication failed in another task; token is still expired")]
    RefreshFailed,

    /// No usable credentials after consulting every source
    #[error(
        "Missing CZDS credentials. Set them in the config file, in CZDS_USERNAME/CZDS_PASSWORD, or enter them when prompted"
    )]
    MissingCredentials,

    /// Credential input was rejected before contacting the service
    #[error("Invalid credential input: {reason}")]
    InvalidInput { reason: String },

    /// Reading credentials from the terminal failed
    #[error("Failed to read credentials from terminal")]
    Prompt(#[from] std::io::Error),
}

/// Errors while retrieving the list of downloadable zone files
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Authentication failed while fetching the catalog
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The links endpoint answered with a non-success status
    #[error("Links endpoint returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The links endpoint body was not a JSON array of strings
    #[error("Could not parse zone link list")]
    Parse(#[from] serde_json::Error),

    /// HTTP request failed
    #[error("HTTP request for zone links failed")]
    Http(#[from] reqwest::Error),
}

/// Errors of a single URL-to-file transfer attempt
#[derive(Error, Debug)]
pub enum TransferError {
    /// The token was rejected again right after re-authenticating
    #[error("Access denied after re-authentication")]
    Unauthorized,

    /// The zone file does not exist on the server
    #[error("Zone file not found (HTTP 404)")]
    NotFound,

    /// A transient failure; the URL may be attempted again in a later round
    #[error("Transient failure: {reason}")]
    Retryable { reason: String },

    /// The URL cannot be turned into a request or a file name
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Committing the finished file failed; disk failures are systemic
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    Io {
        temp_path: PathBuf,
        final_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Re-authentication failed mid-batch; no later transfer can succeed either
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl TransferError {
    /// Build a retryable error from anything displayable
    pub fn retryable(reason: impl std::fmt::Display) -> Self {
        Self::Retryable {
            reason: reason.to_string(),
        }
    }

    /// Whether the URL deserves another attempt in a later round
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Retryable { .. })
    }

    /// Whether the failure affects the whole batch rather than one URL
    pub fn is_systemic(&self) -> bool {
        matches!(self, TransferError::Io { .. } | TransferError::Auth(_))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O failed: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Could not serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The user configuration directory cannot be determined
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The batch finished without downloading every zone file
    #[error("Batch incomplete: {failed} failed, {skipped} not attempted")]
    BatchIncomplete { failed: usize, skipped: usize },

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Auth(AuthError::Http(_))
            | AppError::Auth(AuthError::ServerError { .. })
            | AppError::Catalog(CatalogError::Http(_))
            | AppError::Transfer(TransferError::Retryable { .. }) => true,

            AppError::Catalog(CatalogError::UnexpectedStatus { status, .. }) => *status >= 500,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) | AppError::Catalog(CatalogError::Auth(_)) => "authentication",
            AppError::Catalog(_) => "catalog",
            AppError::Transfer(_) => "transfer",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::BatchIncomplete { .. } => "batch",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
