//! Application constants for CZDS Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for authentication
pub mod env {
    /// Environment variable name for the ICANN account username
    pub const USERNAME: &str = "CZDS_USERNAME";

    /// Environment variable name for the ICANN account password
    pub const PASSWORD: &str = "CZDS_PASSWORD";
}

/// ICANN service URLs and endpoint paths
pub mod czds {
    /// Default base URL of the ICANN account API (token exchange)
    pub const AUTH_BASE_URL: &str = "https://account-api.icann.org";

    /// Default base URL of the CZDS API (links and zone files)
    pub const CZDS_BASE_URL: &str = "https://czds-api.icann.org";

    /// Path of the token exchange endpoint, relative to the auth base URL
    pub const AUTHENTICATE_PATH: &str = "/api/authenticate";

    /// Path of the download links endpoint, relative to the CZDS base URL
    pub const LINKS_PATH: &str = "/czds/downloads/links";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("czds-fetcher/", env!("CARGO_PKG_VERSION"));

    /// Default deadline for authentication and link listing requests
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 10;
}

/// Rate limiting configuration
pub mod limits {
    /// Default rate limit for CZDS requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Extension appended to the URL basename when the server supplies no name
    pub const DEFAULT_EXTENSION: &str = ".gz";

    /// Default destination directory for zone files
    pub const DEFAULT_WORKING_DIR: &str = "./zonefiles";
}

/// Orchestrator and batch configuration
pub mod orchestrator {
    use super::Duration;

    /// Default number of concurrently executing transfers
    pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

    /// Extra rounds granted to URLs that failed with a retryable error
    pub const DEFAULT_RETRY_ROUNDS: u32 = 1;

    /// Pause before a retry round starts
    pub const DEFAULT_RETRY_ROUND_DELAY: Duration = Duration::from_secs(5);

    /// Upper bound on streaming a single zone file body
    pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

    /// Progress sampling interval
    pub const PROGRESS_TICK: Duration = Duration::from_millis(200);

    /// Maximum jitter added to the retry round delay (milliseconds)
    pub const RETRY_ROUND_JITTER_MS: u64 = 500;
}

// Re-export commonly used constants for convenience
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use orchestrator::{DEFAULT_CONCURRENCY_LIMIT, DEFAULT_RETRY_ROUNDS};
