//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of HTTP clients
//! for the ICANN account and CZDS APIs, plus the endpoint URLs they talk to.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{czds, http, limits};
use crate::errors::{AuthError, AuthResult, ConfigError, ConfigResult};

/// Configuration for HTTP client behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Deadline for API requests (token exchange, link listing), body included.
    /// Zone file downloads are not bound by it.
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// No client-wide timeout is set: it would also cut off zone file bodies.
    /// `request_timeout` is applied per request by `HttpHandler`.
    pub fn build_http_client(&self) -> AuthResult<Client> {
        let mut client_builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        // Configure TCP keep-alive if specified
        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        // Configure connection pool idle timeout
        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(AuthError::Http)
    }
}

/// Base URLs of the two services a session talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    auth_base_url: Url,
    czds_base_url: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(czds::AUTH_BASE_URL, czds::CZDS_BASE_URL)
            .expect("Built-in base URLs should be valid")
    }
}

impl Endpoints {
    /// Parse both base URLs
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn new(auth_base_url: &str, czds_base_url: &str) -> ConfigResult<Self> {
        Ok(Self {
            auth_base_url: parse_base_url("auth_base_url", auth_base_url)?,
            czds_base_url: parse_base_url("czds_base_url", czds_base_url)?,
        })
    }

    /// Token exchange endpoint
    pub fn authenticate_url(&self) -> Url {
        join_path(&self.auth_base_url, czds::AUTHENTICATE_PATH)
    }

    /// Download links endpoint
    pub fn links_url(&self) -> Url {
        join_path(&self.czds_base_url, czds::LINKS_PATH)
    }
}

fn parse_base_url(field: &str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Only http and https URLs are supported".to_string(),
        });
    }

    Ok(url)
}

/// Append an absolute endpoint path to a base URL, keeping any base path
fn join_path(base: &Url, endpoint: &str) -> Url {
    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), endpoint);
    url.set_path(&joined);
    url
}
