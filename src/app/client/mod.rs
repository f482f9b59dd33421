//! Authenticated HTTP session for the ICANN CZDS API
//!
//! This module provides the [`Session`], which owns the bearer token shared by
//! every concurrent transfer, along with the pieces it is built from:
//! - `config`: HTTP client configuration and endpoint URLs
//! - `auth`: token exchange against the account API
//! - `http`: rate-limited request plumbing
//! - `catalog`: the list of downloadable zone file URLs
//!
//! # Token refresh
//!
//! Each token carries a [`TokenGeneration`]. A caller that gets an
//! auth-expired response hands the generation it used back to
//! [`Session::refresh`]. Refreshes are serialized behind one lock, and a
//! refresh whose generation is already stale returns immediately, so any
//! number of simultaneous 401s cost exactly one token exchange.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Response, StatusCode};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::auth::Credentials;
use crate::errors::{AuthError, AuthResult, Result};

// Module declarations
pub mod auth;
pub mod catalog;
pub mod config;
pub mod http;

#[cfg(test)]
pub mod tests;

pub use auth::{AccessToken, AuthHandler};
pub use catalog::LinkCatalog;
pub use config::{ClientConfig, Endpoints};

use http::HttpHandler;

/// Identifies which token a request was sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenGeneration(u64);

#[derive(Debug, Default)]
struct TokenState {
    generation: u64,
    token: Option<AccessToken>,
    /// Generation whose refresh failed; waiters on it must not retry the exchange
    failed_refresh: Option<u64>,
}

/// Response to an authorized request, tagged with the token generation used
#[derive(Debug)]
pub struct AuthorizedResponse {
    pub response: Response,
    pub generation: TokenGeneration,
}

impl AuthorizedResponse {
    /// Whether the server rejected the token as expired
    pub fn is_auth_expired(&self) -> bool {
        is_auth_expired(self.response.status())
    }
}

/// Whether a status code means the bearer token is no longer valid
pub fn is_auth_expired(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

/// Authenticated session shared by the catalog and every transfer
///
/// Created unauthenticated; valid after [`Session::authenticate`]; implicitly
/// invalidated whenever a request comes back auth-expired; revalidated by the
/// next successful exchange.
#[derive(Debug)]
pub struct Session {
    http: HttpHandler,
    endpoints: Endpoints,
    credentials: Credentials,
    token: RwLock<TokenState>,
    refresh_lock: Mutex<()>,
    exchanges: AtomicU64,
}

impl Session {
    /// Creates an unauthenticated session
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the HTTP client cannot be built or the rate
    /// limit is invalid
    pub fn new(config: &ClientConfig, endpoints: Endpoints, credentials: Credentials) -> Result<Self> {
        let client = config.build_http_client()?;
        let http = HttpHandler::new(client, config.rate_limit_rps, config.request_timeout)?;

        Ok(Self {
            http,
            endpoints,
            credentials,
            token: RwLock::new(TokenState::default()),
            refresh_lock: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        })
    }

    /// Exchanges the session credentials for a new token, replacing any prior one
    ///
    /// Waits for any refresh already in flight. On failure the current token is
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized`, `ServerError`, `ProtocolError` or
    /// `Http` as reported by the exchange
    pub async fn authenticate(&self) -> AuthResult<AccessToken> {
        let _guard = self.refresh_lock.lock().await;
        self.exchange().await
    }

    /// Refreshes the token after a request sent with `observed` was rejected
    ///
    /// If another task already replaced that token this returns at once and
    /// the caller simply retries with the new one.
    ///
    /// # Errors
    ///
    /// Returns the exchange error, or `AuthError::RefreshFailed` when the
    /// refresh this caller waited on had already failed
    pub async fn refresh(&self, observed: TokenGeneration) -> AuthResult<()> {
        let _guard = self.refresh_lock.lock().await;

        {
            let state = self.token.read().await;
            if state.generation != observed.0 {
                tracing::debug!(
                    "Token refresh skipped - generation {} already replaced by {}",
                    observed.0,
                    state.generation
                );
                return Ok(());
            }
            if state.failed_refresh == Some(observed.0) {
                return Err(AuthError::RefreshFailed);
            }
        }

        tracing::warn!("Access token expired; reauthenticating");
        self.exchange().await.map(|_| ())
    }

    /// Performs the token exchange; the caller must hold `refresh_lock`
    async fn exchange(&self) -> AuthResult<AccessToken> {
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        let result = AuthHandler::authenticate(
            &self.http,
            &self.endpoints.authenticate_url(),
            &self.credentials,
        )
        .await;

        let mut state = self.token.write().await;
        match result {
            Ok(token) => {
                state.generation += 1;
                state.token = Some(token.clone());
                state.failed_refresh = None;
                tracing::debug!("Stored access token generation {}", state.generation);
                Ok(token)
            }
            Err(e) => {
                state.failed_refresh = Some(state.generation);
                Err(e)
            }
        }
    }

    /// Issues an API GET with the current token attached, bounded by the
    /// configured request timeout
    ///
    /// Does not retry: only the caller knows whether it already refreshed
    /// once for this logical operation.
    pub async fn authorized_get(&self, url: &Url) -> reqwest::Result<AuthorizedResponse> {
        self.authorized(url, false).await
    }

    /// Like [`Session::authorized_get`], but the response body may stream for
    /// longer than the request timeout; the caller bounds the download itself
    pub async fn authorized_download(&self, url: &Url) -> reqwest::Result<AuthorizedResponse> {
        self.authorized(url, true).await
    }

    async fn authorized(&self, url: &Url, streaming: bool) -> reqwest::Result<AuthorizedResponse> {
        let (token, generation) = {
            let state = self.token.read().await;
            (state.token.clone(), TokenGeneration(state.generation))
        };
        let bearer = token.as_ref().map(AccessToken::as_str);

        let response = if streaming {
            self.http.get_stream(url, bearer).await?
        } else {
            self.http.get(url, bearer).await?
        };

        Ok(AuthorizedResponse {
            response,
            generation,
        })
    }

    /// Whether a token has been obtained
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.token.is_some()
    }

    /// Number of token exchanges performed so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// The endpoints this session talks to
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Account username (never the password)
    pub fn username(&self) -> &str {
        self.credentials.username()
    }
}
