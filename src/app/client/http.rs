//! Rate-limited HTTP request plumbing
//!
//! Every request the session sends goes through a shared `governor` rate
//! limiter first, so a burst of concurrent transfers cannot hammer the API.
//! This layer never retries and never interprets status codes; that is the
//! caller's business.
//!
//! API calls carry a whole-request deadline. Zone file downloads do not:
//! their bodies may stream for hours and are bounded by the transfer deadline.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Serialize;
use url::Url;

use crate::errors::{ConfigError, ConfigResult};

/// HTTP operations handler with rate limiting
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
    request_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32, request_timeout: Duration) -> ConfigResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            request_timeout,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> ConfigResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Wait for a rate limiter slot, with jitter to avoid thundering herd
    async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }

    /// Send an API GET bounded by the request timeout, attaching
    /// `Authorization: Bearer <token>` when a token is given
    pub async fn get(&self, url: &Url, bearer_token: Option<&str>) -> reqwest::Result<Response> {
        self.send_get(url, bearer_token, Some(self.request_timeout)).await
    }

    /// Send a GET whose body may stream for longer than the request timeout
    pub async fn get_stream(
        &self,
        url: &Url,
        bearer_token: Option<&str>,
    ) -> reqwest::Result<Response> {
        self.send_get(url, bearer_token, None).await
    }

    async fn send_get(
        &self,
        url: &Url,
        bearer_token: Option<&str>,
        timeout: Option<Duration>,
    ) -> reqwest::Result<Response> {
        self.throttle().await;

        let mut request = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json, application/octet-stream");
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        tracing::debug!("GET {} -> {}", url, response.status());
        Ok(response)
    }

    /// POST a JSON body and expect JSON back
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &T,
    ) -> reqwest::Result<Response> {
        self.throttle().await;

        let response = self
            .client
            .post(url.as_str())
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        tracing::debug!("POST {} -> {}", url, response.status());
        Ok(response)
    }
}

/// Maximum number of characters of a response body kept for diagnostics
const BODY_PREVIEW_CHARS: usize = 512;

/// Shorten a response body for inclusion in an error message
pub(crate) fn body_preview(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        body.to_string()
    } else {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{}...", preview)
    }
}
