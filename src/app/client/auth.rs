//! ICANN token exchange
//!
//! This module posts the account credentials to the authentication endpoint
//! and interprets the answer. It knows nothing about token storage; the
//! session decides what to do with the token it gets back.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::http::{body_preview, HttpHandler};
use crate::auth::Credentials;
use crate::errors::{AuthError, AuthResult};

/// Opaque bearer token returned by the authentication endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// The raw token, for the `Authorization` header only
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Handles token exchange operations
pub struct AuthHandler;

impl AuthHandler {
    /// Exchanges username/password for a bearer token
    ///
    /// # Arguments
    ///
    /// * `http` - Rate-limited HTTP handler
    /// * `url` - The token exchange endpoint
    /// * `credentials` - Account credentials
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if:
    /// - The request cannot be sent (`Http`)
    /// - The credentials are rejected (`Unauthorized`)
    /// - The server fails (`ServerError`)
    /// - The response is not the expected JSON, or the endpoint does not exist (`ProtocolError`)
    pub async fn authenticate(
        http: &HttpHandler,
        url: &Url,
        credentials: &Credentials,
    ) -> AuthResult<AccessToken> {
        tracing::info!("Authenticating with ICANN as {}", credentials.username());

        let request = AuthRequest {
            username: credentials.username(),
            password: credentials.password(),
        };
        let response = http.post_json(url, &request).await?;
        let status = response.status();
        let body = response.text().await?;

        let token = Self::interpret_response(status, &body, url)?;
        tracing::info!("Authentication succeeded for {}", credentials.username());
        Ok(token)
    }

    /// Maps the status and body of an authentication response to a token or error
    fn interpret_response(status: StatusCode, body: &str, url: &Url) -> AuthResult<AccessToken> {
        match status {
            StatusCode::OK => {
                let parsed: AuthResponse =
                    serde_json::from_str(body).map_err(|e| AuthError::ProtocolError {
                        reason: format!("invalid response body ({}): {}", e, body_preview(body)),
                    })?;

                if parsed.access_token.trim().is_empty() {
                    return Err(AuthError::ProtocolError {
                        reason: "response contained an empty access token".to_string(),
                    });
                }

                Ok(AccessToken(parsed.access_token))
            }
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("Authentication rejected: invalid credentials");
                Err(AuthError::Unauthorized {
                    message: format!("invalid credentials: {}", body_preview(body)),
                })
            }
            StatusCode::NOT_FOUND => Err(AuthError::ProtocolError {
                reason: format!("authentication endpoint not found: {}", url),
            }),
            status if status.is_server_error() => Err(AuthError::ServerError {
                status: status.as_u16(),
                body: body_preview(body),
            }),
            status => Err(AuthError::ProtocolError {
                reason: format!("unexpected HTTP {}: {}", status.as_u16(), body_preview(body)),
            }),
        }
    }
}
