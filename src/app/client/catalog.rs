//! Zone file link catalog
//!
//! Fetches the list of zone file URLs the account is approved for.

use crate::app::client::http::body_preview;
use crate::app::client::Session;
use crate::errors::{AuthError, CatalogError, CatalogResult};

/// Reads the authoritative list of downloadable zone files
pub struct LinkCatalog;

impl LinkCatalog {
    /// Fetch the link list, re-authenticating once if the token has expired
    ///
    /// Order is preserved as served so that logs are reproducible.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if:
    /// - The token is rejected again right after a refresh (`Auth(Unauthorized)`)
    /// - The refresh itself fails (`Auth`)
    /// - The endpoint answers with any other non-success status (`UnexpectedStatus`)
    /// - The body is not a JSON array of strings (`Parse`)
    pub async fn fetch(session: &Session) -> CatalogResult<Vec<String>> {
        let url = session.endpoints().links_url();

        let mut attempt = session.authorized_get(&url).await?;
        if attempt.is_auth_expired() {
            tracing::warn!("Links request rejected with HTTP 401; refreshing token");
            session.refresh(attempt.generation).await?;

            attempt = session.authorized_get(&url).await?;
            if attempt.is_auth_expired() {
                let body = attempt.response.text().await.unwrap_or_default();
                return Err(CatalogError::Auth(AuthError::Unauthorized {
                    message: format!(
                        "links request rejected after re-authentication: {}",
                        body_preview(&body)
                    ),
                }));
            }
        }

        let status = attempt.response.status();
        let body = attempt.response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        let links: Vec<String> = serde_json::from_str(&body)?;
        tracing::info!("Catalog lists {} zone files", links.len());
        Ok(links)
    }
}
