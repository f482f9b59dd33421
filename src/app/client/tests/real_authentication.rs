//! Real ICANN authentication integration tests
//!
//! These tests require actual CZDS credentials and network access.

#[cfg(test)]
mod tests {
    use crate::app::client::{ClientConfig, Endpoints, LinkCatalog, Session};
    use crate::auth::resolve_credentials;

    #[tokio::test]
    #[ignore] // Requires real CZDS credentials
    async fn test_real_authentication_and_catalog() {
        // Set CZDS_USERNAME and CZDS_PASSWORD (or a .env file), then run:
        // cargo test test_real_authentication -- --ignored --nocapture
        dotenv::dotenv().ok();

        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .try_init()
            .ok();

        let credentials = match resolve_credentials(None, None, false) {
            Ok(credentials) => credentials,
            Err(e) => {
                println!("Skipping: {}", e);
                return;
            }
        };

        let session = Session::new(&ClientConfig::default(), Endpoints::default(), credentials)
            .expect("Failed to create session");
        session.authenticate().await.expect("Authentication failed");

        let links = LinkCatalog::fetch(&session)
            .await
            .expect("Failed to fetch zone links");
        println!("Account has access to {} zone files", links.len());
        assert!(links.iter().all(|link| link.starts_with("http")));
    }
}
