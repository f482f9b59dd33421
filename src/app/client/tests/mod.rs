//! Tests for the CZDS session against mock servers
//!
//! The helpers here are shared with the transfer and orchestrator tests, which
//! all need a session pointed at a `wiremock` server.

pub mod real_authentication;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app::client::{ClientConfig, Endpoints, Session};
use crate::auth::Credentials;
use crate::constants::czds;

/// Credentials accepted by every mock auth endpoint
pub fn test_credentials() -> Credentials {
    Credentials::new("zone-admin@example.com", "correct horse battery staple").unwrap()
}

/// A session whose auth and CZDS endpoints both point at `server`
pub fn test_session(server: &MockServer) -> Session {
    test_session_with_config(&server.uri(), ClientConfig::default())
}

/// A session against `base_url` built from `config`, with rate limiting relaxed
pub fn test_session_with_config(base_url: &str, config: ClientConfig) -> Session {
    let endpoints = Endpoints::new(base_url, base_url).unwrap();
    let config = ClientConfig {
        rate_limit_rps: 1000,
        ..config
    };
    Session::new(&config, endpoints, test_credentials()).unwrap()
}

/// Serve every connection from a raw socket: a 200 response announcing
/// `content_length` body bytes, then `chunks` with `pause` between them, then
/// close. Announcing more than the chunks hold simulates a broken stream.
///
/// Returns the base URL; any path is answered the same way.
pub async fn spawn_trickle_server(
    content_length: usize,
    chunks: Vec<Vec<u8>>,
    pause: Duration,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let chunks = chunks.clone();
            tokio::spawn(async move {
                // Consume the request head so closing does not reset the connection
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    content_length
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for (i, chunk) in chunks.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(pause).await;
                    }
                    if socket.write_all(chunk).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", address)
}

/// Token exchange response carrying `token`
pub fn auth_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "accessToken": token,
        "message": "Authentication Successful"
    }))
}

/// Mount an auth endpoint that always hands out `token`
pub async fn mount_auth(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(czds::AUTHENTICATE_PATH))
        .respond_with(auth_response(token))
        .mount(server)
        .await;
}
