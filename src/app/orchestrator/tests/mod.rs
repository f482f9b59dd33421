//! Unit tests for the orchestrator
//!
//! Each test runs a batch against a `wiremock` server standing in for both the
//! account API and the CZDS download endpoints. End-to-end runs through the
//! library's public API live in the top-level tests directory.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app::client::tests::{auth_response, mount_auth, spawn_trickle_server, test_session};
use crate::constants::czds;
use crate::errors::TransferError;

use super::*;

/// Configuration with no pauses, suitable for testing
pub fn create_test_config(dir: &Path) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_destination_dir(dir)
        .with_concurrency_limit(4)
        .with_retry_rounds(1)
        .with_retry_round_delay(Duration::ZERO)
        .with_transfer_timeout(Some(Duration::from_secs(10)))
        .with_progress_interval(Duration::from_millis(10))
}

fn zone_path(name: &str) -> String {
    format!("/czds/downloads/{}.zone", name)
}

fn zone_link(server: &MockServer, name: &str) -> String {
    format!("{}{}", server.uri(), zone_path(name))
}

async fn mount_zone(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(zone_path(name)))
        .respond_with(response)
        .mount(server)
        .await;
}

fn zone_body(name: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_bytes(format!("$ORIGIN {}.\n", name).into_bytes())
}

async fn authenticated_session(server: &MockServer) -> Arc<Session> {
    let session = Arc::new(test_session(server));
    session.authenticate().await.unwrap();
    session
}

#[tokio::test]
async fn test_not_found_is_isolated() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    let names = ["com", "net", "org", "info", "biz"];
    for name in names {
        if name == "org" {
            Mock::given(method("GET"))
                .and(path(zone_path(name)))
                .respond_with(ResponseTemplate::new(404))
                .expect(1)
                .mount(&server)
                .await;
        } else {
            mount_zone(&server, name, zone_body(name)).await;
        }
    }

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links: Vec<String> = names.iter().map(|n| zone_link(&server, n)).collect();

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .run(links)
        .await
        .unwrap();

    assert_eq!(result.succeeded().len(), 4);
    assert_eq!(result.permanently_failed().len(), 1);
    assert!(matches!(
        result.permanently_failed().get(&zone_link(&server, "org")),
        Some(TransferError::NotFound)
    ));
    assert!(result.abort().is_none());
    assert!(result.skipped().is_empty());
    assert!(dir.path().join("com.zone.gz").exists());
    assert!(!dir.path().join("org.zone.gz").exists());
    assert_eq!(result.stats().attempts, 5);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    let names: Vec<String> = (0..12).map(|i| format!("tld{}", i)).collect();
    for name in &names {
        mount_zone(
            &server,
            name,
            zone_body(name).set_delay(Duration::from_millis(100)),
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links = names.iter().map(|n| zone_link(&server, n)).collect();
    let config = create_test_config(dir.path()).with_concurrency_limit(3);

    let orchestrator = Orchestrator::new(config, session).unwrap();
    let progress = orchestrator.progress();
    let result = orchestrator.run(links).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.succeeded().len(), 12);
    assert!(progress.peak_in_flight() <= 3);
    assert!(result.stats().peak_in_flight >= 1);
    assert_eq!(progress.snapshot().in_flight, 0);
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(zone_path("flaky")))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    mount_zone(&server, "stable", zone_body("stable")).await;

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links = vec![zone_link(&server, "flaky"), zone_link(&server, "stable")];

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .run(links)
        .await
        .unwrap();

    assert_eq!(result.succeeded().len(), 1);
    assert!(matches!(
        result.permanently_failed().get(&zone_link(&server, "flaky")),
        Some(TransferError::Retryable { .. })
    ));
    assert_eq!(result.stats().rounds, 2);
    assert_eq!(result.stats().attempts, 3);
    assert!(result.abort().is_none());
}

#[tokio::test]
async fn test_repeatedly_broken_stream_fails_permanently() {
    // Every connection announces 4096 bytes but closes after 1024
    let broken_base =
        spawn_trickle_server(4096, vec![vec![b';'; 1024]], Duration::from_millis(10)).await;
    let broken = format!("{}{}", broken_base, zone_path("broken"));

    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    mount_zone(&server, "sibling", zone_body("sibling")).await;

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links = vec![broken.clone(), zone_link(&server, "sibling")];

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .run(links)
        .await
        .unwrap();

    assert!(matches!(
        result.permanently_failed().get(&broken),
        Some(TransferError::Retryable { .. })
    ));
    assert_eq!(result.succeeded().len(), 1);
    assert!(result.abort().is_none());
    assert_eq!(result.stats().attempts, 3);

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["sibling.zone.gz".to_string()]);
}

#[tokio::test]
async fn test_zero_retry_rounds_means_single_attempt() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(zone_path("flaky")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let config = create_test_config(dir.path()).with_retry_rounds(0);

    let result = Orchestrator::new(config, session)
        .unwrap()
        .run(vec![zone_link(&server, "flaky")])
        .await
        .unwrap();

    assert_eq!(result.permanently_failed().len(), 1);
    assert_eq!(result.stats().rounds, 1);
}

#[tokio::test]
async fn test_transient_failure_recovers_next_round() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(zone_path("shaky")))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_zone(&server, "shaky", zone_body("shaky")).await;

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .run(vec![zone_link(&server, "shaky")])
        .await
        .unwrap();

    assert!(result.is_complete());
    assert!(result.succeeded().contains(&dir.path().join("shaky.zone.gz")));
    assert_eq!(result.stats().rounds, 2);
}

#[tokio::test]
async fn test_concurrent_expiry_triggers_one_reauthentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(czds::AUTHENTICATE_PATH))
        .respond_with(auth_response("stale"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(czds::AUTHENTICATE_PATH))
        .respond_with(auth_response("fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let names: Vec<String> = (0..6).map(|i| format!("zone{}", i)).collect();
    for name in &names {
        Mock::given(method("GET"))
            .and(path(zone_path(name)))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(zone_path(name)))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(zone_body(name))
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links = names.iter().map(|n| zone_link(&server, n)).collect();
    let config = create_test_config(dir.path()).with_concurrency_limit(6);

    let result = Orchestrator::new(config, Arc::clone(&session))
        .unwrap()
        .run(links)
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.succeeded().len(), 6);
    assert_eq!(session.exchange_count(), 2);
    assert_eq!(result.stats().auth_exchanges, 2);
}

#[tokio::test]
async fn test_io_failure_aborts_batch() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    let names = ["blocked", "b", "c", "d"];
    for name in names {
        mount_zone(&server, name, zone_body(name)).await;
    }

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocked.zone.gz");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("occupied"), b"x").unwrap();

    let session = authenticated_session(&server).await;
    let links = names.iter().map(|n| zone_link(&server, n)).collect();
    let config = create_test_config(dir.path()).with_concurrency_limit(1);

    let result = Orchestrator::new(config, session)
        .unwrap()
        .run(links)
        .await
        .unwrap();

    assert!(matches!(result.abort(), Some(BatchAbort::Systemic { .. })));
    assert!(matches!(
        result.permanently_failed().get(&zone_link(&server, "blocked")),
        Some(TransferError::Io { .. })
    ));
    assert!(result.succeeded().is_empty());
    assert_eq!(result.skipped().len(), 3);
    assert!(!result.is_complete());
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_and_skips_rest() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    let names = ["first", "second", "third"];
    for name in names {
        mount_zone(
            &server,
            name,
            zone_body(name).set_delay(Duration::from_millis(300)),
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let links = names.iter().map(|n| zone_link(&server, n)).collect();
    let config = create_test_config(dir.path()).with_concurrency_limit(1);

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
    });

    let result = Orchestrator::new(config, session)
        .unwrap()
        .run_with_shutdown(links, shutdown_rx)
        .await
        .unwrap();

    assert!(result.was_interrupted());
    assert_eq!(result.succeeded().len(), 1);
    assert!(dir.path().join("first.zone.gz").exists());
    assert_eq!(
        result.skipped(),
        &[zone_link(&server, "second"), zone_link(&server, "third")]
    );
}

#[tokio::test]
async fn test_progress_sink_receives_snapshots() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;
    mount_zone(
        &server,
        "slow",
        zone_body("slow").set_delay(Duration::from_millis(100)),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let session = authenticated_session(&server).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .with_progress_sink(move |snapshot| sink_seen.lock().unwrap().push(snapshot))
        .run(vec![zone_link(&server, "slow")])
        .await
        .unwrap();

    assert!(result.is_complete());
    let snapshots = seen.lock().unwrap();
    assert!(!snapshots.is_empty());
    assert!(snapshots.iter().all(|s| s.total == 1));
}

#[tokio::test]
async fn test_empty_link_list() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let session = Arc::new(test_session(&server));

    let result = Orchestrator::new(create_test_config(dir.path()), session)
        .unwrap()
        .run(Vec::new())
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.stats().rounds, 0);
}

#[tokio::test]
async fn test_panicking_transfer_is_reported_retryable() {
    let explode = true;
    let outcome = guarded("https://czds.example/czds/downloads/boom.zone", async move {
        if explode {
            panic!("transfer blew up");
        }
        TransferOutcome::PermanentFailure(TransferError::NotFound)
    })
    .await;

    assert!(matches!(outcome, TransferOutcome::RetryableFailure(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let server_uri = "http://127.0.0.1:9";
    let endpoints = crate::app::client::Endpoints::new(server_uri, server_uri).unwrap();
    let session = Arc::new(
        Session::new(
            &crate::app::client::ClientConfig::default(),
            endpoints,
            crate::app::client::tests::test_credentials(),
        )
        .unwrap(),
    );

    let config = OrchestratorConfig::default().with_concurrency_limit(0);
    assert!(Orchestrator::new(config, session).is_err());
}
