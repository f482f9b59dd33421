//! Command handlers for CZDS Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! and the loaded configuration to the core application functionality.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::HumanBytes;
use tracing::{debug, info, warn};

use crate::app::orchestrator::create_shutdown_channel;
use crate::app::{LinkCatalog, Orchestrator, Session, SignalHandler, Transfer, TransferOutcome};
use crate::auth::resolve_credentials;
use crate::cli::{ConfigAction, ConfigArgs, DownloadArgs, FetchArgs, ProgressDisplay};
use crate::config::{AppConfig, RuntimeConfig};
use crate::errors::{AppError, Result};

/// Resolve credentials, build the session and exchange them for a token
async fn open_session(config: &AppConfig, runtime: &RuntimeConfig) -> Result<Arc<Session>> {
    let interactive = atty::is(atty::Stream::Stdin);
    let credentials = resolve_credentials(
        config.credentials.username.clone(),
        config.credentials.password.clone(),
        interactive,
    )?;

    let session = Session::new(&runtime.client, runtime.endpoints.clone(), credentials)?;
    session.authenticate().await?;
    info!("Authenticated as {}", session.username());

    Ok(Arc::new(session))
}

/// Handle the download command
///
/// Authenticates, lists every approved zone file and downloads them all.
/// Returns `AppError::BatchIncomplete` if any zone file was not saved.
pub async fn handle_download(args: DownloadArgs, config: &AppConfig) -> Result<()> {
    let start_time = Instant::now();

    args.validate().map_err(AppError::generic)?;

    let runtime = config.to_runtime_config()?;
    let mut orchestrator_config = runtime.orchestrator.clone();
    if let Some(workers) = args.workers {
        orchestrator_config = orchestrator_config.with_concurrency_limit(workers);
    }
    if let Some(output) = &args.output {
        orchestrator_config = orchestrator_config.with_destination_dir(output.clone());
    }
    if let Some(rounds) = args.retry_rounds {
        orchestrator_config = orchestrator_config.with_retry_rounds(rounds);
    }

    let session = open_session(config, &runtime).await?;

    let mut links = LinkCatalog::fetch(&session).await?;
    info!("Account has access to {} zone files", links.len());
    if let Some(limit) = args.limit {
        if links.len() > limit {
            debug!("Limiting batch to the first {} of {} links", limit, links.len());
            links.truncate(limit);
        }
    }

    if links.is_empty() {
        println!("No zone files available for this account.");
        return Ok(());
    }

    println!(
        "Downloading {} zone files into {} ({} concurrent)...",
        links.len(),
        orchestrator_config.destination_dir.display(),
        orchestrator_config.concurrency_limit
    );

    let display = ProgressDisplay::new(!args.no_progress, links.len());
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signals = SignalHandler::new(shutdown_tx).setup();

    let orchestrator =
        Orchestrator::new(orchestrator_config, session)?.with_progress_sink(display.sink());
    let result = orchestrator.run_with_shutdown(links, shutdown_rx).await;

    signals.abort();
    display.finish();
    let result = result?;

    let stats = result.stats();
    println!("\n📊 Download Summary:");
    println!("  {}", result.summary());
    println!("  Attempts: {} over {} rounds", stats.attempts, stats.rounds);
    println!("  Peak concurrency: {}", stats.peak_in_flight);
    println!("  Token exchanges: {}", stats.auth_exchanges);
    println!("  Total time: {:?}", start_time.elapsed());

    if !result.permanently_failed().is_empty() {
        println!("\nFailed:");
        for (url, error) in result.permanently_failed() {
            println!("  • {}: {}", url, error);
        }
    }
    if !result.skipped().is_empty() {
        println!("\nNot attempted ({}):", result.skipped().len());
        for url in result.skipped() {
            println!("  • {}", url);
        }
    }

    result.ensure_complete()
}

/// Handle the links command: print every downloadable zone file URL
pub async fn handle_links(config: &AppConfig) -> Result<()> {
    let runtime = config.to_runtime_config()?;
    let session = open_session(config, &runtime).await?;

    let links = LinkCatalog::fetch(&session).await?;
    info!("Account has access to {} zone files", links.len());

    for link in links {
        println!("{}", link);
    }
    Ok(())
}

/// Handle the fetch command: download one zone file
pub async fn handle_fetch(args: FetchArgs, config: &AppConfig) -> Result<()> {
    let runtime = config.to_runtime_config()?;
    let destination_dir = args
        .output
        .clone()
        .unwrap_or_else(|| runtime.orchestrator.destination_dir.clone());
    tokio::fs::create_dir_all(&destination_dir).await?;

    let session = open_session(config, &runtime).await?;

    let mut transfer = Transfer::new(args.url.as_str(), &destination_dir);
    if let Some(timeout) = runtime.orchestrator.transfer_timeout {
        transfer = transfer.with_timeout(timeout);
    }

    match transfer.run(&session).await {
        TransferOutcome::Success {
            path,
            bytes_written,
        } => {
            println!("Saved {} ({})", path.display(), HumanBytes(bytes_written));
            Ok(())
        }
        TransferOutcome::RetryableFailure(e) => {
            warn!("Transient failure fetching {}: {}", args.url, e);
            Err(e.into())
        }
        TransferOutcome::PermanentFailure(e) => Err(e.into()),
    }
}

/// Handle configuration management
pub async fn handle_config(
    args: ConfigArgs,
    config: &AppConfig,
    config_file: Option<PathBuf>,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::default_config_path()?,
            };
            AppConfig::write_default(&path, force).await?;
            println!("✅ Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            match AppConfig::locate(config_file).await? {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No configuration file found; showing defaults"),
            }
            print!("{}", config.redacted().to_toml_string()?);
            Ok(())
        }
    }
}
