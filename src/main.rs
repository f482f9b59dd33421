//! CZDS Fetcher CLI application
//!
//! Command-line interface for downloading zone files from ICANN's Centralized
//! Zone Data Service. Features concurrent downloads, bounded retries, progress
//! tracking, and atomic file writes.

use std::process;

use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use czds_fetcher::cli::{
    handle_config, handle_download, handle_fetch, handle_links, Cli, Commands,
};
use czds_fetcher::config::AppConfig;
use czds_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);

    info!("CZDS Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, &config).await
        }
        Commands::Links => {
            info!("Executing links command");
            handle_links(&config).await
        }
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, &config).await
        }
        Commands::Config(args) => handle_config(args, &config, cli.global.config.clone()).await,
    }
}

/// Initialize logging from CLI verbosity flags, falling back to the config file
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = if cli.has_verbosity_flag() {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.to_lowercase()
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("czds_fetcher={}", level).parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
