//! Command-line argument parsing for CZDS Fetcher
//!
//! This module defines the CLI structure using clap derive macros: bulk
//! download, link listing, single-file fetch, and configuration management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CZDS Fetcher - Download zone files from ICANN's Centralized Zone Data Service
#[derive(Parser, Debug)]
#[command(
    name = "czds_fetcher",
    version,
    about = "Download approved zone files from ICANN CZDS",
    long_about = "Authenticates against the ICANN account API, lists every zone file the account
may download, and fetches them concurrently with bounded retries and atomic writes."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every zone file the account is approved for
    Download(DownloadArgs),

    /// Print the zone file links the account may download
    Links,

    /// Download a single zone file by URL
    Fetch(FetchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Number of concurrent downloads (overrides the config file)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Directory to save zone files into (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Extra rounds for zone files that failed transiently
    #[arg(long)]
    pub retry_rounds: Option<u32>,

    /// Maximum number of zone files to download (for testing)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Zone file URL as returned by the links command
    #[arg(value_name = "URL")]
    pub url: String,

    /// Directory to save the zone file into (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Where to write it (defaults to the per-user config location)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration with secrets redacted
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether any verbosity flag was given
    pub fn has_verbosity_flag(&self) -> bool {
        self.global.quiet || self.global.verbose || self.global.very_verbose
    }
}

impl DownloadArgs {
    /// Reject values that cannot describe a batch
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if self.limit == Some(0) {
            return Err("Limit must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_args_validation() {
        let mut args = DownloadArgs {
            workers: Some(8),
            output: None,
            retry_rounds: None,
            limit: None,
            no_progress: false,
        };
        assert!(args.validate().is_ok());

        args.workers = Some(0);
        assert!(args.validate().is_err());

        args.workers = None;
        args.limit = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_download_flags_parse() {
        let cli = Cli::try_parse_from([
            "czds_fetcher",
            "-v",
            "download",
            "-w",
            "4",
            "-o",
            "/tmp/zones",
            "--retry-rounds",
            "3",
            "--no-progress",
        ])
        .unwrap();

        let Commands::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.output, Some(PathBuf::from("/tmp/zones")));
        assert_eq!(args.retry_rounds, Some(3));
        assert!(args.no_progress);
        assert!(cli.global.verbose);
    }

    #[test]
    fn test_fetch_and_config_parse() {
        let cli = Cli::try_parse_from([
            "czds_fetcher",
            "fetch",
            "https://czds-api.icann.org/czds/downloads/org.zone",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Fetch(ref a) if a.url.ends_with("org.zone")));

        let cli = Cli::try_parse_from(["czds_fetcher", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                action: ConfigAction::Init { path: None, force: true }
            })
        ));
    }

    #[test]
    fn test_log_level() {
        let cli_quiet = Cli::try_parse_from(["czds_fetcher", "-q", "links"]).unwrap();
        let cli_verbose = Cli::try_parse_from(["czds_fetcher", "links", "-v"]).unwrap();
        let cli_default = Cli::try_parse_from(["czds_fetcher", "links"]).unwrap();

        assert_eq!(cli_quiet.log_level(), tracing::Level::ERROR);
        assert_eq!(cli_verbose.log_level(), tracing::Level::INFO);
        assert_eq!(cli_default.log_level(), tracing::Level::WARN);
        assert!(!cli_default.has_verbosity_flag());
    }
}
