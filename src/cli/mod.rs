//! Command-line interface components
//!
//! This module contains CLI-specific code for the CZDS Fetcher application,
//! including argument parsing, command handlers, and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, DownloadArgs, FetchArgs, GlobalArgs,
};
pub use commands::{handle_config, handle_download, handle_fetch, handle_links};
pub use progress::ProgressDisplay;
