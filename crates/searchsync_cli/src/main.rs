//! SearchSync CLI
//!
//! Command-line front end for SearchSync.
//!
//! # Commands
//!
//! - `index` - Rebuild the configured indexes from a record snapshot
//! - `validate` - Check the configuration and show the index layout
//! - `version` - Show version information

mod commands;
mod http;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Keeps search indexes in sync with a record store.
#[derive(Parser)]
#[command(name = "searchsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild indexes from a record snapshot
    Index {
        /// JSON snapshot of the source collections
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Rebuild only this index
        #[arg(short, long)]
        only: Option<String>,
    },

    /// Load and validate the configuration
    Validate,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Index { snapshot, only } => {
            commands::index::run(config, &snapshot, only.as_deref()).await
        }
        Commands::Validate => commands::validate::run(config),
        Commands::Version => {
            println!("SearchSync CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
