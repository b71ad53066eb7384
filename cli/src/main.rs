//! Census Ledger CLI
//!
//! Command-line interface for the encrypted census ledger.
//!
//! # Usage
//!
//! ```bash
//! # Create a ledger administered by "bureau"
//! census init --admin bureau
//!
//! # Let a respondent submit
//! census authorize alice
//! census submit --as alice --age 30 --birth-year 1994 --occupation 1 --location 2 --family-size 3
//!
//! # Aggregate a batch and reveal it once
//! census analyze 1 2 3 --as alice
//! census decrypt 1
//!
//! # Show ledger status
//! census status
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{
    AnalyzeCommand, AuthorizeCommand, DecryptCommand, DemoCommand, InitCommand, RecordsCommand,
    StatusCommand, SubmitCommand,
};

/// Encrypted Census Ledger
#[derive(Parser)]
#[command(name = "census")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Encrypted census ledger with one-time verified reveal", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, env = "CENSUS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init(InitCommand),

    /// Authorize a submitter
    Authorize(AuthorizeCommand),

    /// Submit an encrypted census record
    Submit(SubmitCommand),

    /// List records
    Records(RecordsCommand),

    /// Analyze a batch of records
    Analyze(AnalyzeCommand),

    /// Reveal an analysis result
    Decrypt(DecryptCommand),

    /// Show ledger status
    Status(StatusCommand),

    /// Run an end-to-end demo on an in-memory ledger
    Demo(DemoCommand),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Command-line flags win over the config file
    let file_logging = cli
        .config
        .clone()
        .or_else(|| cli.data_dir.as_deref().map(config::default_config_path))
        .and_then(|path| config::CensusConfig::load(&path).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(file_logging.level);
    let json = cli.json_logs || file_logging.format == "json";

    // Initialize logging
    logging::init(&level, json)?;

    // Execute command
    match cli.command {
        Commands::Init(cmd) => cmd.execute(cli.data_dir).await,
        Commands::Authorize(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Submit(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Records(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Analyze(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Decrypt(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Status(cmd) => cmd.execute(cli.config, cli.data_dir).await,
        Commands::Demo(cmd) => cmd.execute().await,
        Commands::Version => {
            println!("census {}", census::VERSION);
            println!("Encryption: simulated (plaintext stand-in)");
            println!("Proofs: Ed25519 over BLAKE3");
            Ok(())
        }
    }
}
