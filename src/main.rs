//! Memecoin trade engine - filters new tokens and races relays to land trades
//!
//! # WARNING
//! - Live mode trades with real money. Only use funds you can afford to lose.
//! - Most pump.fun tokens go to zero (rug pulls, abandonment).
//! - A fill in simulation or paper mode says nothing about landing on mainnet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use pumpfun_engine::cli::commands;
use pumpfun_engine::config::Config;

/// Trade decision and multi-venue execution engine
#[derive(Parser)]
#[command(name = "engine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional settings file (environment variables override it)
    #[arg(short, long, env = "ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine
    Start {
        /// Replay newline-delimited JSON events from a file
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,

        /// Delay between replayed events, in milliseconds
        #[arg(long, value_name = "MS", requires = "replay")]
        pace_ms: Option<u64>,

        /// Force simulation mode (nothing is sent)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Load and validate configuration, then exit
    Check,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("pumpfun_engine=info".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    // Every configuration problem is reported at once
    let config = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(report) => {
            error!("Failed to load configuration: {}", report);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start {
            replay,
            pace_ms,
            dry_run,
        } => commands::start(config, replay, pace_ms, dry_run).await,
        Commands::Config => commands::show_config(&config),
        Commands::Check => commands::check(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
