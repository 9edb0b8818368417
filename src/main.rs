//! # SubTrack
//!
//! Subscription tracker daemon: opens the store, starts the recurring-billing
//! scheduler, and runs until interrupted.
//!
//! Usage:
//!   subtrack                          # Default data dir (~/.subtrack)
//!   subtrack --data-dir ./data       # Custom data dir
//!   subtrack --check-interval 600    # Tick every 10 minutes

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use subtrack_core::store::SubscriptionStore;
use subtrack_scheduler::Scheduler;
use subtrack_store::SqliteStore;

#[derive(Parser)]
#[command(name = "subtrack", version, about = "📅 SubTrack — subscription tracker")]
struct Cli {
    /// Data directory holding the SQLite database
    #[arg(long, default_value = "~/.subtrack")]
    data_dir: String,

    /// Seconds between scheduler checks
    #[arg(long, default_value = "3600")]
    check_interval: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "subtrack=debug,subtrack_scheduler=debug,subtrack_store=debug"
    } else {
        "subtrack=info,subtrack_scheduler=info,subtrack_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let data_dir = PathBuf::from(shellexpand::tilde(&cli.data_dir).to_string());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("subtrack.db");

    let store: Arc<dyn SubscriptionStore> = Arc::new(SqliteStore::open(&db_path)?);
    tracing::info!("💾 Store opened at {}", db_path.display());

    let scheduler = Scheduler::new(store, Duration::from_secs(cli.check_interval));
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down…");
    scheduler.stop().await;

    Ok(())
}
