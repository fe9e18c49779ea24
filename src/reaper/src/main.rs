//! fleetd Reaper Service
//!
//! Headless reconciliation service: runs the cleanup loop against the app
//! ledger and the orchestrator inventory without the HTTP surface. Useful
//! when the API is deployed separately.

use anyhow::{Context, Result};
use clap::Parser;
use common::config::Configuration;
use common::inventory::HttpInventoryGateway;
use common::ledger::Ledger;
use reaper::orchestrator::CleanupOrchestrator;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleetd.toml")]
    config: String,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    // Load configuration
    let config = if std::path::Path::new(&args.config).exists() {
        Configuration::load_from_path(std::path::Path::new(&args.config))
            .context("Failed to load configuration")?
    } else {
        log::info!("Configuration file not found, using defaults");
        Configuration::default()
    };

    // Check if the reconciliation loop is enabled
    if !config.cleanup.enabled {
        log::info!("Cleanup is disabled in configuration (cleanup.enabled = false)");
        log::info!("Set FLEETD__CLEANUP__ENABLED=true or enable in config file to run the reaper");
        return Ok(());
    }

    log::info!("Starting fleetd Reaper Service");

    let ledger = Ledger::new(&config.database.dsn)
        .await
        .context("Failed to connect to app ledger")?;

    let gateway = HttpInventoryGateway::new(
        config.orchestrator.base_url.clone(),
        config.cleanup.query_timeout,
    )
    .context("Failed to build orchestrator inventory gateway")?;

    let orchestrator = Arc::new(CleanupOrchestrator::new(
        ledger,
        Arc::new(gateway),
        config.cleanup.clone(),
    ));

    log::info!(
        "Reconciliation loop initialized with interval: {:?}, dry_run: {}",
        orchestrator.config().interval,
        orchestrator.config().dry_run
    );

    let scheduler = orchestrator.spawn_scheduler();

    // Wait for shutdown signal (SIGINT or SIGTERM)
    log::info!("Reaper service running, waiting for shutdown signal");
    wait_for_shutdown_signal().await?;

    log::info!("Received shutdown signal, stopping reaper service");
    scheduler.abort();
    log::info!("Reaper service stopped");

    Ok(())
}
