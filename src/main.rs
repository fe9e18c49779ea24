//! fleetd: combined app-ledger service.
//!
//! Runs the HTTP API (health, cleanup stats, manual trigger) and, when
//! enabled, the background reconciliation loop in one process.

use anyhow::{Context, Result};
use clap::Parser;
use common::config::Configuration;
use common::inventory::HttpInventoryGateway;
use common::ledger::Ledger;
use reaper::orchestrator::CleanupOrchestrator;
use router::{create_router, RouterState};
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
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = if std::path::Path::new(&args.config).exists() {
        Configuration::load_from_path(std::path::Path::new(&args.config))
            .context("Failed to load configuration")?
    } else {
        log::info!("Configuration file not found, using defaults");
        Configuration::default()
    };

    log::info!("Starting fleetd");

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

    // The scheduler only runs when the loop is enabled; the stats and
    // trigger endpoints are served either way so operators can inspect the
    // disabled state.
    let scheduler = if config.cleanup.enabled {
        log::info!(
            "Reconciliation loop enabled with interval: {:?}, dry_run: {}",
            orchestrator.config().interval,
            orchestrator.config().dry_run
        );
        Some(orchestrator.spawn_scheduler())
    } else {
        log::info!("Reconciliation loop disabled (cleanup.enabled = false)");
        None
    };

    let state = RouterState::new(Arc::clone(&orchestrator));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", config.api.listen))?;
    log::info!("HTTP API listening on {}", config.api.listen);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP server error: {}", e);
        }
    });

    wait_for_shutdown_signal().await?;

    log::info!("Received shutdown signal, stopping fleetd");
    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    server.abort();
    log::info!("fleetd stopped");

    Ok(())
}
