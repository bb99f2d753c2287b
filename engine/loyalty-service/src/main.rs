//! Loyalty Service
//!
//! Main entry point for the loyalty points backend. Loads configuration,
//! connects the ledger store, starts the reconciliation poller and waits
//! for a shutdown signal.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use loyalty_service::{
    graceful_shutdown, initialize_logging_with_config, load_configuration, setup_signal_handlers,
    Args, ServiceState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = load_configuration(&args)?;

    initialize_logging_with_config(&config.logging.level, &config.logging.format)?;

    info!("Starting Loyalty Service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        store = ?config.store,
        accrual = %config.fetcher.base_url,
        poll_interval_secs = config.fetcher.poller.poll_interval_secs,
        "Configuration loaded"
    );

    let service_state =
        Arc::new(ServiceState::new(config).await.context("Failed to initialize service")?);
    info!("Service state initialized");

    let shutdown_signal = setup_signal_handlers()?;
    info!("Signal handlers configured");

    service_state.start_poller().await?;

    info!("Loyalty Service is running. Press Ctrl+C to shutdown gracefully.");
    let _ = shutdown_signal.await;

    info!("Shutdown signal received. Initiating graceful shutdown...");
    graceful_shutdown(service_state).await?;

    info!("Loyalty Service shutdown complete");
    Ok(())
}
