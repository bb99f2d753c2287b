//! Loyalty Service Library
//!
//! Wires the ledger store, the account service and the reconciliation poller
//! into one process: configuration, logging, component startup and graceful
//! shutdown.

use anyhow::{Context, Result};

pub mod config;
pub mod logging;
pub mod service;
pub mod signals;

pub use config::{Args, ServiceConfig, StoreBackend};
pub use logging::initialize_logging_with_config;
pub use service::{ServiceHealth, ServiceState};
pub use signals::{graceful_shutdown, setup_signal_handlers};

/// Load configuration from command line arguments and environment variables
pub fn load_configuration(args: &Args) -> Result<ServiceConfig> {
    config::load_config(args).context("Failed to load service configuration")
}
