//! Service configuration management

use accrual_fetcher::FetcherConfig;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use ledger_store::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Command line arguments. Environment variables take precedence over flags.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "loyalty-service")]
#[command(about = "Loyalty points ledger with accrual reconciliation")]
pub struct Args {
    /// Database connection string (env: DATABASE_URI)
    #[arg(short = 'd', long = "database-uri")]
    pub database_uri: Option<String>,

    /// Accrual system address (env: ACCRUAL_SYSTEM_ADDRESS)
    #[arg(short = 'r', long = "accrual-address")]
    pub accrual_address: Option<String>,

    /// Seconds between reconciliation ticks (env: ACCRUAL_POLL_INTERVAL_SECS)
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Ledger store backend (env: LEDGER_STORE)
    #[arg(long, value_enum)]
    pub store: Option<StoreBackend>,

    /// Log level (env: LOG_LEVEL)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format, json or pretty (env: LOG_FORMAT)
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Where the ledger lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local, lost on exit
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("Unknown store backend: {}", other)),
        }
    }
}

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Ledger store backend
    pub store: StoreBackend,

    /// PostgreSQL configuration, used by the postgres backend
    pub database: DatabaseConfig,

    /// Accrual system and poller configuration
    pub fetcher: FetcherConfig,

    /// Service-level configuration
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { shutdown_timeout_secs: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Build the configuration: defaults, then flags, then environment
pub fn load_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::default();

    apply_args(&mut config, args);
    load_from_env(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

fn apply_args(config: &mut ServiceConfig, args: &Args) {
    if let Some(uri) = &args.database_uri {
        config.database.url = uri.clone();
    }
    if let Some(address) = &args.accrual_address {
        config.fetcher.base_url = address.clone();
    }
    if let Some(secs) = args.poll_interval_secs {
        config.fetcher.poller.poll_interval_secs = secs;
    }
    if let Some(store) = args.store {
        config.store = store;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
}

/// Load configuration from environment variables
fn load_from_env(config: &mut ServiceConfig) -> Result<()> {
    apply_env(config, |key| std::env::var(key).ok())
}

fn apply_env(config: &mut ServiceConfig, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(uri) = var("DATABASE_URI") {
        config.database.url = uri;
    }

    if let Some(address) = var("ACCRUAL_SYSTEM_ADDRESS") {
        config.fetcher.base_url = address;
    }

    if let Some(secs) = var("ACCRUAL_POLL_INTERVAL_SECS") {
        config.fetcher.poller.poll_interval_secs = secs
            .trim()
            .parse()
            .with_context(|| format!("Invalid ACCRUAL_POLL_INTERVAL_SECS: {}", secs))?;
    }

    if let Some(secs) = var("ACCRUAL_REQUEST_TIMEOUT_SECS") {
        config.fetcher.request_timeout_secs = secs
            .trim()
            .parse()
            .with_context(|| format!("Invalid ACCRUAL_REQUEST_TIMEOUT_SECS: {}", secs))?;
    }

    if let Some(store) = var("LEDGER_STORE") {
        config.store = store.parse()?;
    }

    if let Some(max) = var("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = max
            .trim()
            .parse()
            .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {}", max))?;
    }

    if let Some(level) = var("LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = var("LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Some(secs) = var("SHUTDOWN_TIMEOUT_SECS") {
        config.service.shutdown_timeout_secs = secs
            .trim()
            .parse()
            .with_context(|| format!("Invalid SHUTDOWN_TIMEOUT_SECS: {}", secs))?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    if config.store == StoreBackend::Postgres {
        config
            .database
            .validate()
            .map_err(|e| anyhow!("Invalid database configuration: {}", e))?;
    }

    if config.fetcher.base_url.trim().is_empty() {
        return Err(anyhow!("Accrual system address is empty"));
    }

    if config.fetcher.poller.poll_interval_secs == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    if config.fetcher.request_timeout_secs == 0 {
        return Err(anyhow!("Accrual request timeout must be greater than 0"));
    }

    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => return Err(anyhow!("Invalid log format: {}", config.logging.format)),
    }

    Ok(())
}
