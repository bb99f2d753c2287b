//! Service state management and component initialization

use accrual_fetcher::{AccrualClient, HttpAccrualClient, ReconciliationPoller};
use account_service::AccountService;
use anyhow::{Context, Result};
use ledger_store::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ServiceConfig, StoreBackend};

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Ledger store shared by the poller and the account service
    pub store: Arc<dyn LedgerStore>,

    /// AccountService instance
    pub account_service: Arc<AccountService>,

    accrual_client: Arc<dyn AccrualClient>,

    /// Cancelled once shutdown starts
    shutdown: CancellationToken,

    poller_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceState {
    /// Create a new service state with all components initialized
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing service components...");

        let store: Arc<dyn LedgerStore> = match config.store {
            StoreBackend::Postgres => {
                info!("Connecting ledger store to PostgreSQL...");
                let store = PgLedgerStore::connect(&config.database)
                    .await
                    .context("Failed to connect ledger store")?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                warn!("Using in-memory ledger store; all data is lost on exit");
                Arc::new(InMemoryLedgerStore::new())
            }
        };

        let client = HttpAccrualClient::new(&config.fetcher)
            .context("Failed to create accrual client")?;
        info!(base_url = client.base_url(), "Accrual client initialized");

        Ok(Self::with_components(config, store, Arc::new(client)))
    }

    /// Assemble the service from already-built components
    pub fn with_components(
        config: ServiceConfig,
        store: Arc<dyn LedgerStore>,
        accrual_client: Arc<dyn AccrualClient>,
    ) -> Self {
        let account_service = Arc::new(AccountService::new(store.clone()));

        Self {
            config,
            store,
            account_service,
            accrual_client,
            shutdown: CancellationToken::new(),
            poller_handle: Mutex::new(None),
        }
    }

    /// Start the reconciliation poller in a background task
    pub async fn start_poller(&self) -> Result<()> {
        let mut handle_guard = self.poller_handle.lock().await;
        if handle_guard.is_some() {
            warn!("Reconciliation poller was already started");
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(anyhow::anyhow!("Service is shutting down"));
        }

        info!("Starting reconciliation poller...");
        let poller = ReconciliationPoller::new(
            self.store.clone(),
            self.accrual_client.clone(),
            self.config.fetcher.poller.clone(),
            self.shutdown.child_token(),
        );
        *handle_guard = Some(tokio::spawn(poller.run()));

        Ok(())
    }

    /// Check if the poller task is alive
    pub async fn is_running(&self) -> bool {
        let handle_guard = self.poller_handle.lock().await;
        matches!(handle_guard.as_ref(), Some(handle) if !handle.is_finished())
    }

    /// Get service health status
    pub async fn health_check(&self) -> ServiceHealth {
        if self.shutdown.is_cancelled() {
            return ServiceHealth::Unhealthy;
        }
        if !self.is_running().await {
            return ServiceHealth::Degraded;
        }
        match self.store.pending_orders().await {
            Ok(_) => ServiceHealth::Healthy,
            Err(e) => {
                warn!(error = %e, "Ledger store health check failed");
                ServiceHealth::Unhealthy
            }
        }
    }

    /// Stop the poller and wait for it, bounded by the shutdown timeout
    pub async fn shutdown(&self) -> Result<()> {
        info!("Stopping reconciliation poller...");
        self.shutdown.cancel();

        let handle = self.poller_handle.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let shutdown_timeout = Duration::from_secs(self.config.service.shutdown_timeout_secs);
        match timeout(shutdown_timeout, handle).await {
            Ok(Ok(())) => {
                info!("Reconciliation poller stopped gracefully");
            }
            Ok(Err(e)) => {
                error!("Reconciliation poller task failed: {}", e);
            }
            Err(_) => {
                warn!("Reconciliation poller did not stop within timeout, forcing shutdown");
            }
        }

        Ok(())
    }
}

/// Service health status
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    /// Store reachable but the poller is not running
    Degraded,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }
}
