//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::service::ServiceState;

type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<()>>>>;

fn notify(sender: &ShutdownSender) {
    if let Ok(mut guard) = sender.lock() {
        if let Some(tx) = guard.take() {
            let _ = tx.send(());
        }
    }
}

/// Setup signal handlers for graceful shutdown
///
/// The receiver completes on the first of Ctrl+C or SIGTERM.
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let sender: ShutdownSender = Arc::new(Mutex::new(Some(shutdown_tx)));

    // Handle Ctrl+C (SIGINT)
    {
        let sender = sender.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                return;
            }

            info!("Ctrl+C signal received");
            notify(&sender);
        });
    }

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, shutdown_flag.clone())?;

        tokio::spawn(async move {
            loop {
                if shutdown_flag.load(Ordering::Relaxed) {
                    info!("SIGTERM signal received");
                    notify(&sender);
                    break;
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        });
    }

    Ok(shutdown_rx)
}

/// Graceful shutdown handler
pub async fn graceful_shutdown(service_state: Arc<ServiceState>) -> Result<()> {
    info!("Starting graceful shutdown...");

    if let Err(e) = service_state.shutdown().await {
        error!("Failed to shutdown service components: {}", e);
    }

    info!("Graceful shutdown complete");
    Ok(())
}
