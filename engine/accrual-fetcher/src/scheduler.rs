use ledger_store::{LedgerError, LedgerStore, OrderStatus, PendingOrder, AMOUNT_SCALE};
use rust_decimal::RoundingStrategy;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollerConfig;
use crate::fetcher::AccrualClient;
use crate::models::AccrualStatus;

const HALF_UP: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Counters for one pass over the pending orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orders looked at (fetch attempted)
    pub examined: usize,
    pub credited: usize,
    pub invalidated: usize,
    /// Moved to REGISTERED or PROCESSING
    pub advanced: usize,
    /// Accrual system answered with the status the order already has
    pub unchanged: usize,
    pub fetch_failures: usize,
    pub store_failures: usize,
    /// Shutdown was requested before the snapshot was finished
    pub abandoned: bool,
}

impl TickReport {
    pub fn failures(&self) -> usize {
        self.fetch_failures + self.store_failures
    }
}

enum Outcome {
    Credited,
    Invalidated,
    Advanced,
    Unchanged,
    FetchFailed,
    StoreFailed,
    Cancelled,
}

/// Periodically reconciles pending orders with the accrual system
pub struct ReconciliationPoller {
    store: Arc<dyn LedgerStore>,
    client: Arc<dyn AccrualClient>,
    config: PollerConfig,
    shutdown: CancellationToken,
}

impl ReconciliationPoller {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        client: Arc<dyn AccrualClient>,
        config: PollerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        if config.poll_interval_secs == 0 {
            warn!("Poll interval of 0s raised to 1s");
        }
        Self { store, client, config, shutdown }
    }

    /// Tick until the shutdown token is cancelled
    pub async fn run(self) {
        let period = self.config.poll_interval();
        info!(interval_secs = period.as_secs(), "Reconciliation poller started");

        let start = if self.config.run_on_start { Instant::now() } else { Instant::now() + period };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.examined > 0 || report.failures() > 0 {
                        info!(
                            examined = report.examined,
                            credited = report.credited,
                            invalidated = report.invalidated,
                            advanced = report.advanced,
                            failures = report.failures(),
                            "Reconciliation tick completed"
                        );
                    }
                    if report.abandoned {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation poller stopped");
    }

    /// Process one snapshot of pending orders
    ///
    /// Orders are handled one at a time and each store write is a complete
    /// unit, so stopping between two orders leaves nothing half-applied.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let pending = match self.store.pending_orders().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Failed to load pending orders");
                report.store_failures += 1;
                return report;
            }
        };

        debug!(count = pending.len(), "Loaded pending orders");

        for order in &pending {
            if self.shutdown.is_cancelled() {
                report.abandoned = true;
                break;
            }

            match self.reconcile(order).await {
                Outcome::Credited => report.credited += 1,
                Outcome::Invalidated => report.invalidated += 1,
                Outcome::Advanced => report.advanced += 1,
                Outcome::Unchanged => report.unchanged += 1,
                Outcome::FetchFailed => report.fetch_failures += 1,
                Outcome::StoreFailed => report.store_failures += 1,
                Outcome::Cancelled => {
                    report.abandoned = true;
                    break;
                }
            }
            report.examined += 1;
        }

        report
    }

    async fn reconcile(&self, order: &PendingOrder) -> Outcome {
        // Only the read side races the shutdown signal; a store write, once
        // started, is always awaited to completion.
        let fetched = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Outcome::Cancelled,
            fetched = self.client.fetch_status(&order.order_number) => fetched,
        };

        let response = match fetched {
            Ok(response) => response,
            Err(e) => {
                warn!(order = %order.order_number, error = %e, "Accrual status fetch failed");
                return Outcome::FetchFailed;
            }
        };

        let result = match response.status {
            AccrualStatus::Processed => {
                // The ledger keeps cents; the accrual system may send more digits
                let amount = match response.accrual {
                    Some(amount) => amount.round_dp_with_strategy(AMOUNT_SCALE, HALF_UP),
                    None => {
                        warn!(order = %order.order_number, "PROCESSED response without accrual");
                        return Outcome::FetchFailed;
                    }
                };
                self.store
                    .apply_credit(order.order_id, order.user_id, amount)
                    .await
                    .map(|()| {
                        info!(
                            order = %order.order_number,
                            user_id = %order.user_id,
                            %amount,
                            "Accrual credited"
                        );
                        Outcome::Credited
                    })
            }
            AccrualStatus::Invalid => {
                self.store.apply_status(order.order_id, OrderStatus::Invalid).await.map(|()| {
                    info!(order = %order.order_number, "Order rejected by accrual system");
                    Outcome::Invalidated
                })
            }
            AccrualStatus::Registered | AccrualStatus::Processing => {
                let next = OrderStatus::from(response.status);
                if next == order.status || !order.status.can_advance_to(next) {
                    debug!(
                        order = %order.order_number,
                        current = %order.status,
                        reported = %next,
                        "No status change"
                    );
                    return Outcome::Unchanged;
                }
                self.store.apply_status(order.order_id, next).await.map(|()| {
                    debug!(order = %order.order_number, status = %next, "Order advanced");
                    Outcome::Advanced
                })
            }
        };

        result.unwrap_or_else(|e| {
            log_store_failure(order, &e);
            Outcome::StoreFailed
        })
    }
}

fn log_store_failure(order: &PendingOrder, err: &LedgerError) {
    if err.is_transient() {
        warn!(
            order = %order.order_number,
            error = %err,
            "Ledger store unavailable, retrying next tick"
        );
    } else if err.is_conflict() {
        // Settled by another writer since the snapshot was taken
        info!(order = %order.order_number, error = %err, "Accrual decision no longer applies");
    } else {
        error!(order = %order.order_number, error = %err, "Failed to apply accrual decision");
    }
}
