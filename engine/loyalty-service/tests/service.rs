//! End-to-end flow through the wired service with the in-memory store

use accrual_fetcher::{AccrualClient, AccrualError, AccrualResponse, AccrualStatus};
use account_service::SubmitOutcome;
use ledger_store::{Decimal, InMemoryLedgerStore, OrderStatus};
use loyalty_service::{ServiceConfig, ServiceHealth, ServiceState, StoreBackend};
use std::sync::Arc;
use std::time::Duration;

/// Every order is PROCESSED with the same accrual
struct FlatAccrual(Decimal);

#[async_trait::async_trait]
impl AccrualClient for FlatAccrual {
    async fn fetch_status(&self, order_number: &str) -> Result<AccrualResponse, AccrualError> {
        Ok(AccrualResponse {
            order: order_number.to_string(),
            status: AccrualStatus::Processed,
            accrual: Some(self.0),
        })
    }
}

fn memory_config() -> ServiceConfig {
    let mut config = ServiceConfig { store: StoreBackend::Memory, ..Default::default() };
    config.fetcher.poller.poll_interval_secs = 1;
    config.service.shutdown_timeout_secs = 5;
    config
}

fn service_state() -> ServiceState {
    ServiceState::with_components(
        memory_config(),
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(FlatAccrual(Decimal::from(500))),
    )
}

#[tokio::test]
async fn test_order_is_credited_then_withdrawn() {
    let state = service_state();
    let accounts = state.account_service.clone();

    let user = accounts.register("alice", "hash").await.unwrap();
    let outcome = accounts.submit_order(user, "4561261212345467").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Created(_)));

    state.start_poller().await.unwrap();
    assert!(state.is_running().await);
    assert_eq!(state.health_check().await, ServiceHealth::Healthy);

    let mut credited = false;
    for _ in 0..300 {
        if accounts.balance(user).await.unwrap().current == Decimal::from(500) {
            credited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(credited, "poller should credit the order");

    let orders = accounts.orders(user).await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Processed);

    accounts.withdraw(user, "2377225624", Decimal::from(200)).await.unwrap();
    let balance = accounts.balance(user).await.unwrap();
    assert_eq!(balance.current, Decimal::from(300));
    assert_eq!(balance.withdrawn, Decimal::from(200));

    state.shutdown().await.unwrap();
    assert!(!state.is_running().await);
    assert_eq!(state.health_check().await, ServiceHealth::Unhealthy);
}

#[tokio::test]
async fn test_health_before_start_and_idempotent_start() {
    let state = service_state();
    assert_eq!(state.health_check().await, ServiceHealth::Degraded);

    state.start_poller().await.unwrap();
    state.start_poller().await.unwrap();
    assert!(state.health_check().await.is_healthy());

    state.shutdown().await.unwrap();
    assert!(state.start_poller().await.is_err());
}

#[test]
fn test_memory_backend_starts_without_database() {
    tokio_test::block_on(async {
        let state = ServiceState::new(memory_config()).await.unwrap();
        assert_eq!(state.config.store, StoreBackend::Memory);
        state.shutdown().await.unwrap();
    });
}
