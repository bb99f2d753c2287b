//! JSON shape of the listings handed to the HTTP layer

use account_service::AccountService;
use ledger_store::{Decimal, InMemoryLedgerStore, LedgerStore, OrderStatus};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_order_listing_json() {
    tokio_test::block_on(async {
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = AccountService::new(store.clone());
        let user = service.register("alice", "hash").await.unwrap();

        service.submit_order(user, "2377225624").await.unwrap();
        service.submit_order(user, "4561261212345467").await.unwrap();

        let pending = store.pending_orders().await.unwrap();
        store.apply_credit(pending[0].order_id, user, Decimal::new(72998, 2)).await.unwrap();
        store.apply_status(pending[1].order_id, OrderStatus::Processing).await.unwrap();

        let json = serde_json::to_value(service.orders(user).await.unwrap()).unwrap();
        let orders = json.as_array().unwrap();
        assert_eq!(orders.len(), 2);

        // Newest first
        assert_eq!(orders[0]["number"], "4561261212345467");
        assert_eq!(orders[0]["status"], "PROCESSING");
        assert!(orders[0].get("accrual").is_none());

        assert_eq!(orders[1]["number"], "2377225624");
        assert_eq!(orders[1]["status"], "PROCESSED");
        assert_eq!(orders[1]["accrual"], 729.98);
        assert!(orders[1]["uploaded_at"].is_string());
        assert!(orders[1].get("user_id").is_none());
    });
}

#[test]
fn test_balance_and_withdrawal_json() {
    tokio_test::block_on(async {
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = AccountService::new(store.clone());
        let user = service.register("alice", "hash").await.unwrap();

        service.submit_order(user, "2377225624").await.unwrap();
        let pending = store.pending_orders().await.unwrap();
        store.apply_credit(pending[0].order_id, user, Decimal::new(50050, 2)).await.unwrap();
        service.withdraw(user, "4561261212345467", Decimal::from(42)).await.unwrap();

        let balance = serde_json::to_value(service.balance(user).await.unwrap()).unwrap();
        assert_eq!(balance, json!({ "current": 458.5, "withdrawn": 42.0 }));

        let withdrawals = serde_json::to_value(service.withdrawals(user).await.unwrap()).unwrap();
        assert_eq!(withdrawals[0]["order"], "4561261212345467");
        assert_eq!(withdrawals[0]["sum"], 42.0);
        assert!(withdrawals[0]["processed_at"].is_string());
    });
}
