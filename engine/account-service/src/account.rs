//! AccountService implementation

use http::StatusCode;
use ledger_store::{
    fits_ledger, Balance, Decimal, LedgerError, LedgerStore, Order, User, UserId, Withdrawal,
};
use std::sync::Arc;

use crate::order_number::validate_order_number;
use crate::{AccountServiceError, Result};

/// Result of a successful order submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The order number was new and now belongs to the caller
    Created(Order),
    /// The caller already owns this order number; nothing changed
    AlreadyOwnedByCaller,
}

impl SubmitOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmitOutcome::Created(_) => StatusCode::OK,
            SubmitOutcome::AlreadyOwnedByCaller => StatusCode::ACCEPTED,
        }
    }
}

/// AccountService admits orders, pays out withdrawals and serves account queries
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService").finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a user together with its zero balance
    pub async fn register(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let login = login.trim();
        if login.is_empty() {
            return Err(AccountServiceError::InvalidRequest {
                message: "login is empty".to_string(),
            });
        }
        if password_hash.is_empty() {
            return Err(AccountServiceError::InvalidRequest {
                message: "password hash is empty".to_string(),
            });
        }

        let user_id = self.store.create_user_with_balance(login, password_hash).await?;
        tracing::info!(%user_id, login, "Account registered");
        Ok(user_id)
    }

    /// Look up a user by login, for credential checks in the HTTP layer
    pub async fn find_user(&self, login: &str) -> Result<Option<User>> {
        Ok(self.store.find_user_by_login(login.trim()).await?)
    }

    /// Submit an order number for accrual.
    ///
    /// The first submitter owns a number for good. Resubmitting your own number
    /// is a no-op; submitting someone else's is a conflict.
    pub async fn submit_order(&self, user_id: UserId, raw: &str) -> Result<SubmitOutcome> {
        let number = raw.trim();
        validate_order_number(number)?;

        if let Some(owner) = self.store.find_order_owner(number).await? {
            return Self::resolve_existing(user_id, owner, number);
        }

        match self.store.admit_order(user_id, number).await {
            Ok(order) => {
                tracing::info!(%user_id, order = number, "Order admitted");
                Ok(SubmitOutcome::Created(order))
            }
            Err(LedgerError::OrderExists(_)) => {
                // Lost the race to a concurrent submission; the winner is committed now.
                let owner = self.store.find_order_owner(number).await?.ok_or_else(|| {
                    LedgerError::corruption(format!("order {number} exists but has no owner"))
                })?;
                Self::resolve_existing(user_id, owner, number)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_existing(user_id: UserId, owner: UserId, number: &str) -> Result<SubmitOutcome> {
        if owner == user_id {
            tracing::debug!(%user_id, order = number, "Order already submitted by caller");
            Ok(SubmitOutcome::AlreadyOwnedByCaller)
        } else {
            tracing::debug!(%user_id, %owner, order = number, "Order owned by another user");
            Err(AccountServiceError::OrderOwnedByAnother { order_number: number.to_string() })
        }
    }

    /// Spend `sum` points against `order_ref`.
    ///
    /// The balance check happens inside the store's transaction, never here.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        order_ref: &str,
        sum: Decimal,
    ) -> Result<Withdrawal> {
        let order_ref = order_ref.trim();
        validate_order_number(order_ref)?;
        if sum <= Decimal::ZERO || !fits_ledger(sum) {
            return Err(AccountServiceError::InvalidAmount { amount: sum });
        }

        match self.store.withdraw(user_id, order_ref, sum).await {
            Ok(withdrawal) => {
                tracing::info!(%user_id, order = order_ref, %sum, "Withdrawal processed");
                Ok(withdrawal)
            }
            Err(e) => {
                let err = AccountServiceError::from(e);
                if let AccountServiceError::InsufficientBalance { available, .. } = &err {
                    tracing::info!(
                        %user_id,
                        order = order_ref,
                        %sum,
                        %available,
                        "Withdrawal rejected"
                    );
                }
                Err(err)
            }
        }
    }

    /// Orders of the user, newest first
    pub async fn orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(user_id).await?)
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Balance> {
        Ok(self.store.get_balance(user_id).await?)
    }

    /// Withdrawals of the user, most recent first
    pub async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        Ok(self.store.list_withdrawals(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order_number::OrderNumberError;
    use ledger_store::{InMemoryLedgerStore, OrderStatus};

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryLedgerStore::new()))
    }

    #[tokio::test]
    async fn test_register_and_find() {
        let service = service();
        let user = service.register(" alice ", "hash").await.unwrap();

        let found = service.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user);
        assert_eq!(found.password_hash, "hash");

        let err = service.register("alice", "other").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = service.register("  ", "hash").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(service.find_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submit_new_then_resubmit() {
        let service = service();
        let user = service.register("alice", "hash").await.unwrap();

        let outcome = service.submit_order(user, "4561261212345467\n").await.unwrap();
        match &outcome {
            SubmitOutcome::Created(order) => {
                assert_eq!(order.number, "4561261212345467");
                assert_eq!(order.status, OrderStatus::New);
            }
            other => panic!("expected Created, got {other:?}"),
        }
        assert_eq!(outcome.status_code(), StatusCode::OK);

        let outcome = service.submit_order(user, "4561261212345467").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadyOwnedByCaller);
        assert_eq!(outcome.status_code(), StatusCode::ACCEPTED);
        assert_eq!(service.orders(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_owned_by_another() {
        let service = service();
        let alice = service.register("alice", "hash").await.unwrap();
        let bob = service.register("bob", "hash").await.unwrap();

        service.submit_order(alice, "2377225624").await.unwrap();
        let err = service.submit_order(bob, "2377225624").await.unwrap_err();

        assert!(matches!(err, AccountServiceError::OrderOwnedByAnother { .. }));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(service.orders(bob).await.unwrap().is_empty());
        assert_eq!(service.orders(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_invalid_numbers() {
        let service = service();
        let user = service.register("alice", "hash").await.unwrap();

        let err = service.submit_order(user, "4561261212345464").await.unwrap_err();
        assert!(matches!(err, AccountServiceError::InvalidOrderNumber(OrderNumberError::Checksum)));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = service.submit_order(user, "12ab").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = service.submit_order(user, "").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        assert!(service.orders(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_validation() {
        let service = service();
        let user = service.register("alice", "hash").await.unwrap();

        let err = service.withdraw(user, "2377225625", Decimal::from(10)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = service.withdraw(user, "2377225624", Decimal::ZERO).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::InvalidAmount { .. }));

        let err = service.withdraw(user, "2377225624", Decimal::from(1)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);

        let err = service.withdraw(UserId(999), "2377225624", Decimal::from(1)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_withdraw_rejects_sub_cent_sums() {
        let service = service();
        let user = service.register("alice", "hash").await.unwrap();
        let SubmitOutcome::Created(order) = service.submit_order(user, "79927398713").await.unwrap()
        else {
            panic!("expected a new order");
        };
        service.store.apply_credit(order.id, user, Decimal::new(1, 2)).await.unwrap();

        for _ in 0..3 {
            let err = service.withdraw(user, "2377225624", Decimal::new(5, 3)).await.unwrap_err();
            assert!(matches!(err, AccountServiceError::InvalidAmount { .. }));
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }

        let balance = service.balance(user).await.unwrap();
        assert_eq!(balance.current, Decimal::new(1, 2));
        assert_eq!(balance.withdrawn, Decimal::ZERO);
        assert!(service.withdrawals(user).await.unwrap().is_empty());

        service.withdraw(user, "2377225624", Decimal::new(1, 2)).await.unwrap();
        assert_eq!(service.balance(user).await.unwrap().current, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_submit_long_order_number() {
        let service = service();
        let user = service.register("alice", "hash").await.unwrap();

        let outcome = service.submit_order(user, &"0".repeat(60)).await.unwrap();
        assert_eq!(outcome.status_code(), StatusCode::OK);
    }
}
