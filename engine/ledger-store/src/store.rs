//! Ledger store trait

use rust_decimal::Decimal;

use crate::balance::Balance;
use crate::error::Result;
use crate::types::{Order, OrderId, OrderStatus, PendingOrder, User, UserId, Withdrawal};

/// Abstract trait for ledger backends
///
/// Implementations must make every method atomic with respect to every other:
/// a reader never observes half of `create_user_with_balance`, `apply_credit`
/// or `withdraw`.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a user and its zeroed balance as one unit.
    ///
    /// Fails with `LoginTaken` when the login is already present.
    async fn create_user_with_balance(&self, login: &str, password_hash: &str) -> Result<UserId>;

    /// Look up a user by login
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>>;

    /// Owner of an admitted order number, if any
    async fn find_order_owner(&self, order_number: &str) -> Result<Option<UserId>>;

    /// Admit a new order with status NEW.
    ///
    /// Fails with `OrderExists` when the number is already admitted; this is
    /// the only arbiter of concurrent submissions of the same number.
    async fn admit_order(&self, user_id: UserId, order_number: &str) -> Result<Order>;

    /// Orders of a user, newest upload first
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>>;

    async fn get_balance(&self, user_id: UserId) -> Result<Balance>;

    /// Mark the order PROCESSED with `amount` and credit the owner's balance, atomically.
    async fn apply_credit(&self, order_id: OrderId, user_id: UserId, amount: Decimal) -> Result<()>;

    /// Move an order to REGISTERED, PROCESSING or INVALID without touching any balance.
    async fn apply_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    /// Check and debit the balance and append a withdrawal record, atomically.
    ///
    /// Fails with `InsufficientFunds` and leaves the balance untouched when
    /// `sum` exceeds the current balance.
    async fn withdraw(&self, user_id: UserId, order_ref: &str, sum: Decimal) -> Result<Withdrawal>;

    /// Withdrawals of a user, most recent first
    async fn list_withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>>;

    /// Snapshot of orders still awaiting a terminal decision, oldest first
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>>;
}
