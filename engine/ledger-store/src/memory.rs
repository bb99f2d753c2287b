//! In-memory ledger backend
//!
//! The whole ledger lives behind one async mutex, so each trait method runs as
//! a single critical section and is trivially atomic and isolated.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::balance::{fits_ledger, Balance};
use crate::error::{LedgerError, Result};
use crate::store::LedgerStore;
use crate::types::{Order, OrderId, OrderStatus, PendingOrder, User, UserId, Withdrawal};

#[derive(Debug, Default)]
struct LedgerState {
    last_user_id: i64,
    last_order_id: i64,
    last_withdrawal_id: i64,
    users: HashMap<UserId, User>,
    logins: HashMap<String, UserId>,
    orders: BTreeMap<OrderId, Order>,
    order_numbers: HashMap<String, OrderId>,
    balances: HashMap<UserId, Balance>,
    withdrawals: Vec<Withdrawal>,
}

impl LedgerState {
    fn pending_order_mut(&mut self, order_id: OrderId, next: OrderStatus) -> Result<&mut Order> {
        let order = self.orders.get_mut(&order_id).ok_or(LedgerError::OrderNotFound(order_id))?;
        if !order.status.can_advance_to(next) {
            return Err(LedgerError::InvalidTransition { order_id, from: order.status, to: next });
        }
        Ok(order)
    }
}

/// In-memory ledger backend (for testing and local runs)
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_user_with_balance(&self, login: &str, password_hash: &str) -> Result<UserId> {
        let mut state = self.state.lock().await;
        if state.logins.contains_key(login) {
            return Err(LedgerError::LoginTaken(login.to_string()));
        }

        state.last_user_id += 1;
        let user_id = UserId(state.last_user_id);
        state.users.insert(
            user_id,
            User {
                id: user_id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            },
        );
        state.logins.insert(login.to_string(), user_id);
        state.balances.insert(user_id, Balance::default());

        tracing::debug!(user_id = %user_id, login, "User registered");
        Ok(user_id)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.logins.get(login).and_then(|id| state.users.get(id)).cloned())
    }

    async fn find_order_owner(&self, order_number: &str) -> Result<Option<UserId>> {
        let state = self.state.lock().await;
        Ok(state
            .order_numbers
            .get(order_number)
            .and_then(|id| state.orders.get(id))
            .map(|order| order.user_id))
    }

    async fn admit_order(&self, user_id: UserId, order_number: &str) -> Result<Order> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(LedgerError::UserNotFound(user_id));
        }
        if state.order_numbers.contains_key(order_number) {
            return Err(LedgerError::OrderExists(order_number.to_string()));
        }

        state.last_order_id += 1;
        let order = Order {
            id: OrderId(state.last_order_id),
            user_id,
            number: order_number.to_string(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        };
        state.order_numbers.insert(order.number.clone(), order.id);
        state.orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> =
            state.orders.values().filter(|o| o.user_id == user_id).cloned().collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn get_balance(&self, user_id: UserId) -> Result<Balance> {
        let state = self.state.lock().await;
        state.balances.get(&user_id).copied().ok_or(LedgerError::BalanceNotFound(user_id))
    }

    async fn apply_credit(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<()> {
        if !fits_ledger(amount) {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut state = self.state.lock().await;
        let (owner, status) = state
            .orders
            .get(&order_id)
            .map(|o| (o.user_id, o.status))
            .ok_or(LedgerError::OrderNotFound(order_id))?;
        if owner != user_id {
            return Err(LedgerError::OwnerMismatch { order_id, owner, claimed: user_id });
        }
        if !status.can_advance_to(OrderStatus::Processed) {
            return Err(LedgerError::InvalidTransition {
                order_id,
                from: status,
                to: OrderStatus::Processed,
            });
        }

        // Every check is done; the two writes below cannot fail halfway.
        let balance =
            state.balances.get_mut(&user_id).ok_or(LedgerError::BalanceNotFound(user_id))?;
        balance.credit(amount)?;
        let order = state.pending_order_mut(order_id, OrderStatus::Processed)?;
        order.status = OrderStatus::Processed;
        order.accrual = Some(amount);
        order.processed_at = Some(Utc::now());

        Ok(())
    }

    async fn apply_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let order = state.pending_order_mut(order_id, status)?;
        match status {
            OrderStatus::Registered | OrderStatus::Processing => {
                order.status = status;
            }
            OrderStatus::Invalid => {
                order.status = status;
                order.processed_at = Some(Utc::now());
            }
            OrderStatus::New | OrderStatus::Processed => {
                return Err(LedgerError::InvalidTransition {
                    order_id,
                    from: order.status,
                    to: status,
                });
            }
        }
        Ok(())
    }

    async fn withdraw(&self, user_id: UserId, order_ref: &str, sum: Decimal) -> Result<Withdrawal> {
        let mut state = self.state.lock().await;
        let balance =
            state.balances.get_mut(&user_id).ok_or(LedgerError::BalanceNotFound(user_id))?;
        balance.debit(sum)?;

        state.last_withdrawal_id += 1;
        let withdrawal = Withdrawal {
            id: state.last_withdrawal_id,
            user_id,
            order: order_ref.to_string(),
            sum,
            processed_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());

        Ok(withdrawal)
    }

    async fn list_withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        let state = self.state.lock().await;
        let mut withdrawals: Vec<Withdrawal> =
            state.withdrawals.iter().filter(|w| w.user_id == user_id).cloned().collect();
        withdrawals.sort_by(|a, b| b.processed_at.cmp(&a.processed_at).then(b.id.cmp(&a.id)));
        Ok(withdrawals)
    }

    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.status.is_pending())
            .map(|o| PendingOrder {
                order_id: o.id,
                order_number: o.number.clone(),
                user_id: o.user_id,
                status: o.status,
            })
            .collect())
    }
}
