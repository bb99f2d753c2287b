//! Error types for the ledger store

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{OrderId, OrderStatus, UserId};

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in the ledger store
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Another user already registered this login
    #[error("Login already taken: {0}")]
    LoginTaken(String),

    /// The order number is already admitted (by anyone)
    #[error("Order already exists: {0}")]
    OrderExists(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Balance not found for user {0}")]
    BalanceNotFound(UserId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A credit named a different user than the one owning the order
    #[error("Order {order_id} is owned by user {owner}, not {claimed}")]
    OwnerMismatch { order_id: OrderId, owner: UserId, claimed: UserId },

    /// The requested status change would move the order backwards or out of a terminal status
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatus, to: OrderStatus },

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// The schema refused a value: a CHECK constraint, or a value out of the column's range
    #[error("Value rejected by the ledger schema: {0}")]
    ValueRejected(String),

    /// A persisted row could not be mapped back to the model
    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Create a new corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Uniqueness or ownership violations. Terminal for the caller.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::LoginTaken(_)
                | Self::OrderExists(_)
                | Self::OwnerMismatch { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// I/O failures the poller may see succeed on a later tick
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => {
                !matches!(err, sqlx::Error::Database(_) | sqlx::Error::RowNotFound)
            }
            _ => false,
        }
    }
}
