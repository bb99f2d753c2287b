//! Ledger model types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// User ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Order ID wrapper (row id, not the order number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing status of an admitted order
///
/// Moves forward only: `NEW -> REGISTERED -> PROCESSING -> {PROCESSED, INVALID}`,
/// with REGISTERED and PROCESSING both skippable. PROCESSED and INVALID are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// Statuses the poller still asks the accrual system about
    pub const PENDING: [OrderStatus; 3] =
        [OrderStatus::New, OrderStatus::Registered, OrderStatus::Processing];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Registered => "REGISTERED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Still awaiting a terminal accrual decision
    pub fn is_pending(self) -> bool {
        Self::PENDING.contains(&self)
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Registered => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Invalid | OrderStatus::Processed => 3,
        }
    }

    /// Whether an order currently in `self` may be moved to `next`.
    ///
    /// Re-applying the current non-terminal status is allowed (a no-op write).
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        !self.is_terminal() && next != OrderStatus::New && next.rank() >= self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "REGISTERED" => Ok(OrderStatus::Registered),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(LedgerError::corruption(format!("unknown order status {other:?}"))),
        }
    }
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Order submitted by a user, serialized the way the orders listing returns it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    #[serde(skip)]
    pub id: OrderId,
    #[serde(skip)]
    pub user_id: UserId,
    pub number: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float_option", skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Append-only record of points spent against an order reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Withdrawal {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub user_id: UserId,
    /// Caller-supplied reference; need not be an admitted order
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Work item for the reconciliation poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    /// Status at snapshot time
    pub status: OrderStatus,
}
