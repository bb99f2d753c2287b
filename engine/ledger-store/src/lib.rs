//! # Ledger Store
//!
//! Durable state for the loyalty points backend: users, their orders, one
//! balance per user, and the append-only withdrawal log.
//!
//! ## Architecture
//!
//! - **LedgerStore**: capability trait every backend implements
//! - **PgLedgerStore**: PostgreSQL backend (sqlx), schema applied from `migrations/`
//! - **InMemoryLedgerStore**: single-lock in-memory backend for tests and local runs
//!
//! Every multi-row operation (`create_user_with_balance`, `apply_credit`,
//! `withdraw`) commits all of its writes or none of them. Uniqueness of logins
//! and order numbers is decided by the store itself, never by a prior read.
//!
//! ## Usage
//!
//! ```rust
//! use ledger_store::{InMemoryLedgerStore, LedgerStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryLedgerStore::new();
//!     let user = store.create_user_with_balance("alice", "hash").await?;
//!     store.admit_order(user, "4561261212345467").await?;
//!
//!     let pending = store.pending_orders().await?;
//!     assert_eq!(pending.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod balance;
pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod types;

pub use balance::{fits_ledger, Balance, AMOUNT_SCALE, MAX_AMOUNT};
pub use config::DatabaseConfig;
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::LedgerStore;
pub use types::{Order, OrderId, OrderStatus, PendingOrder, User, UserId, Withdrawal};

/// Re-export so callers share one decimal type with the store
pub use rust_decimal::Decimal;
