//! AccountService - order intake, withdrawals and account queries
//!
//! This crate provides the AccountService which admits order numbers under the
//! ownership rules, debits balances for withdrawals, and answers the per-user
//! listings the HTTP layer serves. All state lives in a [`ledger_store::LedgerStore`].

pub mod account;
pub mod error;
pub mod order_number;

pub use account::{AccountService, SubmitOutcome};
pub use error::AccountServiceError;
pub use order_number::{luhn_valid, validate_order_number, OrderNumberError};

// Result type alias
pub type Result<T> = std::result::Result<T, AccountServiceError>;
