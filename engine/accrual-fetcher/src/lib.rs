//! Accrual Fetcher
//!
//! Talks to the external accrual system and folds its decisions back into the
//! ledger. [`HttpAccrualClient`] asks for the status of one order number;
//! [`ReconciliationPoller`] walks the pending orders on a fixed interval and
//! applies credits and status changes through the [`ledger_store::LedgerStore`].

pub mod config;
pub mod fetcher;
pub mod models;
pub mod scheduler;

pub use config::{FetcherConfig, PollerConfig};
pub use fetcher::{AccrualClient, AccrualError, HttpAccrualClient};
pub use models::{AccrualResponse, AccrualStatus};
pub use scheduler::{ReconciliationPoller, TickReport};
