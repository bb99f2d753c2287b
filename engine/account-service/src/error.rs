//! Error types for AccountService

use http::StatusCode;
use ledger_store::{Decimal, LedgerError, UserId};
use thiserror::Error;

use crate::order_number::OrderNumberError;

#[derive(Error, Debug)]
pub enum AccountServiceError {
    #[error("Invalid order number: {0}")]
    InvalidOrderNumber(OrderNumberError),

    #[error("Order {order_number} is owned by another user")]
    OrderOwnedByAnother { order_number: String },

    #[error("Login already taken: {login}")]
    LoginTaken { login: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Account not found: {user_id}")]
    AccountNotFound { user_id: UserId },

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl AccountServiceError {
    /// Status code the HTTP layer answers with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountServiceError::InvalidOrderNumber(OrderNumberError::Checksum) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AccountServiceError::InvalidOrderNumber(_)
            | AccountServiceError::InvalidAmount { .. }
            | AccountServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            AccountServiceError::OrderOwnedByAnother { .. }
            | AccountServiceError::LoginTaken { .. } => StatusCode::CONFLICT,
            AccountServiceError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            AccountServiceError::AccountNotFound { .. } => StatusCode::NOT_FOUND,
            AccountServiceError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OrderNumberError> for AccountServiceError {
    fn from(err: OrderNumberError) -> Self {
        AccountServiceError::InvalidOrderNumber(err)
    }
}

impl From<LedgerError> for AccountServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::LoginTaken(login) => AccountServiceError::LoginTaken { login },
            LedgerError::InsufficientFunds { requested, available } => {
                AccountServiceError::InsufficientBalance { required: requested, available }
            }
            LedgerError::InvalidAmount(amount) => AccountServiceError::InvalidAmount { amount },
            LedgerError::ValueRejected(message) => AccountServiceError::InvalidRequest { message },
            LedgerError::UserNotFound(user_id) | LedgerError::BalanceNotFound(user_id) => {
                AccountServiceError::AccountNotFound { user_id }
            }
            other => AccountServiceError::Ledger(other),
        }
    }
}
