//! Per-user point balance

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{LedgerError, Result};

/// Fractional digits every stored amount keeps
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount an account column holds, `9_999_999_999.99` (`NUMERIC(12, 2)`)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, AMOUNT_SCALE);

/// Whether `amount` is stored exactly: non-negative, at most two fractional
/// digits, and within `MAX_AMOUNT`.
pub fn fits_ledger(amount: Decimal) -> bool {
    !amount.is_sign_negative() && amount.normalize().scale() <= AMOUNT_SCALE && amount <= MAX_AMOUNT
}

/// Balance of one user
///
/// `current` never drops below zero and `withdrawn` never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balance {
    /// Points available to spend
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,

    /// Points spent over the account's lifetime
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn new(current: Decimal, withdrawn: Decimal) -> Self {
        Self { current, withdrawn }
    }

    /// Check if the balance can pay `sum`
    pub fn covers(&self, sum: Decimal) -> bool {
        self.current >= sum
    }

    /// Add accrued points
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        if !fits_ledger(amount) {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.current = self
            .current
            .checked_add(amount)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        Ok(())
    }

    /// Spend points, moving them from `current` to `withdrawn`
    pub fn debit(&mut self, sum: Decimal) -> Result<()> {
        if sum <= Decimal::ZERO || !fits_ledger(sum) {
            return Err(LedgerError::InvalidAmount(sum));
        }
        if !self.covers(sum) {
            return Err(LedgerError::InsufficientFunds { requested: sum, available: self.current });
        }
        let withdrawn = self
            .withdrawn
            .checked_add(sum)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or(LedgerError::InvalidAmount(sum))?;
        self.current -= sum;
        self.withdrawn = withdrawn;
        Ok(())
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (withdrawn {})", self.current, self.withdrawn)
    }
}
