//! Non-negative fixed-point amounts.
//!
//! Ledger amounts are `rust_decimal::Decimal`, never binary floats, so sums
//! over many postings stay exact. An amount always fits the storage column
//! `NUMERIC(20, 4)`: at most four fractional digits and sixteen integer
//! digits, so what is validated is exactly what is persisted.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),

    #[error("amount has more than {max} decimal places: {0}", max = Amount::MAX_SCALE)]
    TooPrecise(Decimal),

    #[error("amount is out of range: {0}")]
    OutOfRange(Decimal),

    #[error("invalid amount: {0}")]
    Parse(String),
}

/// A non-negative decimal amount (a debit or credit column value).
///
/// Stored normalized (`500.00` becomes `500`) and serialized as a decimal
/// string (`"500"`) so no precision is lost in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Fractional digits kept by the ledger columns.
    pub const MAX_SCALE: u32 = 4;

    /// Exclusive upper bound: sixteen integer digits.
    const INTEGER_DIGITS: u32 = 16;

    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        let value = value.normalize();
        if value.scale() > Self::MAX_SCALE {
            return Err(AmountError::TooPrecise(value));
        }
        if value.trunc() >= Decimal::from(10i64.pow(Self::INTEGER_DIGITS)) {
            return Err(AmountError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub const fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| AmountError::Parse(e.to_string()))?;
        Self::new(value)
    }
}

/// Exact `Σ amounts`, or `None` if the total leaves the `Decimal` range.
pub fn checked_sum(amounts: impl IntoIterator<Item = Amount>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a.0))
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
