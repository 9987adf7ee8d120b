//! Monetary amounts.
//!
//! Balances are plain `Decimal`s (they may legitimately be zero). Amounts moved
//! by an operation are always strictly positive with at most two decimal
//! places, and are validated before any storage access.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Maximum number of decimal places accepted for an amount.
pub const AMOUNT_SCALE: u32 = 2;

/// A strictly positive amount with at most two decimal places.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::invalid_amount(format!(
                "{value} must be greater than zero"
            )));
        }
        let normalized = value.normalize();
        if normalized.scale() > AMOUNT_SCALE {
            return Err(DomainError::invalid_amount(format!(
                "{value} has more than {AMOUNT_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }

    /// Parse user input of the form `123` or `123.4` or `123.45`.
    ///
    /// Signs, exponents and thousands separators are rejected.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (raw, None),
        };
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let well_formed = digits(whole)
            && fraction.is_none_or(|f| digits(f) && f.len() <= AMOUNT_SCALE as usize);
        if !well_formed {
            return Err(DomainError::invalid_amount(format!(
                "'{raw}' should be a positive number with up to {AMOUNT_SCALE} decimal places"
            )));
        }
        let value = Decimal::from_str(raw)
            .map_err(|e| DomainError::invalid_amount(format!("'{raw}': {e}")))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Signed delta that debits this amount.
    pub fn debit(&self) -> Decimal {
        -self.0
    }

    /// Signed delta that credits this amount.
    pub fn credit(&self) -> Decimal {
        self.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}
