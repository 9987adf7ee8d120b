//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the ledger domain.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Each variant is a distinct, named outcome the transport layer can render
/// without inspecting message text. Validation variants are always produced
/// before any storage access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Referenced account or ledger entry is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency check failed (stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Business rule: the paying account cannot cover the amount.
    #[error("insufficient funds (available: {available}, requested: {requested})")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// Amount failed validation (non-positive, malformed, too many decimals).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Username failed validation.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Transaction id text is not a UUID.
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),

    /// Role or ownership check failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Requested role change is not in the transition table.
    #[error("invalid role transition: {0}")]
    InvalidRoleTransition(String),

    /// A record with the same key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A multi-step movement failed and could not be compensated.
    #[error("unreconciled movement: {0}")]
    Unreconciled(String),

    /// Backing store failure unrelated to business rules.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn not_authorized(msg: impl Into<String>) -> Self {
        Self::NotAuthorized(msg.into())
    }

    /// Whether retrying the same operation could succeed.
    ///
    /// Only version races qualify; funds and validation failures never do.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DomainError::conflict("v0 != v1").is_conflict());
        assert!(!DomainError::InsufficientFunds {
            available: Decimal::ZERO,
            requested: Decimal::ONE,
        }
        .is_conflict());
        assert!(!DomainError::not_found("alice").is_conflict());
    }

    #[test]
    fn insufficient_funds_renders_both_amounts() {
        let err = DomainError::InsufficientFunds {
            available: Decimal::new(2000, 2),
            requested: Decimal::new(100000, 2),
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds (available: 20.00, requested: 1000.00)"
        );
    }
}
