//! `alphabank-core`: ledger domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{BANK_COUNTERPARTY, TransactionId, Username};
pub use money::{AMOUNT_SCALE, Amount};
pub use version::ExpectedVersion;

pub use rust_decimal::Decimal;
