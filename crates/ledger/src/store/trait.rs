use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use alphabank_auth::Role;
use alphabank_core::{Decimal, DomainError, ExpectedVersion, TransactionId, Username};

use crate::account::{Account, BalanceUpdate};
use crate::entry::{EntryStatus, LedgerEntry};

/// Store operation error.
///
/// These are **storage-level** outcomes (version races, missing rows, backend
/// failures) as opposed to business decisions. `Conflict` and
/// `WouldGoNegative` are kept distinct so callers can retry one and fail the
/// other.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: expected v{expected}, found v{actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("balance {balance} cannot absorb delta {delta}")]
    WouldGoNegative { balance: Decimal, delta: Decimal },

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            e @ StoreError::Conflict { .. } => DomainError::Conflict(e.to_string()),
            e @ StoreError::InvalidTransition(_) => DomainError::Conflict(e.to_string()),
            StoreError::NotFound(what) => DomainError::NotFound(what),
            StoreError::WouldGoNegative { balance, delta } => DomainError::InsufficientFunds {
                available: balance,
                requested: -delta,
            },
            StoreError::AlreadyExists(what) => DomainError::AlreadyExists(what),
            StoreError::Backend(msg) => DomainError::Storage(msg),
        }
    }
}

/// Versioned account storage.
///
/// ## Compare-and-swap contract
///
/// `compare_and_swap_balance` checks `version == expected` **and**
/// `balance + delta >= 0` as one atomic step relative to every other caller.
/// On success the version increments by exactly one and the balance changes by
/// exactly `delta`. On failure nothing changes and the error says which
/// condition failed (version first).
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, username: &Username) -> Result<Option<Account>, StoreError>;

    /// Insert a new account; usernames are unique.
    async fn create(&self, account: Account) -> Result<(), StoreError>;

    async fn compare_and_swap_balance(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Decimal,
    ) -> Result<BalanceUpdate, StoreError>;

    /// Versioned role change; same version protocol as balance updates.
    async fn compare_and_swap_role(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        role: Role,
    ) -> Result<Account, StoreError>;
}

/// Append-mostly ledger entry storage.
///
/// Entries are never deleted. The only mutation is a versioned status
/// transition, which must also respect the pending → approved/rejected
/// state machine.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError>;

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError>;

    async fn update_status(
        &self,
        transaction_id: TransactionId,
        expected: ExpectedVersion,
        status: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError>;

    /// Pending requests `payer` is expected to settle, newest first.
    async fn list_pending_for_payer(&self, payer: &Username) -> Result<Vec<LedgerEntry>, StoreError>;
}

#[async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn get(&self, username: &Username) -> Result<Option<Account>, StoreError> {
        (**self).get(username).await
    }

    async fn create(&self, account: Account) -> Result<(), StoreError> {
        (**self).create(account).await
    }

    async fn compare_and_swap_balance(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Decimal,
    ) -> Result<BalanceUpdate, StoreError> {
        (**self).compare_and_swap_balance(username, expected, delta).await
    }

    async fn compare_and_swap_role(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        role: Role,
    ) -> Result<Account, StoreError> {
        (**self).compare_and_swap_role(username, expected, role).await
    }
}

#[async_trait]
impl<S> EntryStore for Arc<S>
where
    S: EntryStore + ?Sized,
{
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        (**self).create(entry).await
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        (**self).get(transaction_id).await
    }

    async fn update_status(
        &self,
        transaction_id: TransactionId,
        expected: ExpectedVersion,
        status: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        (**self).update_status(transaction_id, expected, status, at).await
    }

    async fn list_pending_for_payer(&self, payer: &Username) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).list_pending_for_payer(payer).await
    }
}
