//! Fixtures and store doubles shared by the unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use alphabank_auth::Role;
use alphabank_core::{Decimal, ExpectedVersion, TransactionId, Username};

use crate::account::{Account, BalanceUpdate};
use crate::entry::{EntryStatus, LedgerEntry};
use crate::store::{AccountStore, EntryStore, InMemoryAccountStore, InMemoryEntryStore, StoreError};

pub fn user(name: &str) -> Username {
    Username::parse(name).unwrap()
}

pub fn funded(name: &str, balance: i64) -> Account {
    account(name, balance, Role::User)
}

pub fn account(name: &str, balance: i64, role: Role) -> Account {
    Account {
        balance: Decimal::new(balance, 0),
        ..Account::enrolled(user(name), "hash", role)
    }
}

/// Delegates to an in-memory store but fails every credit to one account.
pub struct FlakyAccountStore {
    inner: Arc<InMemoryAccountStore>,
    refuse_credits_to: Username,
}

impl FlakyAccountStore {
    pub fn failing_credits_to(inner: Arc<InMemoryAccountStore>, username: Username) -> Self {
        Self {
            inner,
            refuse_credits_to: username,
        }
    }
}

#[async_trait]
impl AccountStore for FlakyAccountStore {
    async fn get(&self, username: &Username) -> Result<Option<Account>, StoreError> {
        self.inner.get(username).await
    }

    async fn create(&self, account: Account) -> Result<(), StoreError> {
        self.inner.create(account).await
    }

    async fn compare_and_swap_balance(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Decimal,
    ) -> Result<BalanceUpdate, StoreError> {
        if username == &self.refuse_credits_to && delta > Decimal::ZERO {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.compare_and_swap_balance(username, expected, delta).await
    }

    async fn compare_and_swap_role(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        role: Role,
    ) -> Result<Account, StoreError> {
        self.inner.compare_and_swap_role(username, expected, role).await
    }
}

/// An entry store whose backend is always down.
pub struct FailingEntryStore;

fn down() -> StoreError {
    StoreError::Backend("entry store unavailable".to_string())
}

#[async_trait]
impl EntryStore for FailingEntryStore {
    async fn create(&self, _entry: LedgerEntry) -> Result<(), StoreError> {
        Err(down())
    }

    async fn get(&self, _transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        Err(down())
    }

    async fn update_status(
        &self,
        _transaction_id: TransactionId,
        _expected: ExpectedVersion,
        _status: EntryStatus,
        _at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        Err(down())
    }

    async fn list_pending_for_payer(&self, _payer: &Username) -> Result<Vec<LedgerEntry>, StoreError> {
        Err(down())
    }
}

/// Simulates a second session resolving the entry between our read and our
/// status update: every status update is preceded by a competing reject.
pub struct RacingEntryStore {
    pub inner: Arc<InMemoryEntryStore>,
}

#[async_trait]
impl EntryStore for RacingEntryStore {
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.inner.create(entry).await
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        self.inner.get(transaction_id).await
    }

    async fn update_status(
        &self,
        transaction_id: TransactionId,
        expected: ExpectedVersion,
        status: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        let _ = self
            .inner
            .update_status(transaction_id, expected, EntryStatus::Rejected, at)
            .await;
        self.inner.update_status(transaction_id, expected, status, at).await
    }

    async fn list_pending_for_payer(&self, payer: &Username) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.list_pending_for_payer(payer).await
    }
}
