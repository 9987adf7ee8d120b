use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use alphabank_auth::Role;
use alphabank_core::{Decimal, ExpectedVersion, TransactionId, Username};

use super::r#trait::{AccountStore, EntryStore, StoreError};
use crate::account::{Account, BalanceUpdate};
use crate::entry::{EntryKind, EntryStatus, LedgerEntry};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory account store.
///
/// Intended for tests/dev. Each compare-and-swap runs under one write lock, so
/// the version and funds checks are atomic with the write.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Username, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed accounts directly (tests/dev fixtures).
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let map = accounts
            .into_iter()
            .map(|a| (a.username.clone(), a))
            .collect();
        Self {
            accounts: RwLock::new(map),
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, username: &Username) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(username).cloned())
    }

    async fn create(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&account.username) {
            return Err(StoreError::AlreadyExists(account.username.to_string()));
        }
        accounts.insert(account.username.clone(), account);
        Ok(())
    }

    async fn compare_and_swap_balance(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Decimal,
    ) -> Result<BalanceUpdate, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;

        if !expected.matches(account.version) {
            return Err(StoreError::Conflict {
                expected: expected.get(),
                actual: account.version,
            });
        }

        let new_balance = account.balance + delta;
        if new_balance < Decimal::ZERO {
            return Err(StoreError::WouldGoNegative {
                balance: account.balance,
                delta,
            });
        }

        account.balance = new_balance;
        account.version += 1;

        Ok(BalanceUpdate {
            username: username.clone(),
            new_balance,
            new_version: account.version,
        })
    }

    async fn compare_and_swap_role(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        role: Role,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;

        if !expected.matches(account.version) {
            return Err(StoreError::Conflict {
                expected: expected.get(),
                actual: account.version,
            });
        }

        account.role = role;
        account.version += 1;
        Ok(account.clone())
    }
}

/// In-memory ledger entry store.
///
/// Intended for tests/dev. Not optimized for performance (pending lookups scan).
#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    entries: RwLock<HashMap<TransactionId, LedgerEntry>>,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Panics
    /// If a writer panicked while holding the lock.
    pub fn len(&self) -> usize {
        self.entries.read().expect("entry store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored entry (unordered).
    ///
    /// # Panics
    /// If a writer panicked while holding the lock.
    pub fn all(&self) -> Vec<LedgerEntry> {
        self.entries
            .read()
            .expect("entry store lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if entries.contains_key(&entry.transaction_id) {
            return Err(StoreError::AlreadyExists(entry.transaction_id.to_string()));
        }
        entries.insert(entry.transaction_id, entry);
        Ok(())
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(&transaction_id).cloned())
    }

    async fn update_status(
        &self,
        transaction_id: TransactionId,
        expected: ExpectedVersion,
        status: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let entry = entries
            .get_mut(&transaction_id)
            .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))?;

        if !expected.matches(entry.version) {
            return Err(StoreError::Conflict {
                expected: expected.get(),
                actual: entry.version,
            });
        }

        let updated = entry.transitioned(status, at).ok_or_else(|| {
            StoreError::InvalidTransition(format!("{} -> {status}", entry.status))
        })?;
        *entry = updated.clone();
        Ok(updated)
    }

    async fn list_pending_for_payer(&self, payer: &Username) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut pending: Vec<LedgerEntry> = entries
            .values()
            .filter(|e| {
                &e.from_username == payer
                    && e.kind == EntryKind::Request
                    && e.status == EntryStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(pending)
    }
}
