//! Cash deposits and withdrawals at the bank boundary.

use chrono::Utc;
use tracing::instrument;

use alphabank_core::{Amount, Decimal, DomainError, DomainResult, Username};

use crate::entry::{EntryKind, LedgerEntry};
use crate::mutator::BalanceMutator;
use crate::retry::RetryPolicy;
use crate::store::{AccountStore, EntryStore};

/// Moves money between an account and the bank itself.
///
/// The bank side is not an account; entries name it with the reserved
/// counterparty [`Username::bank`].
#[derive(Debug, Clone)]
pub struct CashDesk<A, E> {
    mutator: BalanceMutator<A>,
    entries: E,
    compensation: RetryPolicy,
}

impl<A: AccountStore, E: EntryStore> CashDesk<A, E> {
    pub fn new(accounts: A, entries: E) -> Self {
        Self {
            mutator: BalanceMutator::new(accounts),
            entries,
            compensation: RetryPolicy::compensation(),
        }
    }

    pub fn with_compensation_policy(mut self, policy: RetryPolicy) -> Self {
        self.compensation = policy;
        self
    }

    #[instrument(skip_all, fields(username = %username, amount = %amount), err)]
    pub async fn deposit(&self, username: &Username, amount: Amount) -> DomainResult<LedgerEntry> {
        self.mutator.adjust(username, amount.credit()).await?;
        let entry = LedgerEntry::new(
            EntryKind::Deposit,
            Username::bank(),
            username.clone(),
            amount,
            Utc::now(),
        );
        self.record(entry, username, amount.debit()).await
    }

    #[instrument(skip_all, fields(username = %username, amount = %amount), err)]
    pub async fn withdraw(&self, username: &Username, amount: Amount) -> DomainResult<LedgerEntry> {
        let balance = self.mutator.balance(username).await?;
        if balance < amount.value() {
            return Err(DomainError::InsufficientFunds {
                available: balance,
                requested: amount.value(),
            });
        }
        self.mutator.adjust(username, amount.debit()).await?;
        let entry = LedgerEntry::new(
            EntryKind::Withdrawal,
            username.clone(),
            Username::bank(),
            amount,
            Utc::now(),
        );
        self.record(entry, username, amount.credit()).await
    }

    /// Write the entry for an already-applied adjustment, reversing it with
    /// `undo` if the write fails.
    async fn record(
        &self,
        entry: LedgerEntry,
        username: &Username,
        undo: Decimal,
    ) -> DomainResult<LedgerEntry> {
        if let Err(err) = self.entries.create(entry.clone()).await {
            let err = DomainError::from(err);
            self.mutator
                .compensate(username, undo, &self.compensation, &err)
                .await?;
            return Err(err);
        }
        tracing::info!(transaction_id = %entry.transaction_id, kind = %entry.kind, "cash entry recorded");
        Ok(entry)
    }
}
