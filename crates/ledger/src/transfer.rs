//! Send money: debit sender, credit recipient, record the entry.

use chrono::Utc;
use tracing::instrument;

use alphabank_core::{Amount, DomainError, DomainResult, Username};

use crate::entry::{EntryKind, LedgerEntry};
use crate::mutator::BalanceMutator;
use crate::retry::RetryPolicy;
use crate::store::{AccountStore, EntryStore};

/// Orchestrates a two-account movement plus its ledger entry.
///
/// The legs run in a fixed order: debit, credit, record. They are separate
/// compare-and-swaps, so a later leg can fail after an earlier one committed;
/// when that happens the committed legs are reversed before the failure is
/// returned.
#[derive(Debug, Clone)]
pub struct TransferEngine<A, E> {
    mutator: BalanceMutator<A>,
    entries: E,
    compensation: RetryPolicy,
}

impl<A: AccountStore, E: EntryStore> TransferEngine<A, E> {
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

    /// Move `amount` from `sender` to `recipient`.
    ///
    /// Self-transfers are allowed; they leave the balance unchanged but still
    /// bump the version twice and record an entry.
    #[instrument(skip_all, fields(sender = %sender, recipient = %recipient, amount = %amount), err)]
    pub async fn transfer(
        &self,
        sender: &Username,
        recipient: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        let sender_account = self.mutator.account(sender).await?;
        self.mutator.account(recipient).await?;

        if sender_account.balance < amount.value() {
            return Err(DomainError::InsufficientFunds {
                available: sender_account.balance,
                requested: amount.value(),
            });
        }

        self.mutator.adjust(sender, amount.debit()).await?;

        if let Err(err) = self.mutator.adjust(recipient, amount.credit()).await {
            self.mutator
                .compensate(sender, amount.credit(), &self.compensation, &err)
                .await?;
            return Err(err);
        }

        let entry = LedgerEntry::new(
            EntryKind::Send,
            sender.clone(),
            recipient.clone(),
            amount,
            Utc::now(),
        );
        if let Err(err) = self.entries.create(entry.clone()).await {
            let err = DomainError::from(err);
            self.mutator
                .compensate(recipient, amount.debit(), &self.compensation, &err)
                .await?;
            self.mutator
                .compensate(sender, amount.credit(), &self.compensation, &err)
                .await?;
            return Err(err);
        }

        tracing::info!(transaction_id = %entry.transaction_id, "transfer recorded");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::entry::EntryStatus;
    use crate::store::{InMemoryAccountStore, InMemoryEntryStore};
    use crate::testing::{FailingEntryStore, FlakyAccountStore, funded, user};
    use alphabank_core::Decimal;
    use std::sync::Arc;

    fn setup(
        accounts: impl IntoIterator<Item = Account>,
    ) -> (
        TransferEngine<Arc<InMemoryAccountStore>, Arc<InMemoryEntryStore>>,
        Arc<InMemoryAccountStore>,
        Arc<InMemoryEntryStore>,
    ) {
        let store = Arc::new(InMemoryAccountStore::with_accounts(accounts));
        let entries = Arc::new(InMemoryEntryStore::new());
        (
            TransferEngine::new(store.clone(), entries.clone()),
            store,
            entries,
        )
    }

    async fn balance_of(store: &InMemoryAccountStore, name: &str) -> Decimal {
        store.get(&user(name)).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn transfer_moves_funds_and_records_one_send_entry() {
        let (engine, store, entries) = setup([funded("a", 100), funded("b", 5)]);

        let entry = engine
            .transfer(&user("a"), &user("b"), Amount::parse("40").unwrap())
            .await
            .unwrap();

        assert_eq!(balance_of(&store, "a").await, Decimal::new(60, 0));
        assert_eq!(balance_of(&store, "b").await, Decimal::new(45, 0));
        assert_eq!(entry.kind, EntryKind::Send);
        assert_eq!(entry.status, EntryStatus::Approved);
        assert_eq!(entry.amount, Amount::parse("40").unwrap());
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn insufficient_funds_touches_nothing() {
        let (engine, store, entries) = setup([funded("a", 10), funded("b", 0)]);

        let err = engine
            .transfer(&user("a"), &user("b"), Amount::parse("10.01").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientFunds { .. }));
        let a = store.get(&user("a")).await.unwrap().unwrap();
        assert_eq!((a.balance, a.version), (Decimal::new(10, 0), 0));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected_before_debit() {
        let (engine, store, entries) = setup([funded("a", 10)]);

        let err = engine
            .transfer(&user("a"), &user("ghost"), Amount::parse("1").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(store.get(&user("a")).await.unwrap().unwrap().version, 0);
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn self_transfer_is_allowed_and_balance_neutral() {
        let (engine, store, _entries) = setup([funded("a", 10)]);

        engine
            .transfer(&user("a"), &user("a"), Amount::parse("10").unwrap())
            .await
            .unwrap();

        let a = store.get(&user("a")).await.unwrap().unwrap();
        assert_eq!(a.balance, Decimal::new(10, 0));
        assert_eq!(a.version, 2);
    }

    #[tokio::test]
    async fn failed_credit_leg_is_compensated() {
        // The credit on "b" fails with a backend error after "a" was debited.
        let inner = Arc::new(InMemoryAccountStore::with_accounts([funded("a", 100), funded("b", 0)]));
        let accounts = Arc::new(FlakyAccountStore::failing_credits_to(inner.clone(), user("b")));
        let entries = Arc::new(InMemoryEntryStore::new());
        let engine = TransferEngine::new(accounts, entries.clone());

        let err = engine
            .transfer(&user("a"), &user("b"), Amount::parse("30").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Storage(_)));
        let a = inner.get(&user("a")).await.unwrap().unwrap();
        assert_eq!(a.balance, Decimal::new(100, 0));
        // debit + compensating credit
        assert_eq!(a.version, 2);
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn failed_entry_write_reverses_both_legs() {
        let store = Arc::new(InMemoryAccountStore::with_accounts([funded("a", 100), funded("b", 0)]));
        let engine = TransferEngine::new(store.clone(), Arc::new(FailingEntryStore));

        let err = engine
            .transfer(&user("a"), &user("b"), Amount::parse("30").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Storage(_)));
        assert_eq!(balance_of(&store, "a").await, Decimal::new(100, 0));
        assert_eq!(balance_of(&store, "b").await, Decimal::ZERO);
    }
}
