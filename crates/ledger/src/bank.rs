//! The operation set exposed to the session layer.
//!
//! Every operation authorizes the caller before touching storage (the one
//! exception is [`Bank::entry`], which must read the entry to know its
//! parties), then dispatches to the engine that owns the behavior.

use std::sync::Arc;

use alphabank_auth::{Caller, Permission, Role, authorize, explain_authorization, has_permission};
use alphabank_core::{Amount, Decimal, DomainError, DomainResult, TransactionId, Username};

use crate::account::Account;
use crate::administration::AccountAdministration;
use crate::cash::CashDesk;
use crate::entry::LedgerEntry;
use crate::mutator::BalanceMutator;
use crate::requests::{RequestResolution, RequestWorkflow};
use crate::retry::RetryPolicy;
use crate::store::{AccountStore, EntryStore};
use crate::transfer::TransferEngine;

/// Authorizing façade over the ledger engines.
///
/// Money-moving operations run under `retry`, which only ever retries
/// optimistic-concurrency conflicts. The default policy makes a single
/// attempt.
pub struct Bank<A: ?Sized, E: ?Sized> {
    mutator: BalanceMutator<Arc<A>>,
    transfers: TransferEngine<Arc<A>, Arc<E>>,
    requests: RequestWorkflow<Arc<A>, Arc<E>>,
    cash: CashDesk<Arc<A>, Arc<E>>,
    admin: AccountAdministration<Arc<A>>,
    retry: RetryPolicy,
}

impl<A, E> Bank<A, E>
where
    A: AccountStore + ?Sized,
    E: EntryStore + ?Sized,
{
    pub fn new(accounts: Arc<A>, entries: Arc<E>) -> Self {
        Self {
            mutator: BalanceMutator::new(accounts.clone()),
            transfers: TransferEngine::new(accounts.clone(), entries.clone()),
            requests: RequestWorkflow::new(accounts.clone(), entries.clone()),
            cash: CashDesk::new(accounts.clone(), entries),
            admin: AccountAdministration::new(accounts),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn gate(&self, caller: &Caller, required: &Permission) -> DomainResult<()> {
        authorize(caller, required).map_err(|err| {
            let explanation = explain_authorization(caller, required);
            tracing::warn!(caller = %caller, explanation = ?explanation, "authorization denied");
            DomainError::from(err)
        })
    }

    pub async fn transfer(
        &self,
        caller: &Caller,
        recipient: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        self.gate(caller, &Permission::TRANSFER)?;
        self.retry
            .retry_on_conflict(|_| self.transfers.transfer(&caller.username, recipient, amount))
            .await
    }

    /// Ask `payer` for `amount`; the caller is the requester.
    pub async fn raise_request(
        &self,
        caller: &Caller,
        payer: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        self.gate(caller, &Permission::REQUEST)?;
        self.requests.raise_request(&caller.username, payer, amount).await
    }

    pub async fn approve(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        self.gate(caller, &Permission::REQUEST)?;
        self.retry
            .retry_on_conflict(|_| self.requests.approve(&caller.username, transaction_id))
            .await
    }

    pub async fn reject(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        self.gate(caller, &Permission::REQUEST)?;
        self.requests.reject(&caller.username, transaction_id).await
    }

    pub async fn cancel(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        self.gate(caller, &Permission::REQUEST)?;
        self.requests.cancel(&caller.username, transaction_id).await
    }

    pub async fn deposit(
        &self,
        caller: &Caller,
        account: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        self.gate(caller, &Permission::CASH)?;
        self.retry
            .retry_on_conflict(|_| self.cash.deposit(account, amount))
            .await
    }

    pub async fn withdraw(
        &self,
        caller: &Caller,
        account: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        self.gate(caller, &Permission::CASH)?;
        self.retry
            .retry_on_conflict(|_| self.cash.withdraw(account, amount))
            .await
    }

    /// The caller's own balance, or another account's with the right
    /// permission.
    pub async fn balance(&self, caller: &Caller, account: Option<&Username>) -> DomainResult<Decimal> {
        let target = account.unwrap_or(&caller.username);
        if caller.is(target) {
            self.gate(caller, &Permission::BALANCE_OWN)?;
        } else {
            self.gate(caller, &Permission::BALANCE_ANY)?;
        }
        self.mutator.balance(target).await
    }

    /// Requests waiting for the caller to pay.
    pub async fn list_pending(&self, caller: &Caller) -> DomainResult<Vec<LedgerEntry>> {
        self.gate(caller, &Permission::REQUEST)?;
        self.requests.list_pending(&caller.username).await
    }

    /// View one entry. Visible to either party, and to roles holding
    /// `ledger.entries.any`.
    pub async fn entry(&self, caller: &Caller, transaction_id: TransactionId) -> DomainResult<LedgerEntry> {
        let entry = self.requests.entry(transaction_id).await?;
        if entry.is_party(&caller.username) {
            return Ok(entry);
        }
        self.gate(caller, &Permission::ENTRIES_ANY)?;
        Ok(entry)
    }

    pub async fn change_role(&self, caller: &Caller, target: &Username, role: Role) -> DomainResult<Account> {
        self.gate(caller, &Permission::ROLES)?;
        self.retry
            .retry_on_conflict(|_| self.admin.change_role(target, role))
            .await
    }

    pub async fn promote(&self, caller: &Caller, target: &Username) -> DomainResult<Account> {
        self.gate(caller, &Permission::ROLES)?;
        self.retry.retry_on_conflict(|_| self.admin.promote(target)).await
    }

    pub async fn demote(&self, caller: &Caller, target: &Username) -> DomainResult<Account> {
        self.gate(caller, &Permission::ROLES)?;
        self.retry.retry_on_conflict(|_| self.admin.demote(target)).await
    }

    pub async fn enroll(
        &self,
        caller: &Caller,
        username: Username,
        password_hash: impl Into<String>,
        role: Role,
    ) -> DomainResult<Account> {
        self.gate(caller, &Permission::ENROLL)?;
        self.admin.enroll(caller.role, username, password_hash, role).await
    }

    /// Bootstrap path: not tied to a caller.
    pub async fn seed_admin(&self, username: Username, password_hash: impl Into<String>) -> DomainResult<bool> {
        self.admin.seed_admin(username, password_hash).await
    }

    /// Whether `caller` may perform cash operations, without side effects.
    pub fn can_handle_cash(&self, caller: &Caller) -> bool {
        has_permission(caller, &Permission::CASH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAccountStore, InMemoryEntryStore};
    use crate::testing::{account, user};

    fn bank() -> Bank<InMemoryAccountStore, InMemoryEntryStore> {
        let accounts = InMemoryAccountStore::with_accounts([
            account("alice", 100, Role::User),
            account("bob", 0, Role::User),
            account("teller", 0, Role::Teller),
            account("root", 0, Role::Admin),
        ]);
        Bank::new(Arc::new(accounts), Arc::new(InMemoryEntryStore::new()))
    }

    fn caller(name: &str, role: Role) -> Caller {
        Caller::new(user(name), role)
    }

    #[tokio::test]
    async fn users_cannot_handle_cash() {
        let bank = bank();
        let alice = caller("alice", Role::User);
        assert!(!bank.can_handle_cash(&alice));

        let err = bank
            .deposit(&alice, &user("alice"), Amount::parse("5").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));
        assert_eq!(bank.balance(&alice, None).await.unwrap(), Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn tellers_deposit_for_others() {
        let bank = bank();
        let teller = caller("teller", Role::Teller);
        bank.deposit(&teller, &user("bob"), Amount::parse("5").unwrap())
            .await
            .unwrap();
        assert_eq!(
            bank.balance(&teller, Some(&user("bob"))).await.unwrap(),
            Decimal::new(5, 0)
        );
    }

    #[tokio::test]
    async fn users_only_see_their_own_balance() {
        let bank = bank();
        let bob = caller("bob", Role::User);
        assert_eq!(bank.balance(&bob, Some(&user("bob"))).await.unwrap(), Decimal::ZERO);
        let err = bank.balance(&bob, Some(&user("alice"))).await.unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn entries_are_visible_to_parties_and_staff_only() {
        let bank = bank();
        let alice = caller("alice", Role::User);
        let entry = bank
            .transfer(&alice, &user("bob"), Amount::parse("1").unwrap())
            .await
            .unwrap();

        assert!(bank.entry(&caller("bob", Role::User), entry.transaction_id).await.is_ok());
        assert!(bank.entry(&caller("teller", Role::Teller), entry.transaction_id).await.is_ok());
        let err = bank
            .entry(&caller("mallory", Role::User), entry.transaction_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn only_admins_change_roles() {
        let bank = bank();
        let err = bank
            .promote(&caller("teller", Role::Teller), &user("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));

        let promoted = bank.promote(&caller("root", Role::Admin), &user("bob")).await.unwrap();
        assert_eq!(promoted.role, Role::Teller);
    }

    #[tokio::test]
    async fn users_cannot_enroll_and_tellers_cannot_mint_admins() {
        let bank = bank();
        let err = bank
            .enroll(&caller("alice", Role::User), user("carol"), "hash", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));

        let err = bank
            .enroll(&caller("teller", Role::Teller), user("carol"), "hash", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));

        let carol = bank
            .enroll(&caller("teller", Role::Teller), user("carol"), "hash", Role::User)
            .await
            .unwrap();
        assert_eq!(carol.role, Role::User);
    }

    #[tokio::test]
    async fn works_over_trait_objects() {
        let accounts: Arc<dyn AccountStore> =
            Arc::new(InMemoryAccountStore::with_accounts([account("alice", 10, Role::User)]));
        let entries: Arc<dyn EntryStore> = Arc::new(InMemoryEntryStore::new());
        let bank = Bank::new(accounts, entries);
        let alice = caller("alice", Role::User);
        assert_eq!(bank.balance(&alice, None).await.unwrap(), Decimal::new(10, 0));
    }
}
