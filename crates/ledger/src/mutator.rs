//! Single-account balance mutation under optimistic concurrency.

use tracing::instrument;

use alphabank_core::{Decimal, DomainError, DomainResult, ExpectedVersion, Username};

use crate::account::{Account, BalanceUpdate};
use crate::retry::RetryPolicy;
use crate::store::AccountStore;

/// Applies signed deltas to one account at a time.
///
/// `adjust` reads the current version and attempts one compare-and-swap
/// against it. A version race surfaces as `Conflict`; an overdraft surfaces as
/// `InsufficientFunds`. Exactly one account is touched per call and nothing is
/// touched on failure.
#[derive(Debug, Clone)]
pub struct BalanceMutator<A> {
    accounts: A,
}

impl<A: AccountStore> BalanceMutator<A> {
    pub fn new(accounts: A) -> Self {
        Self { accounts }
    }

    pub fn store(&self) -> &A {
        &self.accounts
    }

    /// Load an account or fail with `NotFound`.
    pub async fn account(&self, username: &Username) -> DomainResult<Account> {
        self.accounts
            .get(username)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("account '{username}'")))
    }

    pub async fn balance(&self, username: &Username) -> DomainResult<Decimal> {
        Ok(self.account(username).await?.balance)
    }

    #[instrument(skip_all, fields(username = %username, delta = %delta), err)]
    pub async fn adjust(&self, username: &Username, delta: Decimal) -> DomainResult<BalanceUpdate> {
        let account = self.account(username).await?;
        let update = self
            .accounts
            .compare_and_swap_balance(username, ExpectedVersion::exact(account.version), delta)
            .await?;
        tracing::debug!(
            new_balance = %update.new_balance,
            new_version = update.new_version,
            "balance adjusted"
        );
        Ok(update)
    }

    /// Reverse an earlier leg of a multi-step movement after a later leg
    /// failed.
    ///
    /// Conflicts are retried under `policy`. If the reversal still cannot be
    /// applied the ledger is left unbalanced and `Unreconciled` is returned.
    pub async fn compensate(
        &self,
        username: &Username,
        delta: Decimal,
        policy: &RetryPolicy,
        cause: &DomainError,
    ) -> DomainResult<BalanceUpdate> {
        match policy.retry_on_conflict(|_| self.adjust(username, delta)).await {
            Ok(update) => {
                tracing::warn!(
                    username = %username,
                    delta = %delta,
                    cause = %cause,
                    "compensating adjustment applied"
                );
                Ok(update)
            }
            Err(err) => {
                tracing::error!(
                    username = %username,
                    delta = %delta,
                    cause = %cause,
                    error = %err,
                    "compensating adjustment failed; ledger needs manual reconciliation"
                );
                Err(DomainError::Unreconciled(format!(
                    "could not apply {delta} to '{username}' after '{cause}': {err}"
                )))
            }
        }
    }
}
