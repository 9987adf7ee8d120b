//! Money requests: raise, approve, reject, cancel.

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use alphabank_core::{Amount, DomainError, DomainResult, ExpectedVersion, TransactionId, Username};

use crate::entry::{EntryKind, EntryStatus, LedgerEntry};
use crate::mutator::BalanceMutator;
use crate::retry::RetryPolicy;
use crate::store::{AccountStore, EntryStore};

/// Outcome of resolving a request.
///
/// `AlreadyProcessed` is a normal outcome: the request was resolved by an
/// earlier (or concurrent) call and nothing was changed by this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestResolution {
    Approved(LedgerEntry),
    Rejected(LedgerEntry),
    AlreadyProcessed {
        transaction_id: TransactionId,
        status: EntryStatus,
    },
}

impl RequestResolution {
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            RequestResolution::Approved(entry) | RequestResolution::Rejected(entry) => Some(entry),
            RequestResolution::AlreadyProcessed { .. } => None,
        }
    }

    fn already(entry: &LedgerEntry) -> Self {
        RequestResolution::AlreadyProcessed {
            transaction_id: entry.transaction_id,
            status: entry.status,
        }
    }
}

impl core::fmt::Display for RequestResolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RequestResolution::Approved(entry) => write!(f, "approved: {entry}"),
            RequestResolution::Rejected(entry) => write!(f, "rejected: {entry}"),
            RequestResolution::AlreadyProcessed {
                transaction_id,
                status,
            } => write!(f, "request {transaction_id} already {status}"),
        }
    }
}

/// The request lifecycle.
///
/// For a request entry `from_username` is the payer and `to_username` the
/// requester. Only the payer may approve or reject; only the requester may
/// cancel.
#[derive(Debug, Clone)]
pub struct RequestWorkflow<A, E> {
    mutator: BalanceMutator<A>,
    entries: E,
    compensation: RetryPolicy,
}

impl<A: AccountStore, E: EntryStore> RequestWorkflow<A, E> {
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

    #[instrument(skip_all, fields(requester = %requester, payer = %payer, amount = %amount), err)]
    pub async fn raise_request(
        &self,
        requester: &Username,
        payer: &Username,
        amount: Amount,
    ) -> DomainResult<LedgerEntry> {
        self.mutator.account(payer).await?;

        let entry = LedgerEntry::new(
            EntryKind::Request,
            payer.clone(),
            requester.clone(),
            amount,
            Utc::now(),
        );
        self.entries.create(entry.clone()).await?;
        tracing::info!(transaction_id = %entry.transaction_id, "request raised");
        Ok(entry)
    }

    /// Pay a pending request.
    ///
    /// The status update is versioned against the entry as read at the start
    /// of the call. If another call resolved the entry in between, the money
    /// legs already applied by this call are reversed and `AlreadyProcessed`
    /// is returned, so a request never pays out twice.
    #[instrument(skip_all, fields(acting = %acting, transaction_id = %transaction_id), err)]
    pub async fn approve(
        &self,
        acting: &Username,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        let entry = self.load_request(transaction_id).await?;
        if acting != &entry.from_username {
            return Err(DomainError::not_authorized(format!(
                "only '{}' can approve request {transaction_id}",
                entry.from_username
            )));
        }
        if entry.status.is_terminal() {
            return Ok(RequestResolution::already(&entry));
        }

        let payer = &entry.from_username;
        let requester = &entry.to_username;
        let amount = entry.amount;

        let balance = self.mutator.balance(payer).await?;
        if balance < amount.value() {
            return Err(DomainError::InsufficientFunds {
                available: balance,
                requested: amount.value(),
            });
        }

        self.mutator.adjust(payer, amount.debit()).await?;
        if let Err(err) = self.mutator.adjust(requester, amount.credit()).await {
            self.mutator
                .compensate(payer, amount.credit(), &self.compensation, &err)
                .await?;
            return Err(err);
        }

        let expected = ExpectedVersion::exact(entry.version);
        match self
            .entries
            .update_status(transaction_id, expected, EntryStatus::Approved, Utc::now())
            .await
        {
            Ok(approved) => {
                tracing::info!("request approved");
                Ok(RequestResolution::Approved(approved))
            }
            Err(err) => {
                let err = DomainError::from(err);
                self.mutator
                    .compensate(requester, amount.debit(), &self.compensation, &err)
                    .await?;
                self.mutator
                    .compensate(payer, amount.credit(), &self.compensation, &err)
                    .await?;
                if !err.is_conflict() {
                    return Err(err);
                }
                let current = self.load_request(transaction_id).await?;
                tracing::info!(status = %current.status, "request resolved concurrently");
                Ok(RequestResolution::already(&current))
            }
        }
    }

    /// Decline a pending request as its payer. No balance changes.
    #[instrument(skip_all, fields(acting = %acting, transaction_id = %transaction_id), err)]
    pub async fn reject(
        &self,
        acting: &Username,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        let entry = self.load_request(transaction_id).await?;
        if acting != &entry.from_username {
            return Err(DomainError::not_authorized(format!(
                "only '{}' can reject request {transaction_id}",
                entry.from_username
            )));
        }
        if entry.status.is_terminal() {
            return Ok(RequestResolution::already(&entry));
        }
        self.close(&entry).await
    }

    /// Withdraw a pending request as its requester.
    #[instrument(skip_all, fields(acting = %acting, transaction_id = %transaction_id), err)]
    pub async fn cancel(
        &self,
        acting: &Username,
        transaction_id: TransactionId,
    ) -> DomainResult<RequestResolution> {
        let entry = self.load_request(transaction_id).await?;
        if acting != &entry.to_username {
            return Err(DomainError::not_authorized(format!(
                "only '{}' can cancel request {transaction_id}",
                entry.to_username
            )));
        }
        if entry.status.is_terminal() {
            return Ok(RequestResolution::already(&entry));
        }
        self.close(&entry).await
    }

    /// Pending requests `payer` is expected to pay, newest first.
    pub async fn list_pending(&self, payer: &Username) -> DomainResult<Vec<LedgerEntry>> {
        Ok(self.entries.list_pending_for_payer(payer).await?)
    }

    /// Point lookup of any entry.
    pub async fn entry(&self, transaction_id: TransactionId) -> DomainResult<LedgerEntry> {
        self.entries
            .get(transaction_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("transaction {transaction_id}")))
    }

    async fn load_request(&self, transaction_id: TransactionId) -> DomainResult<LedgerEntry> {
        let entry = self.entry(transaction_id).await?;
        if entry.kind != EntryKind::Request {
            return Err(DomainError::not_found(format!("request {transaction_id}")));
        }
        Ok(entry)
    }

    async fn close(&self, entry: &LedgerEntry) -> DomainResult<RequestResolution> {
        let expected = ExpectedVersion::exact(entry.version);
        match self
            .entries
            .update_status(entry.transaction_id, expected, EntryStatus::Rejected, Utc::now())
            .await
        {
            Ok(rejected) => {
                tracing::info!("request rejected");
                Ok(RequestResolution::Rejected(rejected))
            }
            Err(err) => {
                let err = DomainError::from(err);
                if !err.is_conflict() {
                    return Err(err);
                }
                let current = self.load_request(entry.transaction_id).await?;
                Ok(RequestResolution::already(&current))
            }
        }
    }
}
