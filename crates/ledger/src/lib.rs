//! `alphabank-ledger`: accounts, ledger entries and the money-moving engines.
//!
//! Everything here is written against the [`AccountStore`] / [`EntryStore`]
//! traits; storage backends live in `alphabank-infra`.

pub mod account;
pub mod administration;
pub mod bank;
pub mod cash;
pub mod entry;
pub mod mutator;
pub mod requests;
pub mod retry;
pub mod store;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use account::{Account, BalanceUpdate};
pub use administration::AccountAdministration;
pub use bank::Bank;
pub use cash::CashDesk;
pub use entry::{EntryKind, EntryStatus, LedgerEntry};
pub use mutator::BalanceMutator;
pub use requests::{RequestResolution, RequestWorkflow};
pub use retry::RetryPolicy;
pub use store::{AccountStore, EntryStore, InMemoryAccountStore, InMemoryEntryStore, StoreError};
pub use transfer::TransferEngine;
