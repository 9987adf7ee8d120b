//! Versioned storage boundary for accounts and ledger entries.
//!
//! The traits make no storage assumptions: the in-memory stores back tests and
//! dev, and the Postgres stores in `alphabank-infra` back production.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryAccountStore, InMemoryEntryStore};
pub use r#trait::{AccountStore, EntryStore, StoreError};
