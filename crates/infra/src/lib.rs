//! Infrastructure layer: configuration and Postgres-backed stores.

pub mod config;
pub mod postgres;

pub use config::{ConfigError, LedgerConfig};
pub use postgres::{PostgresAccountStore, PostgresEntryStore, connect, ensure_schema};
