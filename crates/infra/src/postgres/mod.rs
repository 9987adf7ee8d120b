//! Postgres-backed account and ledger entry stores.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` | Duplicate username or transaction id |
//! | Database (check violation) | `23514` | `Backend` | Row violates a schema check (should not occur; updates are guarded) |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! Version races never surface as database errors: every compare-and-swap is a
//! guarded `UPDATE ... WHERE version = $n`, and a zero-row result is classified
//! by re-reading the row.

pub mod accounts;
pub mod entries;
pub mod schema;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use alphabank_ledger::StoreError;

use crate::config::LedgerConfig;

pub use accounts::PostgresAccountStore;
pub use entries::PostgresEntryStore;
pub use schema::ensure_schema;

/// Open a connection pool sized from configuration.
pub async fn connect(config: &LedgerConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::AlreadyExists(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Stored versions are `BIGINT`.
pub(crate) fn version_to_db(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Backend(format!("version {version} out of range")))
}

pub(crate) fn version_from_db(version: i64) -> Result<u64, StoreError> {
    u64::try_from(version).map_err(|_| StoreError::Backend(format!("negative stored version {version}")))
}
