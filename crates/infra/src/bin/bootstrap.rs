//! Prepare a database for the ledger: create the schema and seed the first
//! Admin account.
//!
//! Reads `ALPHABANK_ADMIN_USERNAME` and `ALPHABANK_ADMIN_PASSWORD_HASH` in
//! addition to the regular ledger configuration. The hash is stored as given.

use std::sync::Arc;

use anyhow::Context;

use alphabank_core::Username;
use alphabank_infra::{LedgerConfig, PostgresAccountStore, PostgresEntryStore, connect, ensure_schema};
use alphabank_ledger::Bank;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env().context("loading configuration")?;
    alphabank_observability::init_with_filter(&config.log_filter);

    let pool = connect(&config).await.context("connecting to Postgres")?;
    ensure_schema(&pool).await.context("creating ledger schema")?;

    let bank = Bank::new(
        Arc::new(PostgresAccountStore::new(pool.clone())),
        Arc::new(PostgresEntryStore::new(pool)),
    )
    .with_retry_policy(config.retry_policy());

    let username = std::env::var("ALPHABANK_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let username = Username::parse(username).context("ALPHABANK_ADMIN_USERNAME")?;
    let Ok(password_hash) = std::env::var("ALPHABANK_ADMIN_PASSWORD_HASH") else {
        tracing::warn!("ALPHABANK_ADMIN_PASSWORD_HASH not set; skipping admin seeding");
        return Ok(());
    };

    if bank.seed_admin(username.clone(), password_hash).await? {
        tracing::info!(username = %username, "admin account created");
    } else {
        tracing::info!(username = %username, "admin account already present");
    }
    Ok(())
}
