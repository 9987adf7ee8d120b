use sqlx::PgPool;
use tracing::instrument;

/// Statements are idempotent; run them on every start.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        username      TEXT PRIMARY KEY CHECK (username ~ '^[A-Za-z0-9_]+$'),
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL CHECK (role IN ('User', 'Teller', 'Admin')),
        balance       NUMERIC(20, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
        version       BIGINT NOT NULL DEFAULT 0 CHECK (version >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        transaction_id UUID PRIMARY KEY,
        from_username  TEXT NOT NULL,
        to_username    TEXT NOT NULL,
        amount         NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
        kind           TEXT NOT NULL CHECK (kind IN ('send', 'request', 'deposit', 'withdrawal')),
        status         TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
        version        BIGINT NOT NULL DEFAULT 0 CHECK (version >= 0),
        recorded_at    TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_from_status_idx
        ON ledger_entries (from_username, status)
    "#,
];

/// Create the ledger tables and indexes if they do not exist.
#[instrument(skip_all, err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "ledger schema ensured");
    Ok(())
}
