use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use alphabank_core::{Amount, Decimal, ExpectedVersion, TransactionId, Username};
use alphabank_ledger::{EntryKind, EntryStatus, EntryStore, LedgerEntry, StoreError};

use super::{is_unique_violation, map_sqlx_error, version_from_db, version_to_db};

const ENTRY_COLUMNS: &str =
    "transaction_id, from_username, to_username, amount, kind, status, version, recorded_at";

/// Postgres-backed ledger entry store.
///
/// Status transitions are guarded on both the entry version and
/// `status = 'pending'`, so the pending → approved/rejected state machine holds
/// even against writers that bypass this crate's checks.
#[derive(Debug, Clone)]
pub struct PostgresEntryStore {
    pool: Arc<PgPool>,
}

impl PostgresEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn fetch(&self, operation: &str, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE transaction_id = $1");
        let row = sqlx::query(&sql)
            .bind(transaction_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|row| decode(&row)).transpose()
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    EntryRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to decode entry row: {e}")))?
        .try_into()
}

#[async_trait]
impl EntryStore for PostgresEntryStore {
    #[instrument(skip_all, fields(transaction_id = %entry.transaction_id, kind = %entry.kind), err)]
    async fn create(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO ledger_entries ({ENTRY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        sqlx::query(&sql)
            .bind(entry.transaction_id.as_uuid())
            .bind(entry.from_username.as_str())
            .bind(entry.to_username.as_str())
            .bind(entry.amount.value())
            .bind(entry.kind.as_str())
            .bind(entry.status.as_str())
            .bind(version_to_db(entry.version)?)
            .bind(entry.timestamp)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyExists(entry.transaction_id.to_string())
                } else {
                    map_sqlx_error("create_entry", e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip_all, fields(transaction_id = %transaction_id), err)]
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        self.fetch("get_entry", transaction_id).await
    }

    #[instrument(skip_all, fields(transaction_id = %transaction_id, expected = %expected, status = %status), err)]
    async fn update_status(
        &self,
        transaction_id: TransactionId,
        expected: ExpectedVersion,
        status: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        if !EntryStatus::Pending.can_transition_to(status) {
            return Err(StoreError::InvalidTransition(format!("pending -> {status}")));
        }

        let sql = format!(
            r#"
            UPDATE ledger_entries
               SET status = $3, version = version + 1, recorded_at = $4
             WHERE transaction_id = $1 AND version = $2 AND status = 'pending'
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(transaction_id.as_uuid())
            .bind(version_to_db(expected.get())?)
            .bind(status.as_str())
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_status", e))?;

        if let Some(row) = row {
            return decode(&row);
        }

        let current = self
            .fetch("reread_entry", transaction_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))?;
        if !expected.matches(current.version) {
            return Err(StoreError::Conflict {
                expected: expected.get(),
                actual: current.version,
            });
        }
        Err(StoreError::InvalidTransition(format!("{} -> {status}", current.status)))
    }

    #[instrument(skip_all, fields(payer = %payer), err)]
    async fn list_pending_for_payer(&self, payer: &Username) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE from_username = $1 AND kind = 'request' AND status = 'pending'
            ORDER BY recorded_at DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(payer.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_pending_for_payer", e))?;

        rows.iter().map(decode).collect()
    }
}

// SQLx row types

#[derive(Debug)]
struct EntryRow {
    transaction_id: uuid::Uuid,
    from_username: String,
    to_username: String,
    amount: Decimal,
    kind: String,
    status: String,
    version: i64,
    recorded_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for EntryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            transaction_id: row.try_get("transaction_id")?,
            from_username: row.try_get("from_username")?,
            to_username: row.try_get("to_username")?,
            amount: row.try_get("amount")?,
            kind: row.try_get("kind")?,
            status: row.try_get("status")?,
            version: row.try_get("version")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, detail: String| StoreError::Backend(format!("stored {what}: {detail}"));
        Ok(LedgerEntry {
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            from_username: Username::parse(row.from_username).map_err(|e| corrupt("from_username", e.to_string()))?,
            to_username: Username::parse(row.to_username).map_err(|e| corrupt("to_username", e.to_string()))?,
            amount: Amount::new(row.amount).map_err(|e| corrupt("amount", e.to_string()))?,
            kind: EntryKind::parse(&row.kind).ok_or_else(|| corrupt("kind", row.kind.clone()))?,
            status: EntryStatus::parse(&row.status).ok_or_else(|| corrupt("status", row.status.clone()))?,
            version: version_from_db(row.version)?,
            timestamp: row.recorded_at,
        })
    }
}
