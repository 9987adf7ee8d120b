use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use alphabank_auth::Role;
use alphabank_core::{Decimal, ExpectedVersion, Username};
use alphabank_ledger::{Account, AccountStore, BalanceUpdate, StoreError};

use super::{is_unique_violation, map_sqlx_error, version_from_db, version_to_db};

/// Postgres-backed account store.
///
/// ## Optimistic Concurrency
///
/// `compare_and_swap_balance` is a single guarded statement:
///
/// ```sql
/// UPDATE accounts
///    SET balance = balance + $delta, version = version + 1
///  WHERE username = $u AND version = $expected AND balance + $delta >= 0
/// ```
///
/// Postgres row locking makes the version and funds checks atomic with the
/// write. When no row is updated the account is re-read to report which guard
/// failed; the version guard is reported first.
#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: Arc<PgPool>,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn current(&self, username: &Username) -> Result<(Decimal, u64), StoreError> {
        let row = sqlx::query("SELECT balance, version FROM accounts WHERE username = $1")
            .bind(username.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("reread_account", e))?
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;
        let balance: Decimal = row
            .try_get("balance")
            .map_err(|e| map_sqlx_error("reread_account", e))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("reread_account", e))?;
        Ok((balance, version_from_db(version)?))
    }

    async fn classify_missed_update(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Option<Decimal>,
    ) -> StoreError {
        let (balance, actual) = match self.current(username).await {
            Ok(current) => current,
            Err(err) => return err,
        };
        if !expected.matches(actual) {
            return StoreError::Conflict {
                expected: expected.get(),
                actual,
            };
        }
        match delta {
            Some(delta) if balance + delta < Decimal::ZERO => StoreError::WouldGoNegative { balance, delta },
            // Guards passed on re-read, so the row moved under us: report a race.
            _ => StoreError::Conflict {
                expected: expected.get(),
                actual,
            },
        }
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    #[instrument(skip_all, fields(username = %username), err)]
    async fn get(&self, username: &Username) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT username, password_hash, role, balance, version
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;

        row.map(|row| {
            AccountRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to decode account row: {e}")))?
                .try_into()
        })
        .transpose()
    }

    #[instrument(skip_all, fields(username = %account.username), err)]
    async fn create(&self, account: Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, role, balance, version)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.username.as_str())
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.balance)
        .bind(version_to_db(account.version)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists(account.username.to_string())
            } else {
                map_sqlx_error("create_account", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip_all, fields(username = %username, expected = %expected, delta = %delta), err)]
    async fn compare_and_swap_balance(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        delta: Decimal,
    ) -> Result<BalanceUpdate, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
               SET balance = balance + $3, version = version + 1
             WHERE username = $1 AND version = $2 AND balance + $3 >= 0
            RETURNING balance, version
            "#,
        )
        .bind(username.as_str())
        .bind(version_to_db(expected.get())?)
        .bind(delta)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("compare_and_swap_balance", e))?;

        let Some(row) = row else {
            return Err(self.classify_missed_update(username, expected, Some(delta)).await);
        };
        let new_balance: Decimal = row
            .try_get("balance")
            .map_err(|e| map_sqlx_error("compare_and_swap_balance", e))?;
        let new_version: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("compare_and_swap_balance", e))?;

        Ok(BalanceUpdate {
            username: username.clone(),
            new_balance,
            new_version: version_from_db(new_version)?,
        })
    }

    #[instrument(skip_all, fields(username = %username, expected = %expected, role = %role), err)]
    async fn compare_and_swap_role(
        &self,
        username: &Username,
        expected: ExpectedVersion,
        role: Role,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
               SET role = $3, version = version + 1
             WHERE username = $1 AND version = $2
            RETURNING username, password_hash, role, balance, version
            "#,
        )
        .bind(username.as_str())
        .bind(version_to_db(expected.get())?)
        .bind(role.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("compare_and_swap_role", e))?;

        match row {
            Some(row) => AccountRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to decode account row: {e}")))?
                .try_into(),
            None => Err(self.classify_missed_update(username, expected, None).await),
        }
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    username: String,
    password_hash: String,
    role: String,
    balance: Decimal,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AccountRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            balance: row.try_get("balance")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            username: Username::parse(row.username)
                .map_err(|e| StoreError::Backend(format!("stored username: {e}")))?,
            password_hash: row.password_hash,
            role: Role::from_str(&row.role)
                .map_err(|e| StoreError::Backend(format!("stored role: {e}")))?,
            balance: row.balance,
            version: version_from_db(row.version)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(username: &str, role: &str, version: i64) -> AccountRow {
        AccountRow {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: role.to_string(),
            balance: Decimal::new(1050, 2),
            version,
        }
    }

    #[test]
    fn rows_decode_into_accounts() {
        let account = Account::try_from(row("alice", "Teller", 3)).unwrap();
        assert_eq!(account.username.as_str(), "alice");
        assert_eq!(account.role, Role::Teller);
        assert_eq!(account.balance, Decimal::new(1050, 2));
        assert_eq!(account.version, 3);
    }

    #[test]
    fn corrupt_rows_are_backend_errors() {
        assert!(matches!(Account::try_from(row("alice", "Root", 0)), Err(StoreError::Backend(_))));
        assert!(matches!(Account::try_from(row("a b", "User", 0)), Err(StoreError::Backend(_))));
        assert!(matches!(Account::try_from(row("alice", "User", -1)), Err(StoreError::Backend(_))));
    }
}
