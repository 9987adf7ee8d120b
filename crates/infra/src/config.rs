//! Configuration loaded from the environment.
//!
//! A `.env` file in the working directory is read first if present; real
//! environment variables win over it.
//!
//! | variable                     | default | meaning                                  |
//! |------------------------------|---------|------------------------------------------|
//! | `DATABASE_URL`               |         | Postgres connection string (required)    |
//! | `DATABASE_MAX_CONNECTIONS`   | `10`    | pool size                                |
//! | `LEDGER_CONFLICT_RETRIES`    | `1`     | attempts per money-moving operation      |
//! | `LEDGER_RETRY_BASE_DELAY_MS` | `25`    | first backoff delay                      |
//! | `LEDGER_RETRY_MAX_DELAY_MS`  | `500`   | backoff cap                              |
//! | `LOG_FILTER`                 | `info`  | tracing filter directive                 |

use std::env;
use std::str::FromStr;

use thiserror::Error;

use alphabank_ledger::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub conflict_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub log_filter: String,
}

// The database URL usually carries a password.
impl core::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("database_url", &"<redacted>")
            .field("database_max_connections", &self.database_max_connections)
            .field("conflict_retries", &self.conflict_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests, embedded callers).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let database_max_connections = parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let conflict_retries = parsed(&lookup, "LEDGER_CONFLICT_RETRIES", 1)?;
        let retry_base_delay_ms = parsed(&lookup, "LEDGER_RETRY_BASE_DELAY_MS", 25)?;
        let retry_max_delay_ms = parsed(&lookup, "LEDGER_RETRY_MAX_DELAY_MS", 500)?;
        let log_filter = lookup("LOG_FILTER").unwrap_or_else(|| "info".to_string());

        if database_max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_MAX_CONNECTIONS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if conflict_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LEDGER_CONFLICT_RETRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            database_max_connections,
            conflict_retries,
            retry_base_delay_ms,
            retry_max_delay_ms,
            log_filter,
        })
    }

    /// Conflict-retry policy for the [`alphabank_ledger::Bank`] façade.
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.conflict_retries <= 1 {
            return RetryPolicy::fail_fast();
        }
        RetryPolicy::new(
            self.conflict_retries,
            self.retry_base_delay_ms,
            self.retry_max_delay_ms,
            0.2,
        )
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
