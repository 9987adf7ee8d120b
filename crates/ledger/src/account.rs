use serde::{Deserialize, Serialize};

use alphabank_auth::Role;
use alphabank_core::{Decimal, Username};

/// A principal's balance record.
///
/// `balance` and `version` only change through a versioned compare-and-swap
/// on the account store; nothing in this crate writes them directly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: Username,
    /// Opaque credential owned by the authentication layer.
    pub password_hash: String,
    pub role: Role,
    pub balance: Decimal,
    pub version: u64,
}

impl Account {
    /// A freshly enrolled account: zero balance, version 0.
    pub fn enrolled(username: Username, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            username,
            password_hash: password_hash.into(),
            role,
            balance: Decimal::ZERO,
            version: 0,
        }
    }
}

// Keeps credentials out of logs.
impl core::fmt::Debug for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("balance", &self.balance)
            .field("version", &self.version)
            .finish()
    }
}

/// Result of a successful balance compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub username: Username,
    pub new_balance: Decimal,
    pub new_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrolled_accounts_start_empty() {
        let account = Account::enrolled(Username::parse("u1").unwrap(), "$2b$10$hash", Role::User);
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.version, 0);
    }

    #[test]
    fn debug_output_redacts_the_hash() {
        let account = Account::enrolled(Username::parse("u1").unwrap(), "secret-hash", Role::User);
        let rendered = format!("{account:?}");
        assert!(!rendered.contains("secret-hash"));
        assert!(rendered.contains("<redacted>"));
    }
}
