use serde::{Deserialize, Serialize};

use alphabank_core::Username;

use crate::Role;

/// Identity of the caller of a ledger operation.
///
/// Supplied by the session layer after login and trusted as-is: this crate
/// never re-verifies credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    pub username: Username,
    pub role: Role,
}

impl Caller {
    pub fn new(username: Username, role: Role) -> Self {
        Self { username, role }
    }

    pub fn is(&self, username: &Username) -> bool {
        &self.username == username
    }
}

impl core::fmt::Display for Caller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.username, self.role)
    }
}
