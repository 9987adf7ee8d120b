use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "ledger.transfer") so that
/// the policy table stays readable in logs and audit output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// Send money to another account.
    pub const TRANSFER: Permission = Permission::from_static("ledger.transfer");
    /// Raise, approve, reject and cancel money requests.
    pub const REQUEST: Permission = Permission::from_static("ledger.request");
    /// Deposit and withdraw cash on behalf of an account.
    pub const CASH: Permission = Permission::from_static("ledger.cash");
    /// Look up any ledger entry, not only ones the caller is party to.
    pub const ENTRIES_ANY: Permission = Permission::from_static("ledger.entries.any");
    /// Read the caller's own balance.
    pub const BALANCE_OWN: Permission = Permission::from_static("accounts.balance.own");
    /// Read any account's balance.
    pub const BALANCE_ANY: Permission = Permission::from_static("accounts.balance.any");
    /// Create new accounts.
    pub const ENROLL: Permission = Permission::from_static("accounts.enroll");
    /// Change another account's role.
    pub const ROLES: Permission = Permission::from_static("accounts.roles");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::TRANSFER,
    Permission::REQUEST,
    Permission::BALANCE_OWN,
];

const TELLER_PERMISSIONS: &[Permission] = &[
    Permission::TRANSFER,
    Permission::REQUEST,
    Permission::BALANCE_OWN,
    Permission::CASH,
    Permission::BALANCE_ANY,
    Permission::ENTRIES_ANY,
    Permission::ENROLL,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::TRANSFER,
    Permission::REQUEST,
    Permission::BALANCE_OWN,
    Permission::CASH,
    Permission::BALANCE_ANY,
    Permission::ENTRIES_ANY,
    Permission::ENROLL,
    Permission::ROLES,
];

/// Static role → permission policy.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::User => USER_PERMISSIONS,
        Role::Teller => TELLER_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
    }
}
