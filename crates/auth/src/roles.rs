use core::str::FromStr;

use serde::{Deserialize, Serialize};

use alphabank_core::DomainError;

/// Role held by an account.
///
/// Ordered by privilege: `User < Teller < Admin`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    User,
    Teller,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Teller, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Teller => "Teller",
            Role::Admin => "Admin",
        }
    }

    /// Roles this role may be moved to directly.
    ///
    /// A role can only move one step at a time; Teller is the only role that
    /// can move in both directions.
    pub fn allowed_transitions(&self) -> &'static [Role] {
        match self {
            Role::User => &[Role::Teller],
            Role::Teller => &[Role::User, Role::Admin],
            Role::Admin => &[Role::Teller],
        }
    }

    pub fn can_transition_to(&self, next: Role) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Next role up, if any.
    pub fn promoted(&self) -> Option<Role> {
        match self {
            Role::User => Some(Role::Teller),
            Role::Teller => Some(Role::Admin),
            Role::Admin => None,
        }
    }

    /// Next role down, if any.
    pub fn demoted(&self) -> Option<Role> {
        match self {
            Role::Admin => Some(Role::Teller),
            Role::Teller => Some(Role::User),
            Role::User => None,
        }
    }

    /// Privilege escalation guard: an actor may only grant roles at or below
    /// their own.
    pub fn can_grant(&self, granted: Role) -> bool {
        granted <= *self
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::InvalidRoleTransition(format!("unknown role '{s}'")))
    }
}
