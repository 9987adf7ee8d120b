use serde::Serialize;
use thiserror::Error;

use alphabank_core::DomainError;

use crate::{Caller, Permission, Role, permissions_for};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: String },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::NotAuthorized(value.to_string())
    }
}

/// Authorize a caller for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(caller: &Caller, required: &Permission) -> Result<(), AuthzError> {
    if permissions_for(caller.role).contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: caller.role,
            permission: required.as_str().to_string(),
        })
    }
}

/// Whether the caller holds a permission (no error construction).
pub fn has_permission(caller: &Caller, required: &Permission) -> bool {
    permissions_for(caller.role).contains(required)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Denied attempts are logged with this attached so an operator can see who
/// tried what without replaying the session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub caller: String,
    pub role: Role,
    pub required_permission: String,
    pub granted: bool,
    pub effective_permissions: Vec<String>,
    /// Lowest role that would have been granted, if any.
    pub minimum_role: Option<Role>,
}

pub fn explain_authorization(caller: &Caller, required: &Permission) -> AuthorizationExplanation {
    let effective: Vec<String> = permissions_for(caller.role)
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();

    let minimum_role = Role::ALL
        .into_iter()
        .find(|r| permissions_for(*r).contains(required));

    AuthorizationExplanation {
        caller: caller.username.to_string(),
        role: caller.role,
        required_permission: required.as_str().to_string(),
        granted: has_permission(caller, required),
        effective_permissions: effective,
        minimum_role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphabank_core::Username;

    fn caller(role: Role) -> Caller {
        Caller::new(Username::parse("u1").unwrap(), role)
    }

    #[test]
    fn users_may_transfer_but_not_handle_cash() {
        let user = caller(Role::User);
        assert!(authorize(&user, &Permission::TRANSFER).is_ok());
        assert_eq!(
            authorize(&user, &Permission::CASH),
            Err(AuthzError::Forbidden {
                role: Role::User,
                permission: "ledger.cash".to_string(),
            })
        );
    }

    #[test]
    fn forbidden_maps_to_not_authorized() {
        let err: DomainError = authorize(&caller(Role::Teller), &Permission::ROLES)
            .unwrap_err()
            .into();
        assert!(matches!(err, DomainError::NotAuthorized(_)));
    }

    #[test]
    fn explanation_names_the_minimum_role() {
        let explanation = explain_authorization(&caller(Role::User), &Permission::CASH);
        assert!(!explanation.granted);
        assert_eq!(explanation.minimum_role, Some(Role::Teller));

        let json = serde_json::to_value(&explanation).unwrap();
        assert_eq!(json["required_permission"], "ledger.cash");
        assert_eq!(json["role"], "User");
    }
}
