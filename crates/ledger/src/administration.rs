//! Account enrollment and role administration.
//!
//! # Invariants
//! - New accounts start with balance 0 and version 0.
//! - Roles move one step at a time along the transition table in
//!   [`Role::allowed_transitions`].
//! - An actor cannot enroll an account above their own role.

use tracing::instrument;

use alphabank_auth::Role;
use alphabank_core::{DomainError, DomainResult, ExpectedVersion, Username};

use crate::account::Account;
use crate::store::{AccountStore, StoreError};

#[derive(Debug, Clone)]
pub struct AccountAdministration<A> {
    accounts: A,
}

impl<A: AccountStore> AccountAdministration<A> {
    pub fn new(accounts: A) -> Self {
        Self { accounts }
    }

    async fn load(&self, username: &Username) -> DomainResult<Account> {
        self.accounts
            .get(username)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("account '{username}'")))
    }

    /// Move `target` to `role`, versioned against the account as just read.
    #[instrument(skip_all, fields(target = %target, role = %role), err)]
    pub async fn change_role(&self, target: &Username, role: Role) -> DomainResult<Account> {
        let account = self.load(target).await?;
        if !account.role.can_transition_to(role) {
            return Err(DomainError::InvalidRoleTransition(format!(
                "'{target}' cannot move from {} to {role}",
                account.role
            )));
        }
        let updated = self
            .accounts
            .compare_and_swap_role(target, ExpectedVersion::exact(account.version), role)
            .await?;
        tracing::info!(from = %account.role, "role changed");
        Ok(updated)
    }

    pub async fn promote(&self, target: &Username) -> DomainResult<Account> {
        let current = self.load(target).await?.role;
        let next = current.promoted().ok_or_else(|| {
            DomainError::InvalidRoleTransition(format!("'{target}' is already {current}"))
        })?;
        self.change_role(target, next).await
    }

    pub async fn demote(&self, target: &Username) -> DomainResult<Account> {
        let current = self.load(target).await?.role;
        let next = current.demoted().ok_or_else(|| {
            DomainError::InvalidRoleTransition(format!("'{target}' is already {current}"))
        })?;
        self.change_role(target, next).await
    }

    /// Create a new account on behalf of an actor holding `granting_role`.
    #[instrument(skip_all, fields(username = %username, role = %role), err)]
    pub async fn enroll(
        &self,
        granting_role: Role,
        username: Username,
        password_hash: impl Into<String>,
        role: Role,
    ) -> DomainResult<Account> {
        if !granting_role.can_grant(role) {
            return Err(DomainError::not_authorized(format!(
                "{granting_role} cannot enroll a {role}"
            )));
        }
        refuse_reserved(&username)?;
        let account = Account::enrolled(username, password_hash, role);
        self.accounts.create(account.clone()).await?;
        tracing::info!("account enrolled");
        Ok(account)
    }

    /// Create the bootstrap Admin account if it does not exist yet.
    ///
    /// Returns whether an account was created. Safe to call on every start.
    pub async fn seed_admin(
        &self,
        username: Username,
        password_hash: impl Into<String>,
    ) -> DomainResult<bool> {
        refuse_reserved(&username)?;
        if self.accounts.get(&username).await?.is_some() {
            return Ok(false);
        }
        let account = Account::enrolled(username.clone(), password_hash, Role::Admin);
        match self.accounts.create(account).await {
            Ok(()) => {
                tracing::info!(username = %username, "admin account seeded");
                Ok(true)
            }
            // Lost a race with another starting instance.
            Err(StoreError::AlreadyExists(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// The cash counterparty name never belongs to a real account.
fn refuse_reserved(username: &Username) -> DomainResult<()> {
    if username.as_str() == alphabank_core::BANK_COUNTERPARTY {
        return Err(DomainError::InvalidUsername(format!("'{username}' is reserved")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAccountStore;
    use crate::testing::{account, user};
    use std::sync::Arc;

    fn admin_of(accounts: impl IntoIterator<Item = Account>) -> AccountAdministration<Arc<InMemoryAccountStore>> {
        AccountAdministration::new(Arc::new(InMemoryAccountStore::with_accounts(accounts)))
    }

    #[tokio::test]
    async fn promotion_walks_up_one_step_and_bumps_version() {
        let admin = admin_of([account("u1", 10, Role::User)]);

        let teller = admin.promote(&user("u1")).await.unwrap();
        assert_eq!(teller.role, Role::Teller);
        assert_eq!(teller.version, 1);
        assert_eq!(teller.balance, alphabank_core::Decimal::new(10, 0));

        let top = admin.promote(&user("u1")).await.unwrap();
        assert_eq!(top.role, Role::Admin);

        let err = admin.promote(&user("u1")).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidRoleTransition(_)));
    }

    #[tokio::test]
    async fn demotion_stops_at_user() {
        let admin = admin_of([account("u1", 0, Role::Teller)]);
        assert_eq!(admin.demote(&user("u1")).await.unwrap().role, Role::User);
        let err = admin.demote(&user("u1")).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidRoleTransition(_)));
    }

    #[tokio::test]
    async fn skipping_a_step_is_refused() {
        let admin = admin_of([account("u1", 0, Role::User)]);
        let err = admin.change_role(&user("u1"), Role::Admin).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidRoleTransition(_)));
    }

    #[tokio::test]
    async fn enrollment_refuses_privilege_escalation() {
        let admin = admin_of([]);
        let err = admin
            .enroll(Role::Teller, user("boss"), "hash", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized(_)));

        let created = admin
            .enroll(Role::Teller, user("clerk"), "hash", Role::Teller)
            .await
            .unwrap();
        assert_eq!((created.balance, created.version), (alphabank_core::Decimal::ZERO, 0));
    }

    #[tokio::test]
    async fn duplicate_and_reserved_usernames_are_refused() {
        let admin = admin_of([account("u1", 0, Role::User)]);
        let err = admin.enroll(Role::Admin, user("u1"), "hash", Role::User).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists(_)));

        let err = admin.enroll(Role::Admin, Username::bank(), "hash", Role::User).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidUsername(_)));
    }

    #[tokio::test]
    async fn seeding_the_admin_is_idempotent() {
        let admin = admin_of([]);
        assert!(admin.seed_admin(user("root"), "hash").await.unwrap());
        assert!(!admin.seed_admin(user("root"), "other").await.unwrap());

        let root = admin.load(&user("root")).await.unwrap();
        assert_eq!(root.role, Role::Admin);
        assert_eq!(root.password_hash, "hash");
    }

    #[tokio::test]
    async fn seeding_refuses_the_cash_counterparty_name() {
        let admin = admin_of([]);
        let err = admin.seed_admin(Username::bank(), "hash").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidUsername(_)));
        assert!(admin.accounts.get(&Username::bank()).await.unwrap().is_none());
    }
}
