//! `alphabank-auth`: pure authorization boundary for ledger callers.
//!
//! This crate is intentionally decoupled from the session protocol and storage.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{
    AuthorizationExplanation, AuthzError, authorize, explain_authorization, has_permission,
};
pub use permissions::{Permission, permissions_for};
pub use principal::Caller;
pub use roles::Role;
