//! QuorumGate Auth - authorizer reference interface
//!
//! Per-request authentication/authorization is an external collaborator: the core
//! only ever calls through the [`Authorizer`] trait boundary, never reimplements
//! signature verification or policy evaluation. This crate exists so the gateway
//! binary has something concrete to construct and inject, and so handlers have a
//! real `AuthContext` to branch on (`authorize against the top-level uploads
//! resource`, `disallow sub-users`, per §4.6).

pub mod context;
pub mod error;

pub use context::AuthContext;
pub use error::AuthError;

/// The boundary the gateway core depends on for authentication and authorization.
///
/// Implementations own credential verification and policy evaluation entirely;
/// the core never inspects a signature or a policy document itself.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    /// Authenticates the caller of a request against `account` (the `:account`
    /// path segment) and returns the resulting [`AuthContext`].
    ///
    /// # Errors
    /// Returns [`AuthError::MissingCredentials`] or [`AuthError::AccessDenied`]
    /// when the request does not carry a usable, authorized identity.
    async fn authorize(&self, account: &str, raw_authorization: Option<&str>) -> Result<AuthContext, AuthError>;
}

/// An authorizer that accepts every request as the account owner.
///
/// Used in tests and in the gateway's `--no-auth` development mode; never wired
/// up against a real deployment; see §10.5.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuthorizer;

#[async_trait::async_trait]
impl Authorizer for NoopAuthorizer {
    async fn authorize(&self, account: &str, _raw_authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        Ok(AuthContext::account_owner(account))
    }
}
