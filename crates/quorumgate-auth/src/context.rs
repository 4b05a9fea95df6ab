//! The identity the gateway core reasons about once a request has been authenticated.
//!
//! Modeled after the teacher's `AuthenticatedIdentity`/`AuthResult` shape, trimmed to
//! the fields the core actually branches on: the owning account, whether the caller
//! is a subuser of that account (MPU-create and MPU-abort both forbid subusers per
//! §4.6), and an opaque identity label for logging.

use serde::{Deserialize, Serialize};

/// The authenticated caller of a request, extracted by the authorizer before the
/// request reaches any pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// The account that owns the resource being addressed (the `:account` path segment).
    pub owner: String,
    /// `true` if the caller authenticated as a subuser rather than the account itself.
    pub is_subuser: bool,
    /// `true` if the caller holds operator privileges, entitling placement to the
    /// higher `max_operator_utilization_pct` ceiling (§4.1).
    pub is_operator: bool,
    /// Opaque caller identity, used only for logging and metrics labels.
    pub principal: String,
}

impl AuthContext {
    #[must_use]
    pub fn account_owner(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            principal: owner.clone(),
            owner,
            is_subuser: false,
            is_operator: false,
        }
    }

    #[must_use]
    pub fn subuser(owner: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            is_subuser: true,
            is_operator: false,
            principal: principal.into(),
        }
    }

    #[must_use]
    pub fn with_operator(mut self, is_operator: bool) -> Self {
        self.is_operator = is_operator;
        self
    }
}
