//! Authorizer error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed authorization credentials")]
    MissingCredentials,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("subusers are not permitted on this resource")]
    SubuserForbidden,

    #[error("identity service error: {0}")]
    Internal(String),
}
