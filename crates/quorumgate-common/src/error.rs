//! The gateway core's error taxonomy.
//!
//! One variant per error kind the request-handling core can surface,
//! plus a handful of internal/adapter variants that wrap lower-level
//! failures before they reach a handler.

use thiserror::Error;

/// Result type used throughout the gateway core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("parent directory has reached its entry limit")]
    DirectoryLimit,

    #[error("invalid durability level: {copies} (must be in [{min}, {max}])")]
    InvalidDurabilityLevel { copies: u32, min: u32, max: u32 },

    #[error("content length {size} exceeds the maximum of {max}")]
    MaxContentLength { size: u64, max: u64 },

    #[error("checksum mismatch: computed {computed}, client supplied {supplied}")]
    ChecksumMismatch { computed: String, supplied: String },

    #[error("concurrent request: etag mismatch on write")]
    ConcurrentRequest,

    #[error("no replica candidate set could be used")]
    SharksExhausted,

    #[error("finalize conflict: {0}")]
    FinalizeConflict(String),

    #[error("illegal multipart upload state transition: {0}")]
    StateError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no capacity for placement: have {available} usable nodes, need {required}")]
    NotEnoughSpace { available: usize, required: usize },

    #[error("metadata shard unavailable: {0}")]
    ShardUnavailable(String),

    #[error("internal error: {invariant}")]
    Internal { invariant: String },

    #[error("request to storage node failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metadata store error: {0}")]
    MetaStore(String),
}

impl Error {
    #[must_use]
    pub fn internal(invariant: impl Into<String>) -> Self {
        Self::Internal {
            invariant: invariant.into(),
        }
    }

    /// Whether a caller may legitimately retry this error as-is (not applicable
    /// to `ConcurrentRequest`/`EtagMismatch`-style conflicts, which must not be
    /// retried per the propagation policy).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ShardUnavailable(_) | Self::Transport(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }

    /// HTTP status code per the error-kind table.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_)
            | Self::DirectoryLimit
            | Self::InvalidDurabilityLevel { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidArgument(_) => 400,

            Self::PreconditionFailed(_) | Self::ConcurrentRequest => 412,

            Self::ResourceNotFound(_) => 404,

            Self::NotAcceptable(_) => 406,

            Self::MaxContentLength { .. } => 413,

            Self::FinalizeConflict(_) => 409,

            Self::StateError(_) => 409,

            Self::SharksExhausted | Self::ShardUnavailable(_) => 503,

            Self::NotEnoughSpace { .. } => 503,

            Self::Internal { .. } | Self::Transport(_) | Self::MetaStore(_) => 500,
        }
    }

    /// Stable machine-readable error code, independent of the HTTP status.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::ResourceNotFound(_) => "ResourceNotFound",
            Self::NotAcceptable(_) => "NotAcceptable",
            Self::DirectoryLimit => "DirectoryLimit",
            Self::InvalidDurabilityLevel { .. } => "InvalidDurabilityLevel",
            Self::MaxContentLength { .. } => "MaxContentLength",
            Self::ChecksumMismatch { .. } => "ChecksumMismatch",
            Self::ConcurrentRequest => "ConcurrentRequest",
            Self::SharksExhausted => "SharksExhausted",
            Self::FinalizeConflict(_) => "FinalizeConflict",
            Self::StateError(_) => "StateError",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotEnoughSpace { .. } => "NotEnoughSpace",
            Self::ShardUnavailable(_) => "ShardUnavailable",
            Self::Transport(_) | Self::MetaStore(_) | Self::Internal { .. } => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::ConcurrentRequest.http_status_code(), 412);
        assert_eq!(Error::SharksExhausted.http_status_code(), 503);
        assert_eq!(Error::internal("unreachable branch").http_status_code(), 500);
    }

    #[test]
    fn test_error_code_stable_across_messages() {
        let a = Error::StateError("abort then commit".into());
        let b = Error::StateError("different message".into());
        assert_eq!(a.code(), b.code());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::ShardUnavailable("shard-3".into()).is_retryable());
        assert!(!Error::ConcurrentRequest.is_retryable());
    }
}
