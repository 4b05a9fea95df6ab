//! Core type definitions shared across the gateway core.
//!
//! Identifiers, path keys, and the small set of placement-level enums
//! (`FailureDomain`, `NodeStatus`) that the placement planner and the
//! metadata client both need.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier for an object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct ObjectId(Uuid);

impl ObjectId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque 128-bit identifier for a multipart upload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct UploadId(Uuid);

impl UploadId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Full lowercase-hex form, no hyphens stripped — the id as it appears on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// Last hex digit of the id, used to encode the upload's prefix directory length.
    #[must_use]
    pub fn last_hex_digit(&self) -> char {
        self.to_hex().chars().next_back().expect("uuid hex is never empty")
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a storage node ("shark").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct NodeId(Uuid);

impl NodeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized metadata path key: `/<account>/<path...>`, owner included.
///
/// Distinct from a raw request path — callers normalize (collapse slashes,
/// reject `..`) before constructing one.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct PathKey(String);

impl PathKey {
    pub fn new(key: impl Into<String>) -> Result<Self, PathKeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    #[must_use]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.matches('/').count() <= 1
    }

    /// Parent path key, or `None` if this key is already the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.0.trim_end_matches('/');
        let idx = trimmed.rfind('/')?;
        if idx == 0 {
            return Some(Self("/".to_string()));
        }
        Some(Self(trimmed[..idx].to_string()))
    }

    fn validate(key: &str) -> Result<(), PathKeyError> {
        if key.is_empty() || !key.starts_with('/') {
            return Err(PathKeyError::MustBeAbsolute);
        }
        if key.len() > 4096 {
            return Err(PathKeyError::TooLong);
        }
        if key.split('/').any(|seg| seg == "..") {
            return Err(PathKeyError::ContainsDotDot);
        }
        Ok(())
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathKey({:?})", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PathKeyError {
    #[error("path key must be absolute (start with '/')")]
    MustBeAbsolute,
    #[error("path key exceeds 4096 bytes")]
    TooLong,
    #[error("path key must not contain '..' segments")]
    ContainsDotDot,
}

/// Failure domain levels used by the placement planner's diversity pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureDomain {
    Node = 0,
    Rack = 1,
    Datacenter = 2,
    Region = 3,
}

impl fmt::Display for FailureDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Rack => write!(f, "rack"),
            Self::Datacenter => write!(f, "datacenter"),
            Self::Region => write!(f, "region"),
        }
    }
}

/// Storage node status, as tracked by the periodically refreshed placement view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Active,
    Draining,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_roundtrip() {
        let id = ObjectId::new();
        assert_eq!(id.as_bytes().len(), 16);
    }

    #[test]
    fn test_upload_id_last_hex_digit() {
        let uuid = Uuid::parse_str("0123456789abcdef0123456789abcdef").unwrap();
        let id = UploadId::from_uuid(uuid);
        assert_eq!(id.last_hex_digit(), 'f');
    }

    #[test]
    fn test_path_key_parent() {
        let key = PathKey::new("/acct/stor/foo/bar").unwrap();
        assert_eq!(key.parent().unwrap().as_str(), "/acct/stor/foo");
        let root = PathKey::new("/acct").unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_path_key_rejects_dotdot() {
        assert!(PathKey::new("/acct/../etc").is_err());
        assert!(PathKey::new("relative").is_err());
    }
}
