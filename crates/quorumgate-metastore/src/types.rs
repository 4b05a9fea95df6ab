//! Durable record shapes for the metadata tier.
//!
//! These are the three record kinds the gateway core depends on: object
//! records, MPU upload records, and MPU finalizing records. They are
//! serialized to redb via bincode, wrapped in an [`Envelope`] that
//! carries the etag used for optimistic concurrency.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A durable record plus the etag optimistic-concurrency token the store
/// compares against on conditional writes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub etag: String,
    pub record: T,
}

/// A directory's metadata. Directories have no bytes and no replica set; they
/// exist purely to bound the entry-count check (§4.5 step 6) and to anchor the
/// parent-exists invariant object PUTs depend on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub path: String,
    /// `None` only for the account root.
    pub parent_path: Option<String>,
    pub owner: String,
    pub headers: HashMap<String, String>,
    pub modified_at_ms: u64,
}

/// A committed object's metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Normalized path key, including the owner identifier.
    pub path: String,
    /// Opaque 128-bit object identifier.
    pub object_id: [u8; 16],
    pub content_length: u64,
    /// Base64-encoded content digest.
    pub content_hash: String,
    pub content_type: String,
    /// Custom headers, keys lowercased.
    pub headers: HashMap<String, String>,
    /// Ordered storage-node identifiers; empty iff `content_length == 0`.
    pub replica_set: Vec<[u8; 16]>,
    pub owner: String,
    pub created_at_ms: u64,
    pub modified_at_ms: u64,
}

/// State of an in-progress or finalized multipart upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    Created,
    Finalizing,
}

/// Labels the terminal branch once an upload has entered `Finalizing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizingType {
    Abort,
    Commit,
}

/// Per-MPU state, stored on the owner's uploads shard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadRecord {
    pub upload_id: [u8; 16],
    pub state: UploadState,
    pub finalizing_type: Option<FinalizingType>,
    /// Normalized key of the target object path.
    pub target_path: String,
    /// Path under which parts are logically placed, `/<account>/uploads/<prefix>/<id>`.
    pub upload_path: String,
    /// Headers frozen at creation time.
    pub headers: HashMap<String, String>,
    pub replica_set: Vec<[u8; 16]>,
    /// Object identifier pre-allocated at creation.
    pub object_id: [u8; 16],
    /// Set only once a commit's parts digest has been computed.
    pub parts_digest: Option<String>,
    pub created_at_ms: u64,
    pub declared_size: Option<u64>,
}

impl UploadRecord {
    /// Invariant: while `state == Created`, `finalizing_type` is `None`;
    /// while `state == Finalizing`, it must be `Some`.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        match self.state {
            UploadState::Created => self.finalizing_type.is_none(),
            UploadState::Finalizing => self.finalizing_type.is_some(),
        }
    }
}

/// The atomic marker that an MPU has been aborted or committed exactly once.
///
/// Stored on the *target object's* shard, keyed by
/// `<upload-id>:<normalized-target-object-path>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalizingRecord {
    pub upload_id: [u8; 16],
    pub finalizing_type: FinalizingType,
    pub owner: String,
    pub target_path: String,
    pub object_id: [u8; 16],
    /// Content hash, set for commits only.
    pub content_hash: Option<String>,
}

/// A single immutable part written under an upload path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartRecord {
    pub part_number: u32,
    pub etag: String,
    pub content_length: u64,
}
