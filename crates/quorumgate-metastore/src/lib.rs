//! QuorumGate Metastore - sharded metadata tier reference implementation
//!
//! Implements the metadata tier's external contract depended on by the
//! gateway core: `get`/`put`/`del`/`batch` with etag-based optimistic
//! concurrency, keys hashed deterministically to shards.

pub mod store;
pub mod tables;
pub mod types;

pub use store::{BatchOp, Condition, MetaStore};
pub use types::{
    DirectoryRecord, Envelope, FinalizingRecord, FinalizingType, ObjectRecord, PartRecord, UploadRecord, UploadState,
};
