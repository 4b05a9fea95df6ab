//! Looks up the current record (object or directory) at a path key, the
//! shared first step of conditional-header evaluation, PUT's directory/object
//! disambiguation, and GET/HEAD/DELETE.

use quorumgate_common::Error as CoreError;
use quorumgate_metastore::{DirectoryRecord, Envelope, MetaStore, ObjectRecord, tables};

pub enum CurrentRecord {
    Object(Envelope<ObjectRecord>),
    Directory(Envelope<DirectoryRecord>),
}

impl CurrentRecord {
    #[must_use]
    pub fn etag(&self) -> &str {
        match self {
            Self::Object(env) => &env.etag,
            Self::Directory(env) => &env.etag,
        }
    }

    #[must_use]
    pub fn mtime_ms(&self) -> u64 {
        match self {
            Self::Object(env) => env.record.modified_at_ms,
            Self::Directory(env) => env.record.modified_at_ms,
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// Looks up the current record at `path`, whichever table it lives in.
///
/// # Errors
/// Propagates any store error other than "not found" in either table.
pub fn lookup(meta: &MetaStore, path: &str) -> Result<Option<CurrentRecord>, CoreError> {
    match meta.get::<ObjectRecord>(tables::OBJECTS, path) {
        Ok(env) => return Ok(Some(CurrentRecord::Object(env))),
        Err(CoreError::ResourceNotFound(_)) => {}
        Err(e) => return Err(e),
    }
    match meta.get::<DirectoryRecord>(tables::DIRECTORIES, path) {
        Ok(env) => Ok(Some(CurrentRecord::Directory(env))),
        Err(CoreError::ResourceNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
