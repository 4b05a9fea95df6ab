//! Redb table definitions for persistent metadata storage.
//!
//! One table per record kind, keyed by the record's path key (objects,
//! uploads) or by `<upload-id>:<target-path>` (finalizing records). Every
//! value is a bincode-encoded [`crate::types::Envelope`].

use redb::TableDefinition;

pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
pub const DIRECTORIES: TableDefinition<&str, &[u8]> = TableDefinition::new("directories");
pub const UPLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("uploads");
pub const FINALIZING: TableDefinition<&str, &[u8]> = TableDefinition::new("finalizing");
pub const PARTS: TableDefinition<&str, &[u8]> = TableDefinition::new("parts");
