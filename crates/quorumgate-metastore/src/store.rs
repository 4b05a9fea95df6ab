//! Sharded, etag-conditional metadata store backed by redb.
//!
//! This is a reference implementation of the metadata tier's external
//! contract (§4.3): `get`/`put`/`del`/`batch`, with keys hashed
//! deterministically to shards. Real deployments of the gateway this
//! core models run a clustered metadata tier behind this same contract;
//! redb here stands in for that tier one shard-file at a time.

use crate::types::Envelope;
use quorumgate_common::{Error, Result};
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Write condition for `put`/`del`.
#[derive(Clone, Debug)]
pub enum Condition {
    Unconditional,
    /// Succeeds only if the key is absent.
    IfAbsent,
    /// Succeeds only if the key's current etag equals the given value.
    IfEtagEquals(String),
}

/// A single bincode-pre-encoded write, used by [`MetaStore::batch`] so
/// puts against different tables (e.g. the finalizing record and the
/// object record) can be grouped into one atomic redb transaction.
pub enum BatchOp {
    Put {
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: String,
        payload: Vec<u8>,
        cond: Condition,
    },
    Del {
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: String,
        cond: Condition,
    },
}

impl BatchOp {
    #[must_use]
    pub fn put<T: Serialize>(
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: impl Into<String>,
        record: &T,
        cond: Condition,
    ) -> Self {
        Self::Put {
            table,
            key: key.into(),
            payload: bincode::serialize(record).expect("record serializes"),
            cond,
        }
    }

    fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Del { key, .. } => key,
        }
    }
}

#[derive(Serialize, serde::Deserialize)]
struct StoredEnvelope {
    etag: String,
    payload: Vec<u8>,
}

/// Metadata store: one redb database file per shard, selected by hashing
/// the record key.
pub struct MetaStore {
    shards: Vec<Database>,
    etag_counter: AtomicU64,
}

impl MetaStore {
    /// Opens (creating if absent) `shard_count` redb files under `base_dir`.
    ///
    /// # Errors
    /// Returns [`Error::MetaStore`] if a shard file cannot be opened.
    pub fn open(base_dir: &Path, shard_count: usize) -> Result<Self> {
        let mut shards = Vec::with_capacity(shard_count);
        for i in 0..shard_count {
            let path = Self::shard_path(base_dir, i);
            let db = Database::create(&path)
                .map_err(|e| Error::MetaStore(format!("opening shard {i}: {e}")))?;
            shards.push(db);
        }
        Ok(Self {
            shards,
            etag_counter: AtomicU64::new(1),
        })
    }

    fn shard_path(base_dir: &Path, index: usize) -> PathBuf {
        base_dir.join(format!("shard-{index}.redb"))
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Deterministic shard index for a key.
    #[must_use]
    pub fn shard_index(&self, key: &str) -> usize {
        shard_index(key, self.shards.len())
    }

    fn next_etag(&self) -> String {
        let n = self.etag_counter.fetch_add(1, Ordering::Relaxed);
        format!("{n:016x}")
    }

    /// Reads and decodes a record.
    ///
    /// # Errors
    /// Returns [`Error::ResourceNotFound`] if absent, [`Error::MetaStore`] on a store failure.
    pub fn get<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'_, &str, &[u8]>,
        key: &str,
    ) -> Result<Envelope<T>> {
        let shard = &self.shards[self.shard_index(key)];
        let txn = shard
            .begin_read()
            .map_err(|e| Error::MetaStore(e.to_string()))?;
        let handle = txn
            .open_table(table)
            .map_err(|e| Error::MetaStore(e.to_string()))?;
        let Some(value) = handle.get(key).map_err(|e| Error::MetaStore(e.to_string()))? else {
            return Err(Error::ResourceNotFound(key.to_string()));
        };
        decode::<T>(value.value())
    }

    /// Conditionally writes a record, returning the new etag.
    ///
    /// # Errors
    /// Returns [`Error::ConcurrentRequest`] if `cond` is not satisfied by
    /// the key's current state.
    pub fn put<T: Serialize>(
        &self,
        table: TableDefinition<'_, &str, &[u8]>,
        key: &str,
        record: &T,
        cond: Condition,
    ) -> Result<String> {
        let shard = &self.shards[self.shard_index(key)];
        let new_etag = self.next_etag();
        let payload = bincode::serialize(record).map_err(|e| Error::MetaStore(e.to_string()))?;
        let txn = shard
            .begin_write()
            .map_err(|e| Error::MetaStore(e.to_string()))?;
        {
            let mut handle = txn
                .open_table(table)
                .map_err(|e| Error::MetaStore(e.to_string()))?;
            enforce_condition(&handle, key, &cond)?;
            let stored = StoredEnvelope {
                etag: new_etag.clone(),
                payload,
            };
            let bytes = bincode::serialize(&stored).map_err(|e| Error::MetaStore(e.to_string()))?;
            handle
                .insert(key, bytes.as_slice())
                .map_err(|e| Error::MetaStore(e.to_string()))?;
        }
        txn.commit().map_err(|e| Error::MetaStore(e.to_string()))?;
        Ok(new_etag)
    }

    /// Conditionally deletes a record.
    ///
    /// # Errors
    /// Returns [`Error::ConcurrentRequest`] on an etag mismatch.
    pub fn del(&self, table: TableDefinition<'_, &str, &[u8]>, key: &str, cond: Condition) -> Result<()> {
        let shard = &self.shards[self.shard_index(key)];
        let txn = shard
            .begin_write()
            .map_err(|e| Error::MetaStore(e.to_string()))?;
        {
            let mut handle = txn
                .open_table(table)
                .map_err(|e| Error::MetaStore(e.to_string()))?;
            enforce_condition(&handle, key, &cond)?;
            handle.remove(key).map_err(|e| Error::MetaStore(e.to_string()))?;
        }
        txn.commit().map_err(|e| Error::MetaStore(e.to_string()))?;
        Ok(())
    }

    /// Counts direct children of `parent_path` across both the object and
    /// directory tables, for the parent directory entry-count check (§4.5
    /// step 6). A full-table scan per call is acceptable for this reference
    /// store; a production metadata tier would maintain the count as a
    /// running counter instead.
    ///
    /// # Errors
    /// Returns [`Error::MetaStore`] on a store failure.
    pub fn count_children(&self, parent_path: &str) -> Result<usize> {
        let prefix = format!("{}/", parent_path.trim_end_matches('/'));
        let mut count = 0;
        for shard in &self.shards {
            let txn = shard.begin_read().map_err(|e| Error::MetaStore(e.to_string()))?;
            for table in [crate::tables::OBJECTS, crate::tables::DIRECTORIES] {
                let Ok(handle) = txn.open_table(table) else {
                    continue;
                };
                let iter = handle.iter().map_err(|e| Error::MetaStore(e.to_string()))?;
                for entry in iter {
                    let (key, _) = entry.map_err(|e| Error::MetaStore(e.to_string()))?;
                    let key = key.value();
                    if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                        if !rest.is_empty() && !rest.contains('/') {
                            count += 1;
                        }
                    }
                }
            }
        }
        Ok(count)
    }

    /// Executes every op atomically on a single shard.
    ///
    /// # Errors
    /// Returns [`Error::internal`] if the ops don't all hash to the same
    /// shard (a planning bug upstream — the commit coordinator guarantees
    /// this by construction via the finalizing record's key containing the
    /// target object path). Returns [`Error::ConcurrentRequest`] if any
    /// condition fails, rolling back the whole batch.
    pub fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let Some(first) = ops.first() else {
            return Ok(());
        };
        let shard_idx = self.shard_index(first.key());
        for op in &ops {
            if self.shard_index(op.key()) != shard_idx {
                return Err(Error::internal(
                    "batch ops span more than one metadata shard",
                ));
            }
        }

        let shard = &self.shards[shard_idx];
        let txn = shard
            .begin_write()
            .map_err(|e| Error::MetaStore(e.to_string()))?;
        for op in ops {
            match op {
                BatchOp::Put {
                    table,
                    key,
                    payload,
                    cond,
                } => {
                    let mut handle = txn
                        .open_table(table)
                        .map_err(|e| Error::MetaStore(e.to_string()))?;
                    enforce_condition(&handle, &key, &cond)?;
                    let stored = StoredEnvelope {
                        etag: format!("{:016x}", self.etag_counter.fetch_add(1, Ordering::Relaxed)),
                        payload,
                    };
                    let bytes =
                        bincode::serialize(&stored).map_err(|e| Error::MetaStore(e.to_string()))?;
                    handle
                        .insert(key.as_str(), bytes.as_slice())
                        .map_err(|e| Error::MetaStore(e.to_string()))?;
                }
                BatchOp::Del { table, key, cond } => {
                    let mut handle = txn
                        .open_table(table)
                        .map_err(|e| Error::MetaStore(e.to_string()))?;
                    enforce_condition(&handle, &key, &cond)?;
                    handle
                        .remove(key.as_str())
                        .map_err(|e| Error::MetaStore(e.to_string()))?;
                }
            }
        }
        txn.commit().map_err(|e| Error::MetaStore(e.to_string()))?;
        Ok(())
    }
}

fn enforce_condition(
    handle: &Table<'_, &str, &[u8]>,
    key: &str,
    cond: &Condition,
) -> Result<()> {
    let existing = handle.get(key).map_err(|e| Error::MetaStore(e.to_string()))?;
    match (cond, existing) {
        (Condition::Unconditional, _) => Ok(()),
        (Condition::IfAbsent, None) => Ok(()),
        (Condition::IfAbsent, Some(_)) => Err(Error::ConcurrentRequest),
        (Condition::IfEtagEquals(_), None) => Err(Error::ConcurrentRequest),
        (Condition::IfEtagEquals(expected), Some(value)) => {
            let stored: StoredEnvelope =
                bincode::deserialize(value.value()).map_err(|e| Error::MetaStore(e.to_string()))?;
            if &stored.etag == expected {
                Ok(())
            } else {
                Err(Error::ConcurrentRequest)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<T>> {
    let stored: StoredEnvelope =
        bincode::deserialize(bytes).map_err(|e| Error::MetaStore(e.to_string()))?;
    let record: T =
        bincode::deserialize(&stored.payload).map_err(|e| Error::MetaStore(e.to_string()))?;
    Ok(Envelope {
        etag: stored.etag,
        record,
    })
}

/// Deterministic shard index for a key, exposed so callers constructing
/// batches (e.g. the commit coordinator) can verify co-location before
/// issuing a write.
///
/// A composite key (`<upload-id>:<target-path>`, as used by the finalizing
/// record) shards on the portion after the last `:` rather than the whole
/// string — this is what makes the finalizing record co-locate with the
/// object record it's committed alongside, since both then hash the same
/// target path. Plain keys (no `:`) are unaffected.
#[must_use]
pub fn shard_index(key: &str, shard_count: usize) -> usize {
    if shard_count == 0 {
        return 0;
    }
    let sharding_key = key.rsplit(':').next().unwrap_or(key);
    (xxhash_rust::xxh64::xxh64(sharding_key.as_bytes(), 0) as usize) % shard_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::OBJECTS;
    use crate::types::ObjectRecord;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_object(path: &str) -> ObjectRecord {
        ObjectRecord {
            path: path.to_string(),
            object_id: [1; 16],
            content_length: 5,
            content_hash: "XUFAKrxLKna5cZ2REBfFkg==".into(),
            content_type: "application/octet-stream".into(),
            headers: HashMap::new(),
            replica_set: vec![[2; 16], [3; 16]],
            owner: "acct".into(),
            created_at_ms: 0,
            modified_at_ms: 0,
        }
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 4).unwrap();
        let record = sample_object("/acct/stor/hello");
        let etag = store
            .put(OBJECTS, "/acct/stor/hello", &record, Condition::IfAbsent)
            .unwrap();

        let fetched: Envelope<ObjectRecord> = store.get(OBJECTS, "/acct/stor/hello").unwrap();
        assert_eq!(fetched.etag, etag);
        assert_eq!(fetched.record.content_hash, record.content_hash);
    }

    #[test]
    fn test_if_absent_conflict() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 4).unwrap();
        let record = sample_object("/acct/stor/hello");
        store
            .put(OBJECTS, "/acct/stor/hello", &record, Condition::IfAbsent)
            .unwrap();

        let err = store
            .put(OBJECTS, "/acct/stor/hello", &record, Condition::IfAbsent)
            .unwrap_err();
        assert!(matches!(err, Error::ConcurrentRequest));
    }

    #[test]
    fn test_if_etag_equals_mismatch() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 4).unwrap();
        let record = sample_object("/acct/stor/hello");
        store
            .put(OBJECTS, "/acct/stor/hello", &record, Condition::IfAbsent)
            .unwrap();

        let err = store
            .put(
                OBJECTS,
                "/acct/stor/hello",
                &record,
                Condition::IfEtagEquals("stale".into()),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ConcurrentRequest));
    }

    #[test]
    fn test_same_shard_batch_commits_atomically() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 1).unwrap();
        let record = sample_object("/acct/stor/hello");
        store
            .batch(vec![BatchOp::put(
                OBJECTS,
                "/acct/stor/hello",
                &record,
                Condition::IfAbsent,
            )])
            .unwrap();

        let fetched: Envelope<ObjectRecord> = store.get(OBJECTS, "/acct/stor/hello").unwrap();
        assert_eq!(fetched.record.owner, "acct");
    }

    #[test]
    fn test_count_children_counts_direct_descendants_only() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 1).unwrap();
        store
            .put(OBJECTS, "/acct/stor/dir/a", &sample_object("/acct/stor/dir/a"), Condition::IfAbsent)
            .unwrap();
        store
            .put(OBJECTS, "/acct/stor/dir/b", &sample_object("/acct/stor/dir/b"), Condition::IfAbsent)
            .unwrap();
        store
            .put(
                OBJECTS,
                "/acct/stor/dir/nested/c",
                &sample_object("/acct/stor/dir/nested/c"),
                Condition::IfAbsent,
            )
            .unwrap();

        assert_eq!(store.count_children("/acct/stor/dir").unwrap(), 2);
    }

    #[test]
    fn test_finalizing_key_colocates_with_target_path() {
        let target = "/acct/stor/dir/nested/c";
        let finalizing_key = format!("0123456789abcdef0123456789abcdef:{target}");
        assert_eq!(shard_index(&finalizing_key, 16), shard_index(target, 16));
    }

    #[test]
    fn test_batch_rejects_cross_shard_ops() {
        let dir = tempdir().unwrap();
        let store = MetaStore::open(dir.path(), 8).unwrap();
        let a = sample_object("/acct/stor/a");
        let b = sample_object("/acct/stor/zzzzzzzzzzzzzzzzzzzzzzzzzz");
        let err = store
            .batch(vec![
                BatchOp::put(OBJECTS, "/acct/stor/a", &a, Condition::IfAbsent),
                BatchOp::put(OBJECTS, "/acct/stor/zzzzzzzzzzzzzzzzzzzzzzzzzz", &b, Condition::IfAbsent),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }
}
