//! MPU-commit handler and commit coordinator (§4.6, §4.7):
//! `POST /:account/uploads/:prefix/:id/commit`.

use super::paths;
use crate::error::GatewayResult;
use crate::pipeline::headers::custom_headers;
use crate::state::SharedState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quorumgate_auth::AuthContext;
use quorumgate_common::{Error as CoreError, NodeId, ObjectId, digest, now_millis};
use quorumgate_metastore::{
    BatchOp, Condition, Envelope, FinalizingRecord, FinalizingType, ObjectRecord, PartRecord, UploadRecord, UploadState, tables,
};
use quorumgate_shark::{FinalizeRequest, NodeHandle, fan_out_finalize};
use serde::{Deserialize, Serialize};

const MAX_PARTS: usize = 10_000;
const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Deserialize)]
struct CommitRequest {
    parts: Vec<String>,
    #[serde(rename = "contentMD5")]
    content_md5: Option<String>,
}

#[derive(Serialize)]
struct CommitResponse {
    etag: String,
    #[serde(rename = "computedMD5")]
    computed_md5: String,
}

pub async fn commit_upload_handler(
    State(state): State<SharedState>,
    Path((account, prefix, id)): Path<(String, String, String)>,
    axum::Extension(ctx): axum::Extension<AuthContext>,
    headers: HeaderMap,
    Json(body): Json<CommitRequest>,
) -> GatewayResult<Response> {
    if body.parts.len() > MAX_PARTS {
        return Err(CoreError::InvalidArgument(format!("commit carries {} parts, limit is {MAX_PARTS}", body.parts.len())).into());
    }
    let parts_digest = digest(body.parts.concat().as_bytes());
    let upload_path = format!("/{account}/uploads/{prefix}/{id}");

    // Steps 1-3, 5: gate on state and transition to FINALIZING/COMMIT,
    // retrying once if a concurrent writer raced the etag-conditional put.
    let mut envelope = state.meta.get::<UploadRecord>(tables::UPLOADS, &upload_path)?;
    loop {
        match (envelope.record.state, envelope.record.finalizing_type, &envelope.record.parts_digest) {
            (UploadState::Finalizing, Some(FinalizingType::Abort), _) => {
                return Err(CoreError::StateError("upload was aborted".to_string()).into());
            }
            (UploadState::Finalizing, Some(FinalizingType::Commit), Some(existing)) if existing == &parts_digest => break,
            (UploadState::Finalizing, Some(FinalizingType::Commit), _) => {
                return Err(CoreError::StateError("upload is committing with different parts".to_string()).into());
            }
            (UploadState::Finalizing, None, _) => {
                return Err(CoreError::internal("finalizing upload record with no finalizing_type").into());
            }
            (UploadState::Created, _, _) => {
                let mut next = envelope.record.clone();
                next.state = UploadState::Finalizing;
                next.finalizing_type = Some(FinalizingType::Commit);
                next.parts_digest = Some(parts_digest.clone());
                match state.meta.put(tables::UPLOADS, &upload_path, &next, Condition::IfEtagEquals(envelope.etag.clone())) {
                    Ok(new_etag) => {
                        envelope = Envelope { etag: new_etag, record: next };
                        break;
                    }
                    Err(CoreError::ConcurrentRequest) => {
                        envelope = state.meta.get::<UploadRecord>(tables::UPLOADS, &upload_path)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    // Step 4: validate parts.
    let total_size = validate_parts(&state, &upload_path, &body.parts, envelope.record.declared_size)?;

    // Step 6-7: storage-node finalize fan-out, skipped for zero-byte commits.
    let computed_digest = if total_size == 0 {
        quorumgate_common::ZERO_BYTE_DIGEST.to_string()
    } else {
        finalize_on_replicas(&state, &account, &id, &envelope.record, total_size, &body.parts).await?
    };

    // Step 8: verify any client-supplied content hash.
    if let Some(supplied) = &body.content_md5 {
        if supplied != &computed_digest {
            return Err(CoreError::ChecksumMismatch {
                computed: computed_digest,
                supplied: supplied.clone(),
            }
            .into());
        }
    }

    // Step 9: atomic batch insert of the finalizing record and the object record.
    let finalizing_key = format!("{id}:{}", envelope.record.target_path);
    let mtime = now_millis();
    let content_type = envelope
        .record
        .headers
        .get("content-type")
        .cloned()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let object_record = ObjectRecord {
        path: envelope.record.target_path.clone(),
        object_id: envelope.record.object_id,
        content_length: total_size,
        content_hash: computed_digest.clone(),
        content_type,
        headers: custom_headers_from_map(&envelope.record.headers),
        replica_set: envelope.record.replica_set.clone(),
        owner: ctx.owner.clone(),
        created_at_ms: envelope.record.created_at_ms,
        modified_at_ms: mtime,
    };
    let finalizing_record = FinalizingRecord {
        upload_id: envelope.record.upload_id,
        finalizing_type: FinalizingType::Commit,
        owner: ctx.owner,
        target_path: envelope.record.target_path.clone(),
        object_id: envelope.record.object_id,
        content_hash: Some(computed_digest.clone()),
    };

    let object_etag = match state.meta.batch(vec![
        BatchOp::put(tables::FINALIZING, finalizing_key.clone(), &finalizing_record, Condition::IfAbsent),
        BatchOp::put(tables::OBJECTS, envelope.record.target_path.clone(), &object_record, Condition::Unconditional),
    ]) {
        Ok(()) => {
            let stored = state.meta.get::<ObjectRecord>(tables::OBJECTS, &envelope.record.target_path)?;
            stored.etag
        }
        Err(CoreError::ConcurrentRequest) => {
            let existing = state.meta.get::<FinalizingRecord>(tables::FINALIZING, &finalizing_key)?;
            match (existing.record.finalizing_type, &existing.record.content_hash) {
                (FinalizingType::Commit, Some(hash)) if hash == &computed_digest => {
                    let stored = state.meta.get::<ObjectRecord>(tables::OBJECTS, &envelope.record.target_path)?;
                    stored.etag
                }
                (FinalizingType::Commit, _) => {
                    return Err(CoreError::StateError("commit already finalized with a different digest".to_string()).into());
                }
                (FinalizingType::Abort, _) => {
                    return Err(CoreError::FinalizeConflict("upload was aborted".to_string()).into());
                }
            }
        }
        Err(e) => return Err(e.into()),
    };

    let _ = headers;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, envelope.record.target_path.clone())],
        Json(CommitResponse {
            etag: object_etag,
            computed_md5: computed_digest,
        }),
    )
        .into_response())
}

fn validate_parts(
    state: &SharedState,
    upload_path: &str,
    parts: &[String],
    declared_size: Option<u64>,
) -> Result<u64, crate::error::GatewayError> {
    let mut total = 0u64;
    for (index, client_etag) in parts.iter().enumerate() {
        let part_number = u32::try_from(index).map_err(|_| CoreError::InvalidArgument("too many parts".to_string()))?;
        let part_path = paths::part_path(upload_path, part_number);
        let part = state
            .meta
            .get::<PartRecord>(tables::PARTS, &part_path)
            .map_err(|_| CoreError::InvalidArgument(format!("part {part_number} was never uploaded")))?;
        if &part.record.etag != client_etag {
            return Err(CoreError::InvalidArgument(format!("part {part_number} etag does not match the uploaded part")).into());
        }
        let is_last = index + 1 == parts.len();
        if !is_last && part.record.content_length < MIN_PART_SIZE {
            return Err(CoreError::InvalidArgument(format!("part {part_number} is below the minimum part size")).into());
        }
        total += part.record.content_length;
    }
    if let Some(declared) = declared_size {
        if declared != total {
            return Err(CoreError::InvalidArgument("sum of part sizes does not match the upload's declared size".to_string()).into());
        }
    }
    Ok(total)
}

async fn finalize_on_replicas(
    state: &SharedState,
    account: &str,
    id: &str,
    record: &UploadRecord,
    nbytes: u64,
    parts: &[String],
) -> GatewayResult<String> {
    let topology = {
        let planner = state.placement.read().await;
        planner.topology().clone()
    };
    let mut handles = Vec::with_capacity(record.replica_set.len());
    for raw_id in &record.replica_set {
        let node_id = NodeId::from_bytes(*raw_id);
        let Some(node_info) = topology.get_node(node_id) else {
            return Err(CoreError::ShardUnavailable(format!("{account}: commit replica node missing from topology")).into());
        };
        handles.push(NodeHandle {
            node_id,
            address: node_info.address,
        });
    }

    let object_id = ObjectId::from_uuid(uuid::Uuid::from_bytes(record.object_id));
    let request = FinalizeRequest::new(object_id, account, nbytes, parts.to_vec());
    // §4.7: a finalize RPC failure is fatal for the commit (no partial
    // finalize, no fail-over) but must surface as `SharksExhausted`, not as
    // an `Internal` 500 — that status is reserved for the digest-disagreement
    // invariant violation, which `fan_out_finalize` also reports through this
    // same `Result` as `Error::Internal` and which we pass through unchanged.
    match fan_out_finalize(&state.sharks, &handles, id, &request).await {
        Ok(digest) => Ok(digest),
        Err(CoreError::Transport(e)) => {
            tracing::warn!(error = %e, "storage-node finalize RPC failed");
            Err(CoreError::SharksExhausted.into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod finalize_failure_tests {
    use super::*;
    use quorumgate_auth::NoopAuthorizer;
    use quorumgate_metastore::MetaStore;
    use quorumgate_placement::topology::FailureDomainInfo;
    use quorumgate_placement::{ClusterTopology, NodeInfo, PlacementPlanner};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::RwLock;

    async fn dead_address() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_finalize_transport_failure_maps_to_sharks_exhausted() {
        let dead = dead_address().await;
        let node_id = NodeId::new();
        let mut topology = ClusterTopology::new();
        topology.upsert_node(NodeInfo {
            id: node_id,
            name: "node".to_string(),
            address: dead,
            failure_domain: FailureDomainInfo::new("region1", "dc1", "rack1"),
            status: quorumgate_common::NodeStatus::Active,
            total_capacity: 1,
            used_capacity: 0,
            weight: 1.0,
            last_heartbeat: 0,
        });

        let dir = tempfile::tempdir().unwrap();
        let meta = std::sync::Arc::new(MetaStore::open(dir.path(), 1).unwrap());
        let state: SharedState = std::sync::Arc::new(crate::state::AppState {
            config: quorumgate_common::GatewayConfig::default(),
            meta,
            placement: RwLock::new(PlacementPlanner::new(topology)),
            sharks: std::sync::Arc::new(quorumgate_shark::ReplicaPool::new(
                std::time::Duration::from_millis(200),
                std::time::Duration::from_secs(5),
            )),
            authorizer: std::sync::Arc::new(NoopAuthorizer),
        });

        let record = UploadRecord {
            upload_id: [0; 16],
            state: UploadState::Finalizing,
            finalizing_type: Some(FinalizingType::Commit),
            target_path: "/acct/obj".to_string(),
            upload_path: "/acct/uploads/a/aaaa".to_string(),
            headers: std::collections::HashMap::new(),
            replica_set: vec![*node_id.as_bytes()],
            object_id: [1; 16],
            parts_digest: Some("digest".to_string()),
            created_at_ms: 0,
            declared_size: Some(5),
        };

        let err = finalize_on_replicas(&state, "acct", "aaaa", &record, 5, &["part0-etag".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err.0, CoreError::SharksExhausted));
    }
}

fn custom_headers_from_map(headers: &std::collections::HashMap<String, String>) -> std::collections::HashMap<String, String> {
    headers.iter().filter(|(k, _)| k.starts_with("m-")).map(|(k, v)| (k.clone(), v.clone())).collect()
}
