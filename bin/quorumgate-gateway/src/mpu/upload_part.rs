//! MPU-upload-part handler (§4.6): `PUT /:account/uploads/:prefix/:id/:part`.
//!
//! Writes go to the upload's replica set, frozen at creation time — this
//! bypasses independent placement entirely, unlike the object PUT pipeline.
//! Part size is not validated here; §4.6 defers that to commit.

use crate::error::GatewayResult;
use crate::pipeline::headers::header_str;
use crate::state::SharedState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quorumgate_common::{Error as CoreError, NodeId};
use quorumgate_metastore::{Condition, PartRecord, UploadState, tables};
use quorumgate_shark::{NodeHandle, fan_out_put};

const MAX_PART_NUMBER: u32 = 9_999;

pub async fn upload_part_handler(
    State(state): State<SharedState>,
    Path((account, prefix, id, part_number)): Path<(String, String, String, u32)>,
    headers: HeaderMap,
    body: Body,
) -> GatewayResult<Response> {
    if part_number > MAX_PART_NUMBER {
        return Err(CoreError::InvalidArgument(format!("part number {part_number} exceeds {MAX_PART_NUMBER}")).into());
    }

    let upload_path = format!("/{account}/uploads/{prefix}/{id}");
    let envelope = state.meta.get::<quorumgate_metastore::UploadRecord>(tables::UPLOADS, &upload_path)?;
    if envelope.record.state != UploadState::Created {
        return Err(CoreError::StateError("cannot upload parts to a finalizing upload".to_string()).into());
    }

    let max_content_length = state.config.storage.default_max_streaming_size_mb * 1024 * 1024;
    let limit = usize::try_from(max_content_length).unwrap_or(usize::MAX);
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|_| CoreError::MaxContentLength {
        size: max_content_length + 1,
        max: max_content_length,
    })?;

    let part_path = super::paths::part_path(&upload_path, part_number);
    let computed_digest = if envelope.record.replica_set.is_empty() {
        if !bytes.is_empty() {
            return Err(CoreError::InvalidArgument("upload has no replica set; only empty parts are accepted".to_string()).into());
        }
        quorumgate_common::ZERO_BYTE_DIGEST.to_string()
    } else {
        fan_out_to_upload_replicas(&state, &account, &envelope.record.replica_set, &part_path, bytes.clone()).await?
    };

    if let Some(supplied) = header_str(&headers, "content-md5") {
        if supplied != computed_digest {
            return Err(CoreError::ChecksumMismatch {
                computed: computed_digest,
                supplied: supplied.to_string(),
            }
            .into());
        }
    }

    let record = PartRecord {
        part_number,
        etag: computed_digest.clone(),
        content_length: bytes.len() as u64,
    };
    state.meta.put(tables::PARTS, &part_path, &record, Condition::Unconditional)?;

    Ok((
        StatusCode::NO_CONTENT,
        [
            (header::ETAG, computed_digest.clone()),
            (header::HeaderName::from_static("computed-md5"), computed_digest),
        ],
    )
        .into_response())
}

async fn fan_out_to_upload_replicas(
    state: &SharedState,
    account: &str,
    replica_set: &[[u8; 16]],
    part_path: &str,
    bytes: Bytes,
) -> GatewayResult<String> {
    let topology = {
        let planner = state.placement.read().await;
        planner.topology().clone()
    };
    let mut handles = Vec::with_capacity(replica_set.len());
    for raw_id in replica_set {
        let node_id = NodeId::from_bytes(*raw_id);
        let Some(node_info) = topology.get_node(node_id) else {
            continue;
        };
        handles.push(NodeHandle {
            node_id,
            address: node_info.address,
        });
    }
    if handles.len() != replica_set.len() {
        return Err(CoreError::ShardUnavailable(format!("{account}: upload replica set has a missing node")).into());
    }

    let result = fan_out_put(&state.sharks, &handles, part_path, bytes).await?;
    Ok(result.computed_digest)
}
