//! MPU-create handler (§4.6): `POST /:account/uploads`.

use super::paths;
use crate::error::GatewayResult;
use crate::pipeline::headers::normalize_copies;
use crate::shark_adapter::to_node_handles;
use crate::state::SharedState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use quorumgate_auth::AuthContext;
use quorumgate_common::{Error as CoreError, ObjectId, PathKey, now_millis};
use quorumgate_metastore::{Condition, DirectoryRecord, UploadRecord, UploadState, tables};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(rename = "objectPath")]
    object_path: String,
    #[serde(default)]
    headers: Map<String, Value>,
}

#[derive(Serialize)]
struct CreateResponse {
    id: String,
    #[serde(rename = "partsDirectory")]
    parts_directory: String,
}

pub async fn create_upload_handler(
    State(state): State<SharedState>,
    Path(account): Path<String>,
    axum::Extension(ctx): axum::Extension<AuthContext>,
    Json(body): Json<CreateRequest>,
) -> GatewayResult<(StatusCode, Json<CreateResponse>)> {
    // Step 1: authorize against the top-level uploads resource. Subusers forbidden.
    if ctx.is_subuser {
        return Err(CoreError::BadRequest("sub-users may not create multipart uploads".to_string()).into());
    }

    if body.object_path.is_empty() {
        return Err(CoreError::BadRequest("objectPath must not be empty".to_string()).into());
    }
    let headers = validate_create_headers(&body.headers)?;

    // Step 2: generate the upload id, encoding the configured prefix length.
    let configured_len = paths::configured_prefix_len(state.config.multipart_upload.prefix_dir_len);
    let upload_id = paths::new_upload_id_with_prefix_len(configured_len);
    let prefix_len = paths::prefix_len_from_id(upload_id);
    let upload_path = paths::upload_path(&account, prefix_len, upload_id);

    // Step 3: normalize target object path and owner.
    let target_path = PathKey::new(body.object_path).map_err(|e| CoreError::BadRequest(e.to_string()))?;

    // Step 4: plan placement for declared size/copies; zero-byte uploads carry an empty replica set.
    let declared_size = header_map_u64(&headers, "content-length")?;
    let copies = normalize_copies(header_map_durability(&headers)?, state.config.max_object_copies)?;
    let utilization_pct = if ctx.is_operator {
        state.config.storage.reconciled_operator_utilization_pct()
    } else {
        state.config.storage.max_utilization_pct
    };
    let replica_ids = match declared_size {
        Some(0) => Vec::new(),
        _ => {
            let planning_size = declared_size.unwrap_or(1);
            let sets = {
                let planner = state.placement.read().await;
                planner.plan(planning_size, copies, utilization_pct)?
            };
            let Some(first) = sets.into_iter().next() else {
                return Err(CoreError::internal("placement returned no candidate sets").into());
            };
            to_node_handles(&first).into_iter().map(|h| *h.node_id.as_bytes()).collect()
        }
    };

    // Step 5: ensure the prefix directory exists.
    ensure_prefix_directory(&state, &account, prefix_len, upload_id, &ctx.owner)?;

    // Step 6: persist the upload record.
    let object_id = ObjectId::new();
    let record = UploadRecord {
        upload_id: *upload_id.as_bytes(),
        state: UploadState::Created,
        finalizing_type: None,
        target_path: target_path.as_str().to_string(),
        upload_path: upload_path.clone(),
        headers,
        replica_set: replica_ids,
        object_id: *object_id.as_bytes(),
        parts_digest: None,
        created_at_ms: now_millis(),
        declared_size,
    };
    state.meta.put(tables::UPLOADS, &upload_path, &record, Condition::IfAbsent)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            id: upload_id.to_hex(),
            parts_directory: upload_path,
        }),
    ))
}

/// Lowercases keys, rejects any `if-*` conditional header (those belong on
/// the final commit, not the frozen creation-time headers), and requires
/// `content-length`, if present, to be a non-negative number.
fn validate_create_headers(raw: &Map<String, Value>) -> Result<HashMap<String, String>, CoreError> {
    let mut out = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let key = key.to_lowercase();
        if key.starts_with("if-") {
            return Err(CoreError::BadRequest(format!("{key} is not allowed on multipart upload creation")));
        }
        if key == "content-length" {
            let n = value
                .as_u64()
                .ok_or_else(|| CoreError::BadRequest("content-length must be a non-negative number".to_string()))?;
            out.insert(key, n.to_string());
            continue;
        }
        let as_string = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.insert(key, as_string);
    }
    Ok(out)
}

fn header_map_u64(headers: &HashMap<String, String>, name: &str) -> Result<Option<u64>, CoreError> {
    let Some(raw) = headers.get(name) else { return Ok(None) };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| CoreError::BadRequest(format!("invalid {name}: {raw}")))
}

fn header_map_durability(headers: &HashMap<String, String>) -> Result<Option<u32>, CoreError> {
    let raw = headers.get("durability-level").or_else(|| headers.get("x-durability-level"));
    let Some(raw) = raw else { return Ok(None) };
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| CoreError::BadRequest(format!("invalid durability-level: {raw}")))
}

fn ensure_prefix_directory(
    state: &SharedState,
    account: &str,
    prefix_len: usize,
    upload_id: quorumgate_common::UploadId,
    owner: &str,
) -> Result<(), CoreError> {
    let hex = upload_id.to_hex();
    let prefix = &hex[..prefix_len.min(hex.len())];
    let dir_path = format!("/{account}/uploads/{prefix}");
    match state.meta.put(
        tables::DIRECTORIES,
        &dir_path,
        &DirectoryRecord {
            path: dir_path.clone(),
            parent_path: Some(format!("/{account}/uploads")),
            owner: owner.to_string(),
            headers: HashMap::new(),
            modified_at_ms: now_millis(),
        },
        Condition::IfAbsent,
    ) {
        Ok(_) | Err(CoreError::ConcurrentRequest) => Ok(()),
        Err(e) => Err(e),
    }
}
