//! Short-form MPU redirect handlers (§6): `GET/HEAD/POST /:account/uploads/:id[/:partNum]`.
//!
//! Callers that only know the upload id (not its prefix directory) hit these
//! routes and get redirected (301) to the fully qualified path. Resolution
//! tries the prefix length encoded in the id's last hex digit first, falling
//! back to the legacy length for ids that predate that encoding.

use super::paths::{self, LEGACY_PREFIX_LEN};
use crate::error::GatewayResult;
use crate::state::SharedState;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use quorumgate_common::{Error as CoreError, UploadId};
use quorumgate_metastore::{UploadRecord, tables};

fn resolve_upload_path(state: &SharedState, account: &str, id: UploadId) -> Result<String, CoreError> {
    let encoded_len = paths::prefix_len_from_id(id);
    for candidate_len in [encoded_len, LEGACY_PREFIX_LEN] {
        let candidate = paths::upload_path(account, candidate_len, id);
        match state.meta.get::<UploadRecord>(tables::UPLOADS, &candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        }
    }
    Err(CoreError::ResourceNotFound(format!("no upload found for id {}", id.to_hex())))
}

fn redirect_response(location: String) -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

fn parse_id(raw: &str) -> Result<UploadId, CoreError> {
    UploadId::parse(raw).ok_or_else(|| CoreError::BadRequest(format!("invalid upload id: {raw}")))
}

pub async fn redirect_upload_handler(
    State(state): State<SharedState>,
    Path((account, id)): Path<(String, String)>,
) -> GatewayResult<Response> {
    let upload_id = parse_id(&id)?;
    let target = resolve_upload_path(&state, &account, upload_id)?;
    Ok(redirect_response(target))
}

pub async fn redirect_upload_part_handler(
    State(state): State<SharedState>,
    Path((account, id, part_number)): Path<(String, String, u32)>,
) -> GatewayResult<Response> {
    let upload_id = parse_id(&id)?;
    let target = resolve_upload_path(&state, &account, upload_id)?;
    Ok(redirect_response(paths::part_path(&target, part_number)))
}
