//! MPU state query: `GET /:account/uploads/:prefix/:id/state`.

use crate::error::GatewayResult;
use crate::state::SharedState;
use axum::Json;
use axum::extract::{Path, State};
use quorumgate_common::Error as CoreError;
use quorumgate_metastore::{FinalizingType, UploadRecord, UploadState, tables};
use serde::Serialize;

#[derive(Serialize)]
struct UploadStateResponse {
    id: String,
    state: &'static str,
    #[serde(rename = "objectPath")]
    object_path: String,
    #[serde(rename = "partsDirectory")]
    parts_directory: String,
}

fn state_label(state: UploadState, finalizing_type: Option<FinalizingType>) -> &'static str {
    match (state, finalizing_type) {
        (UploadState::Created, _) => "created",
        (UploadState::Finalizing, Some(FinalizingType::Abort)) => "aborted",
        (UploadState::Finalizing, Some(FinalizingType::Commit)) => "committed",
        (UploadState::Finalizing, None) => "finalizing",
    }
}

pub async fn upload_state_handler(
    State(state): State<SharedState>,
    Path((account, prefix, id)): Path<(String, String, String)>,
) -> GatewayResult<Json<UploadStateResponse>> {
    let upload_path = format!("/{account}/uploads/{prefix}/{id}");
    let envelope = state
        .meta
        .get::<UploadRecord>(tables::UPLOADS, &upload_path)
        .map_err(|e| if e.is_not_found() { CoreError::ResourceNotFound(upload_path.clone()) } else { e })?;

    Ok(Json(UploadStateResponse {
        id,
        state: state_label(envelope.record.state, envelope.record.finalizing_type),
        object_path: envelope.record.target_path,
        parts_directory: envelope.record.upload_path,
    }))
}
