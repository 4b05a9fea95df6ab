//! MPU-abort handler (§4.6): `POST /:account/uploads/:prefix/:id/abort`.

use crate::error::GatewayResult;
use crate::state::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use quorumgate_auth::AuthContext;
use quorumgate_common::Error as CoreError;
use quorumgate_metastore::{Condition, FinalizingRecord, FinalizingType, UploadState, tables};

pub async fn abort_upload_handler(
    State(state): State<SharedState>,
    Path((account, prefix, id)): Path<(String, String, String)>,
    axum::Extension(ctx): axum::Extension<AuthContext>,
) -> GatewayResult<StatusCode> {
    if ctx.is_subuser {
        return Err(CoreError::BadRequest("sub-users may not abort multipart uploads".to_string()).into());
    }

    let upload_path = format!("/{account}/uploads/{prefix}/{id}");
    let envelope = state
        .meta
        .get::<quorumgate_metastore::UploadRecord>(tables::UPLOADS, &upload_path)?;

    match (envelope.record.state, envelope.record.finalizing_type) {
        (UploadState::Created, _) => {
            let mut next = envelope.record.clone();
            next.state = UploadState::Finalizing;
            next.finalizing_type = Some(FinalizingType::Abort);
            state
                .meta
                .put(tables::UPLOADS, &upload_path, &next, Condition::IfEtagEquals(envelope.etag))?;
        }
        (UploadState::Finalizing, Some(FinalizingType::Abort)) => {}
        (UploadState::Finalizing, Some(FinalizingType::Commit)) => {
            return Err(CoreError::FinalizeConflict("upload is already committing".to_string()).into());
        }
        (UploadState::Finalizing, None) => {
            return Err(CoreError::internal("finalizing upload record with no finalizing_type").into());
        }
    }

    let finalizing_key = format!("{id}:{}", envelope.record.target_path);
    let finalizing_record = FinalizingRecord {
        upload_id: envelope.record.upload_id,
        finalizing_type: FinalizingType::Abort,
        owner: ctx.owner,
        target_path: envelope.record.target_path.clone(),
        object_id: envelope.record.object_id,
        content_hash: None,
    };

    match state.meta.put(tables::FINALIZING, &finalizing_key, &finalizing_record, Condition::IfAbsent) {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(CoreError::ConcurrentRequest) => {
            let existing = state.meta.get::<FinalizingRecord>(tables::FINALIZING, &finalizing_key)?;
            match existing.record.finalizing_type {
                FinalizingType::Abort => Ok(StatusCode::NO_CONTENT),
                FinalizingType::Commit => Err(CoreError::FinalizeConflict("upload already committed".to_string()).into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
