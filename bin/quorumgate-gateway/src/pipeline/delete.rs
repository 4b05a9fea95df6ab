//! DELETE pipeline: standard semantics on an object or directory pointer.
//! Directory deletion requires the directory be empty. Accounts configured
//! with snaplinks disabled carry an extra hint through to the metadata
//! delete; this core forwards it opaquely and does not define its effect
//! (§9 open question) — our reference metadata tier has no snaplink
//! cleanup to skip, so the hint is observable only in the trace log.

use super::lookup::{CurrentRecord, lookup};
use crate::conditional::{self, ConditionalOutcome};
use crate::error::GatewayResult;
use crate::state::SharedState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use quorumgate_common::{Error as CoreError, PathKey};
use quorumgate_metastore::{Condition, tables};

pub async fn delete_object_handler(
    State(state): State<SharedState>,
    Path((account, object_path)): Path<(String, String)>,
    axum::Extension(_ctx): axum::Extension<quorumgate_auth::AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    let path_key = PathKey::new(format!("/{account}/{object_path}")).map_err(|e| CoreError::BadRequest(e.to_string()))?;

    let Some(current) = lookup(&state.meta, path_key.as_str())? else {
        return Err(CoreError::ResourceNotFound(path_key.as_str().to_string()).into());
    };

    let outcome = conditional::evaluate(&headers, &Method::DELETE, Some(current.etag()), Some(current.mtime_ms()))?;
    if let ConditionalOutcome::PreconditionFailed(header) = outcome {
        return Err(CoreError::PreconditionFailed(header.to_string()).into());
    }

    let snaplinks_disabled = state.config.accounts_snaplinks_disabled.iter().any(|a| a == &account);
    if snaplinks_disabled {
        tracing::debug!(account, path = path_key.as_str(), "delete carries snaplinks-disabled hint");
    }

    match current {
        CurrentRecord::Directory(envelope) => {
            let count = state.meta.count_children(path_key.as_str())?;
            if count > 0 {
                return Err(CoreError::BadRequest("directory is not empty".to_string()).into());
            }
            state
                .meta
                .del(tables::DIRECTORIES, path_key.as_str(), Condition::IfEtagEquals(envelope.etag))?;
        }
        CurrentRecord::Object(envelope) => {
            state
                .meta
                .del(tables::OBJECTS, path_key.as_str(), Condition::IfEtagEquals(envelope.etag))?;
        }
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
