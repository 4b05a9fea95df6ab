//! Authentication middleware: extracts the `:account` path segment, calls
//! through the injected [`quorumgate_auth::Authorizer`], and stashes the
//! resulting `AuthContext` in request extensions for handlers to pull out —
//! the same shape the teacher's `auth_layer` uses, minus the SigV4 machinery
//! that now lives entirely behind the trait boundary.

use crate::error::GatewayError;
use crate::state::SharedState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use quorumgate_common::Error as CoreError;

pub async fn auth_layer(State(state): State<SharedState>, mut request: Request<Body>, next: Next) -> Result<Response, GatewayError> {
    let account = request
        .uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::BadRequest("request path must start with an account".into()))?
        .to_string();

    let raw_authorization = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let ctx = state
        .authorizer
        .authorize(&account, raw_authorization.as_deref())
        .await
        .map_err(|e| CoreError::BadRequest(e.to_string()))?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
