//! Maps the gateway core's error taxonomy (§7) onto HTTP responses.
//!
//! `quorumgate_common::Error` already carries `http_status_code()`/`code()`;
//! this newtype exists only to give it an `IntoResponse` impl without an
//! orphan-rule violation (the core crate stays framework-agnostic).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quorumgate_common::Error as CoreError;
use serde::Serialize;

pub struct GatewayError(pub CoreError);

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "request rejected");
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
