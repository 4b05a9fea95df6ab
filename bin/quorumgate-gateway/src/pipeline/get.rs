//! GET/HEAD pipeline: conditional evaluation, then either a directory's
//! metadata (directory listing is out of scope) or a single replica's bytes.

use super::headers::header_str;
use super::lookup::{CurrentRecord, lookup};
use crate::conditional::{self, ConditionalOutcome};
use crate::error::GatewayResult;
use crate::state::SharedState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quorumgate_common::{Error as CoreError, NodeId, PathKey};
use quorumgate_shark::get_object;
use std::time::{Duration, UNIX_EPOCH};

fn last_modified_header(mtime_ms: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_millis(mtime_ms))
}

pub async fn get_object_handler(
    state: State<SharedState>,
    path: Path<(String, String)>,
    ctx: axum::Extension<quorumgate_auth::AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    serve(state, path, ctx, headers, Method::GET).await
}

pub async fn head_object_handler(
    state: State<SharedState>,
    path: Path<(String, String)>,
    ctx: axum::Extension<quorumgate_auth::AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    serve(state, path, ctx, headers, Method::HEAD).await
}

async fn serve(
    State(state): State<SharedState>,
    Path((account, object_path)): Path<(String, String)>,
    axum::Extension(_ctx): axum::Extension<quorumgate_auth::AuthContext>,
    headers: HeaderMap,
    method: Method,
) -> GatewayResult<Response> {
    let path_key = PathKey::new(format!("/{account}/{object_path}")).map_err(|e| CoreError::BadRequest(e.to_string()))?;

    let Some(current) = lookup(&state.meta, path_key.as_str())? else {
        return Err(CoreError::ResourceNotFound(path_key.as_str().to_string()).into());
    };

    let outcome = conditional::evaluate(&headers, &method, Some(current.etag()), Some(current.mtime_ms()))?;
    if outcome == ConditionalOutcome::NotModified {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }
    if let ConditionalOutcome::PreconditionFailed(header) = outcome {
        return Err(CoreError::PreconditionFailed(header.to_string()).into());
    }

    match current {
        CurrentRecord::Directory(envelope) => {
            let mut response_headers = HeaderMap::new();
            insert_header(&mut response_headers, header::ETAG, &envelope.etag);
            insert_header(&mut response_headers, header::LAST_MODIFIED, &last_modified_header(envelope.record.modified_at_ms));
            insert_header(&mut response_headers, header::CONTENT_TYPE, "application/x-json-stream; type=directory");
            insert_custom_headers(&mut response_headers, &envelope.record.headers);
            Ok((StatusCode::OK, response_headers).into_response())
        }
        CurrentRecord::Object(envelope) => {
            let record = envelope.record;
            let mut response_headers = HeaderMap::new();
            insert_header(&mut response_headers, header::ETAG, &envelope.etag);
            insert_header(&mut response_headers, header::LAST_MODIFIED, &last_modified_header(record.modified_at_ms));
            insert_header(&mut response_headers, header::CONTENT_TYPE, &record.content_type);
            insert_header(&mut response_headers, header::CONTENT_LENGTH, &record.content_length.to_string());
            insert_header(
                &mut response_headers,
                header::HeaderName::from_static("computed-md5"),
                &record.content_hash,
            );
            insert_custom_headers(&mut response_headers, &record.headers);
            insert_header(&mut response_headers, header::ACCEPT_RANGES, "bytes");

            // Range validation (§2 "Object GET/DELETE pipeline"): resolve any
            // `Range` header against the record's declared length before
            // touching a replica, so an out-of-bounds range never costs a
            // network round trip.
            let range = match header_str(&headers, header::RANGE.as_str()) {
                Some(raw) => match parse_range_header(raw, record.content_length) {
                    Some(range) => Some(range),
                    None => {
                        insert_header(&mut response_headers, header::CONTENT_RANGE, &format!("bytes */{}", record.content_length));
                        return Ok((StatusCode::RANGE_NOT_SATISFIABLE, response_headers).into_response());
                    }
                },
                None => None,
            };
            if let Some(range) = &range {
                insert_header(
                    &mut response_headers,
                    header::CONTENT_RANGE,
                    &format!("bytes {}-{}/{}", range.start, range.end, record.content_length),
                );
                insert_header(&mut response_headers, header::CONTENT_LENGTH, &(range.end - range.start + 1).to_string());
            }

            if method == Method::HEAD {
                let status = if range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
                return Ok((status, response_headers).into_response());
            }

            let body = if record.content_length == 0 {
                Bytes::new()
            } else {
                fetch_from_any_replica(&state, &account, &record).await?
            };
            match range {
                Some(range) => {
                    let start = usize::try_from(range.start).unwrap_or(0).min(body.len());
                    let end = usize::try_from(range.end).unwrap_or(0).saturating_add(1).min(body.len());
                    Ok((StatusCode::PARTIAL_CONTENT, response_headers, body.slice(start..end)).into_response())
                }
                None => Ok((StatusCode::OK, response_headers, body).into_response()),
            }
        }
    }
}

/// Parsed `Range` header (`bytes=start-end`, `bytes=start-`, or `bytes=-suffix`).
#[derive(Debug, Clone, Copy)]
struct ByteRange {
    start: u64,
    end: u64,
}

/// Resolves a `Range` header against `total_size`, clamping an open-ended or
/// suffix range to the resource's actual length. Returns `None` for a range
/// this core considers unsatisfiable, which the caller turns into a 416.
fn parse_range_header(raw: &str, total_size: u64) -> Option<ByteRange> {
    let raw = raw.trim();
    let spec = raw.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    if total_size == 0 {
        return None;
    }

    if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        let start = total_size.saturating_sub(suffix_len.min(total_size));
        return Some(ByteRange { start, end: total_size - 1 });
    }

    let start: u64 = start_str.parse().ok()?;
    if start >= total_size {
        return None;
    }
    if end_str.is_empty() {
        return Some(ByteRange { start, end: total_size - 1 });
    }
    let end: u64 = end_str.parse().ok()?;
    if start > end {
        return None;
    }
    Some(ByteRange { start, end: end.min(total_size - 1) })
}

fn insert_header(map: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(value) = header::HeaderValue::from_str(value) {
        map.insert(name, value);
    }
}

fn insert_custom_headers(map: &mut HeaderMap, headers: &std::collections::HashMap<String, String>) {
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (header::HeaderName::try_from(name.as_str()), header::HeaderValue::from_str(value)) {
            map.insert(name, value);
        }
    }
}

async fn fetch_from_any_replica(
    state: &SharedState,
    account: &str,
    record: &quorumgate_metastore::ObjectRecord,
) -> GatewayResult<Bytes> {
    let object_id = uuid::Uuid::from_bytes(record.object_id);
    let upload_path = format!("/{account}/{object_id}");
    let topology = {
        let planner = state.placement.read().await;
        planner.topology().clone()
    };

    let mut last_err = None;
    for raw_id in &record.replica_set {
        let node_id = NodeId::from_bytes(*raw_id);
        let Some(node_info) = topology.get_node(node_id) else {
            continue;
        };
        let handle = quorumgate_shark::NodeHandle {
            node_id,
            address: node_info.address,
        };
        let http = state.sharks.client_for(node_id).await;
        match get_object(&http, &handle, &upload_path).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                tracing::warn!(error = %e, node = %node_id, "replica read failed, trying next replica");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or(CoreError::SharksExhausted).into())
}

#[cfg(test)]
mod range_tests {
    use super::*;

    #[test]
    fn test_simple_range() {
        let r = parse_range_header("bytes=0-99", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 99));
    }

    #[test]
    fn test_open_ended_range() {
        let r = parse_range_header("bytes=900-", 1000).unwrap();
        assert_eq!((r.start, r.end), (900, 999));
    }

    #[test]
    fn test_suffix_range() {
        let r = parse_range_header("bytes=-500", 1000).unwrap();
        assert_eq!((r.start, r.end), (500, 999));
    }

    #[test]
    fn test_suffix_range_larger_than_total_clamps_to_whole_object() {
        let r = parse_range_header("bytes=-5000", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn test_end_clamped_to_total_size() {
        let r = parse_range_header("bytes=0-5000", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 999));
    }

    #[test]
    fn test_start_past_end_of_object_is_unsatisfiable() {
        assert!(parse_range_header("bytes=1000-1001", 1000).is_none());
    }

    #[test]
    fn test_inverted_range_is_unsatisfiable() {
        assert!(parse_range_header("bytes=500-100", 1000).is_none());
    }

    #[test]
    fn test_non_bytes_unit_is_rejected() {
        assert!(parse_range_header("items=0-1", 1000).is_none());
    }

    #[test]
    fn test_zero_size_resource_has_no_satisfiable_range() {
        assert!(parse_range_header("bytes=0-0", 0).is_none());
    }
}
