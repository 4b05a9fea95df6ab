//! Object PUT pipeline (§4.5): the core's central control flow. Every stage
//! short-circuits on failure; the ordering here is the spec's ordering,
//! unchanged, so a reviewer can check this function against §4.5's numbered
//! list line by line.

use super::headers::{custom_headers, durability_level, header_str, header_u64, normalize_copies};
use super::lookup::{CurrentRecord, lookup};
use crate::conditional::{self, ConditionalOutcome};
use crate::error::{GatewayError, GatewayResult};
use crate::shark_adapter::to_node_handles;
use crate::state::SharedState;
use axum::Extension;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use quorumgate_auth::AuthContext;
use quorumgate_common::{Error as CoreError, ObjectId, PathKey, now_millis};
use quorumgate_metastore::{Condition, DirectoryRecord, ObjectRecord, tables};
use quorumgate_shark::fan_out_put;
use std::time::{Duration, UNIX_EPOCH};

const OBJECT_ONLY_HEADERS: &[&str] = &["content-length", "content-md5", "durability-level"];

fn utilization_pct(state: &SharedState, ctx: &AuthContext) -> u8 {
    if ctx.is_operator {
        state.config.storage.reconciled_operator_utilization_pct()
    } else {
        state.config.storage.max_utilization_pct
    }
}

fn last_modified_header(mtime_ms: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_millis(mtime_ms))
}

pub async fn put_object(
    State(state): State<SharedState>,
    Path((account, object_path)): Path<(String, String)>,
    Extension(ctx): Extension<AuthContext>,
    headers: HeaderMap,
    body: Body,
) -> GatewayResult<Response> {
    let path_key = PathKey::new(format!("/{account}/{object_path}")).map_err(|e| CoreError::BadRequest(e.to_string()))?;

    let current = lookup(&state.meta, path_key.as_str())?;

    // Step 1: conditional-header evaluation against the current record, if any.
    let outcome = conditional::evaluate(
        &headers,
        &Method::PUT,
        current.as_ref().map(CurrentRecord::etag),
        current.as_ref().map(CurrentRecord::mtime_ms),
    )?;
    match outcome {
        ConditionalOutcome::PreconditionFailed(header) => {
            return Err(CoreError::PreconditionFailed(header.to_string()).into());
        }
        ConditionalOutcome::NotModified | ConditionalOutcome::Proceed => {}
    }

    // Step 2: reject attempts to PUT the root directory.
    if path_key.is_root() {
        return Err(CoreError::BadRequest("cannot PUT the account root".to_string()).into());
    }

    let is_directory_request = header_str(&headers, "content-type")
        .map(|ct| ct.to_lowercase().contains("type=directory"))
        .unwrap_or(false);

    if is_directory_request {
        put_directory(&state, &ctx, path_key.as_str(), &headers, current).map(IntoResponse::into_response)
    } else {
        put_object_bytes(&state, &ctx, &account, path_key.as_str(), &headers, current, body)
            .await
            .map(IntoResponse::into_response)
    }
}

fn put_directory(
    state: &SharedState,
    ctx: &AuthContext,
    path: &str,
    headers: &HeaderMap,
    current: Option<CurrentRecord>,
) -> GatewayResult<Response> {
    let requested_headers = custom_headers(headers);

    match current {
        Some(CurrentRecord::Object(_)) => {
            Err(CoreError::BadRequest("path already exists as an object".to_string()).into())
        }
        Some(CurrentRecord::Directory(existing)) => {
            for name in OBJECT_ONLY_HEADERS {
                if headers.contains_key(*name) {
                    return Err(CoreError::BadRequest(format!("{name} is not valid on a directory PUT")).into());
                }
            }
            if existing.record.headers == requested_headers {
                // No-op mkdir: metadata is byte-equal to prior, skip the write entirely.
                return Ok((
                    StatusCode::NO_CONTENT,
                    [
                        (header::ETAG, existing.etag.clone()),
                        (header::LAST_MODIFIED, last_modified_header(existing.record.modified_at_ms)),
                    ],
                )
                    .into_response());
            }
            let mtime = now_millis();
            let record = DirectoryRecord {
                path: path.to_string(),
                parent_path: existing.record.parent_path.clone(),
                owner: existing.record.owner.clone(),
                headers: requested_headers,
                modified_at_ms: mtime,
            };
            let etag = state
                .meta
                .put(tables::DIRECTORIES, path, &record, Condition::IfEtagEquals(existing.etag))?;
            Ok((
                StatusCode::NO_CONTENT,
                [(header::ETAG, etag), (header::LAST_MODIFIED, last_modified_header(mtime))],
            )
                .into_response())
        }
        None => {
            let parent = ensure_parent_directory(state, path)?;
            enforce_directory_limit(state, &parent)?;
            let mtime = now_millis();
            let record = DirectoryRecord {
                path: path.to_string(),
                parent_path: Some(parent),
                owner: ctx.owner.clone(),
                headers: requested_headers,
                modified_at_ms: mtime,
            };
            let etag = state.meta.put(tables::DIRECTORIES, path, &record, Condition::IfAbsent)?;
            Ok((
                StatusCode::NO_CONTENT,
                [(header::ETAG, etag), (header::LAST_MODIFIED, last_modified_header(mtime))],
            )
                .into_response())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn put_object_bytes(
    state: &SharedState,
    ctx: &AuthContext,
    account: &str,
    path: &str,
    headers: &HeaderMap,
    current: Option<CurrentRecord>,
    body: Body,
) -> GatewayResult<Response> {
    // Step 4: reject PUT-object onto an existing directory path.
    if matches!(current, Some(CurrentRecord::Directory(_))) {
        return Err(CoreError::BadRequest("path already exists as a directory".to_string()).into());
    }
    let prior_etag = current.as_ref().map(CurrentRecord::etag).map(str::to_string);

    // Step 3: parse arguments.
    let declared_length = header_u64(headers, "content-length")?;
    let max_content_length = header_u64(headers, "max-content-length")?
        .unwrap_or(state.config.storage.default_max_streaming_size_mb * 1024 * 1024);
    if let Some(declared) = declared_length {
        if declared > max_content_length {
            return Err(CoreError::MaxContentLength {
                size: declared,
                max: max_content_length,
            }
            .into());
        }
    }
    let copies = normalize_copies(durability_level(headers)?, state.config.max_object_copies)?;
    let object_id = ObjectId::new();

    // Step 5: ensure the parent directory record exists.
    let parent = ensure_parent_directory(state, path)?;
    // Step 6: enforce parent directory entry count.
    enforce_directory_limit(state, &parent)?;

    let limit = usize::try_from(max_content_length).unwrap_or(usize::MAX);
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| CoreError::MaxContentLength {
            size: max_content_length + 1,
            max: max_content_length,
        })?;

    let content_type = header_str(headers, "content-type").unwrap_or("application/octet-stream").to_string();
    let client_digest = header_str(headers, "content-md5").map(str::to_string);

    let (computed_digest, replica_ids) = if bytes.is_empty() {
        (quorumgate_common::ZERO_BYTE_DIGEST.to_string(), Vec::new())
    } else {
        // Step 7/8: placement then fan-out, retrying across candidate sets on failure.
        let sets = {
            let planner = state.placement.read().await;
            planner.plan(bytes.len() as u64, copies, utilization_pct(state, ctx))?
        };
        fan_out_with_failover(state, &sets, account, &object_id, &bytes).await?
    };

    if let Some(supplied) = &client_digest {
        if supplied != &computed_digest {
            return Err(CoreError::ChecksumMismatch {
                computed: computed_digest,
                supplied: supplied.clone(),
            }
            .into());
        }
    }

    let mtime = now_millis();
    let record = ObjectRecord {
        path: path.to_string(),
        object_id: *object_id.as_bytes(),
        content_length: bytes.len() as u64,
        content_hash: computed_digest.clone(),
        content_type,
        headers: custom_headers(headers),
        replica_set: replica_ids.iter().map(|id| *id.as_bytes()).collect(),
        owner: ctx.owner.clone(),
        created_at_ms: mtime,
        modified_at_ms: mtime,
    };

    // Step 9: persist conditional on the observed prior etag (or absent); never retry on mismatch.
    let cond = prior_etag.map_or(Condition::IfAbsent, Condition::IfEtagEquals);
    let etag = state.meta.put(tables::OBJECTS, path, &record, cond)?;

    Ok((
        StatusCode::NO_CONTENT,
        [
            (header::ETAG, etag),
            (header::LAST_MODIFIED, last_modified_header(mtime)),
            (header::HeaderName::from_static("computed-md5"), computed_digest),
        ],
    )
        .into_response())
}

async fn fan_out_with_failover(
    state: &SharedState,
    candidate_sets: &[quorumgate_placement::ReplicaSet],
    account: &str,
    object_id: &ObjectId,
    bytes: &Bytes,
) -> Result<(String, Vec<quorumgate_common::NodeId>), GatewayError> {
    let upload_path = format!("/{account}/{object_id}");
    let mut last_err = None;
    for set in candidate_sets {
        let handles = to_node_handles(set);
        match fan_out_put(&state.sharks, &handles, &upload_path, bytes.clone()).await {
            Ok(result) => return Ok((result.computed_digest, result.nodes)),
            Err(e) => {
                tracing::warn!(error = %e, "replica candidate set failed, abandoning and retrying next set");
                last_err = Some(e);
            }
        }
    }
    let _ = last_err;
    Err(CoreError::SharksExhausted.into())
}

/// Ensures the parent directory of `path` exists, returning its path.
/// Step 5 of §4.5: this checks existence, it does not create the directory —
/// object PUTs never auto-vivify ancestor directories.
fn ensure_parent_directory(state: &SharedState, path: &str) -> Result<String, GatewayError> {
    let key = PathKey::new(path).map_err(|e| CoreError::BadRequest(e.to_string()))?;
    let Some(parent) = key.parent() else {
        return Ok(String::new());
    };
    match lookup(&state.meta, parent.as_str())? {
        Some(CurrentRecord::Directory(_)) => Ok(parent.as_str().to_string()),
        Some(CurrentRecord::Object(_)) => Err(CoreError::BadRequest("parent path is an object, not a directory".to_string()).into()),
        None => Err(CoreError::ResourceNotFound(format!("parent directory {} does not exist", parent.as_str())).into()),
    }
}

fn enforce_directory_limit(state: &SharedState, parent: &str) -> Result<(), GatewayError> {
    if parent.is_empty() {
        return Ok(());
    }
    let count = state.meta.count_children(parent)?;
    if count >= 1_000_000 {
        return Err(CoreError::DirectoryLimit.into());
    }
    Ok(())
}

#[cfg(test)]
mod fan_out_failover_tests {
    use super::*;
    use quorumgate_auth::NoopAuthorizer;
    use quorumgate_metastore::MetaStore;
    use quorumgate_placement::topology::FailureDomainInfo;
    use quorumgate_placement::{NodeInfo, PlacementPlanner, ReplicaDescriptor};
    use quorumgate_shark::ReplicaPool;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::RwLock;

    fn node_at(addr: SocketAddr) -> NodeInfo {
        NodeInfo {
            id: quorumgate_common::NodeId::new(),
            name: "node".to_string(),
            address: addr,
            failure_domain: FailureDomainInfo::new("region1", "dc1", "rack1"),
            status: quorumgate_common::NodeStatus::Active,
            total_capacity: 1,
            used_capacity: 0,
            weight: 1.0,
            last_heartbeat: 0,
        }
    }

    /// Reserves a loopback port and immediately stops listening on it, so a
    /// connection attempt reliably fails with connection-refused.
    async fn dead_address() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    async fn spawn_put_only_shark() -> SocketAddr {
        use axum::Router;
        use axum::body::Bytes;
        use axum::extract::Path;
        use axum::http::HeaderName;

        async fn handler(Path(_path): Path<String>, body: Bytes) -> impl IntoResponse {
            let computed = quorumgate_common::digest(&body);
            (StatusCode::OK, [(HeaderName::from_static("x-joyent-computed-content-md5"), computed)])
        }

        let router = Router::new().route("/{*path}", axum::routing::put(handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn test_state() -> SharedState {
        let dir = tempfile::tempdir().unwrap();
        let meta = std::sync::Arc::new(MetaStore::open(dir.path(), 1).unwrap());
        std::sync::Arc::new(crate::state::AppState {
            config: quorumgate_common::GatewayConfig::default(),
            meta,
            placement: RwLock::new(PlacementPlanner::new(quorumgate_placement::ClusterTopology::new())),
            sharks: std::sync::Arc::new(ReplicaPool::new(Duration::from_millis(200), Duration::from_secs(5))),
            authorizer: std::sync::Arc::new(NoopAuthorizer),
        })
    }

    #[tokio::test]
    async fn test_fan_out_abandons_dead_set_and_uses_next() {
        let state = test_state().await;
        let dead = dead_address().await;
        let good = spawn_put_only_shark().await;

        let bad_set: ReplicaSet = vec![ReplicaDescriptor { node: node_at(dead) }];
        let good_set: ReplicaSet = vec![ReplicaDescriptor { node: node_at(good) }];
        let sets = vec![bad_set, good_set];

        let object_id = ObjectId::new();
        let bytes = Bytes::from_static(b"hello");
        let (digest, nodes) = fan_out_with_failover(&state, &sets, "acct", &object_id, &bytes).await.unwrap();

        assert_eq!(digest, "XUFAKrxLKna5cZ2REBfFkg==");
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_exhausted_when_every_set_fails() {
        let state = test_state().await;
        let dead_a = dead_address().await;
        let dead_b = dead_address().await;

        let sets = vec![
            vec![ReplicaDescriptor { node: node_at(dead_a) }],
            vec![ReplicaDescriptor { node: node_at(dead_b) }],
        ];

        let object_id = ObjectId::new();
        let bytes = Bytes::from_static(b"hello");
        let err = fan_out_with_failover(&state, &sets, "acct", &object_id, &bytes).await.unwrap_err();
        assert!(matches!(err.0, CoreError::SharksExhausted));
    }
}
