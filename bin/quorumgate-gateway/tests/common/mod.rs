//! Shared test harness for the gateway's end-to-end pipeline tests (§10.6):
//! an in-process mock storage node ("shark") plus helpers to assemble the
//! same `AppState`/`Router` the real binary builds, without a live cluster.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use quorumgate_auth::{AuthContext, NoopAuthorizer};
use quorumgate_common::{GatewayConfig, digest, now_millis};
use quorumgate_metastore::{Condition, DirectoryRecord, MetaStore, tables};
use quorumgate_placement::ClusterTopology;
use quorumgate_placement::topology::FailureDomainInfo;
use quorumgate_common::{NodeId, NodeStatus};
use quorumgate_placement::{NodeInfo, PlacementPlanner};
use quorumgate_shark::ReplicaPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

const COMPUTED_MD5_HEADER: &str = "x-joyent-computed-content-md5";

type BlobStore = Arc<Mutex<HashMap<String, Bytes>>>;

/// Spawns an in-process mock storage node speaking the two RPC shapes the
/// shark client depends on (object put/get, and MPU finalize), backed by an
/// in-memory map rather than a real disk.
pub async fn spawn_mock_shark() -> SocketAddr {
    let store: BlobStore = Arc::new(Mutex::new(HashMap::new()));
    let router = Router::new()
        .route("/{*path}", put(shark_put).get(shark_get))
        .route("/mpu/v1/commit/{id}", post(shark_commit))
        .with_state(store);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("binding mock shark listener");
    let addr = listener.local_addr().expect("mock shark has a local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock shark server");
    });
    addr
}

async fn shark_put(Path(path): Path<String>, State(store): State<BlobStore>, body: Bytes) -> impl IntoResponse {
    let computed = digest(&body);
    store.lock().expect("mock shark store lock").insert(format!("/{path}"), body);
    (StatusCode::OK, [(HeaderName::from_static(COMPUTED_MD5_HEADER), computed)])
}

async fn shark_get(Path(path): Path<String>, State(store): State<BlobStore>) -> impl IntoResponse {
    let key = format!("/{path}");
    match store.lock().expect("mock shark store lock").get(&key).cloned() {
        Some(bytes) => (StatusCode::OK, bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Finalizes an MPU by concatenating whatever part bytes were previously PUT
/// under paths ending in `/<upload-id>/<part-number>`, in part order — a real
/// storage node recovers this from its own upload directory; the mock just
/// scans its map for the same suffix.
async fn shark_commit(Path(id): Path<String>, State(store): State<BlobStore>, axum::Json(body): axum::Json<serde_json::Value>) -> impl IntoResponse {
    let account = body.get("account").and_then(serde_json::Value::as_str).unwrap_or_default();
    let object_id = body.get("objectId").and_then(serde_json::Value::as_str).unwrap_or_default();
    let part_count = body.get("parts").and_then(serde_json::Value::as_array).map_or(0, Vec::len);

    let mut assembled = Vec::new();
    {
        let guard = store.lock().expect("mock shark store lock");
        for part_number in 0..part_count {
            let suffix = format!("/{id}/{part_number}");
            if let Some((_, bytes)) = guard.iter().find(|(key, _)| key.ends_with(&suffix)) {
                assembled.extend_from_slice(bytes);
            }
        }
    }
    let computed = digest(&assembled);
    let object_path = format!("/{account}/{object_id}");
    store.lock().expect("mock shark store lock").insert(object_path, Bytes::from(assembled));

    (StatusCode::OK, [(HeaderName::from_static(COMPUTED_MD5_HEADER), computed)])
}

/// Builds a topology of `count` active nodes, spread round-robin across three
/// datacenters for diversity, all reachable at `addr` (typically the mock
/// shark's address — a real deployment would give each node its own).
#[must_use]
pub fn topology_all_at(addr: SocketAddr, count: usize) -> ClusterTopology {
    let mut topology = ClusterTopology::new();
    for i in 0..count {
        topology.upsert_node(NodeInfo {
            id: NodeId::new(),
            name: format!("node-{i}"),
            address: addr,
            failure_domain: FailureDomainInfo::new("region1", &format!("dc{}", i % 3), &format!("rack{}", i % 2)),
            status: NodeStatus::Active,
            total_capacity: 1_000_000_000,
            used_capacity: 0,
            weight: 1.0,
            last_heartbeat: 0,
        });
    }
    topology
}

/// Opens a fresh, single-shard metadata store under a temp directory kept
/// alive by the returned `TempDir` (drop it last so the shard files outlive
/// the store).
pub fn open_test_metastore() -> (tempfile::TempDir, Arc<MetaStore>) {
    let dir = tempfile::tempdir().expect("creating temp metadata dir");
    let store = MetaStore::open(dir.path(), 1).expect("opening test metadata store");
    (dir, Arc::new(store))
}

/// Creates the account's root directory record, the invariant object PUTs
/// depend on for their parent-exists check (§4.5 step 5).
pub fn bootstrap_account_root(meta: &MetaStore, account: &str) {
    let path = format!("/{account}");
    meta.put(
        tables::DIRECTORIES,
        &path,
        &DirectoryRecord {
            path: path.clone(),
            parent_path: None,
            owner: account.to_string(),
            headers: HashMap::new(),
            modified_at_ms: now_millis(),
        },
        Condition::IfAbsent,
    )
    .expect("bootstrapping account root directory");
}

#[must_use]
pub fn build_state(meta: Arc<MetaStore>, topology: ClusterTopology) -> quorumgate_gateway::state::SharedState {
    Arc::new(quorumgate_gateway::state::AppState {
        config: GatewayConfig::default(),
        meta,
        placement: RwLock::new(PlacementPlanner::new(topology)),
        sharks: Arc::new(ReplicaPool::new(Duration::from_secs(2), Duration::from_secs(5))),
        authorizer: Arc::new(NoopAuthorizer),
    })
}

/// The gateway's Prometheus recorder can only be installed once per process;
/// every test that needs a `Router` shares this one handle.
pub fn shared_metrics_handle() -> Arc<metrics_exporter_prometheus::PrometheusHandle> {
    static HANDLE: OnceLock<Arc<metrics_exporter_prometheus::PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            Arc::new(
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .install_recorder()
                    .expect("installing test metrics recorder"),
            )
        })
        .clone()
}

/// Builds an authenticated request with `ctx` inserted as an extension, the
/// same way `auth_middleware::auth_layer` would after a real authorization
/// call — tests build the router with `enable_auth: false` and inject the
/// context directly instead.
pub fn authed_request(
    method: axum::http::Method,
    uri: &str,
    ctx: AuthContext,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(axum::body::Body::from(body)).expect("building test request");
    request.extensions_mut().insert(ctx);
    request
}
