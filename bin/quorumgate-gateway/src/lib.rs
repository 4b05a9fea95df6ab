//! QuorumGate Gateway - object-storage front-end
//!
//! Accepts HTTP requests, authenticates and authorizes them, places object
//! bytes onto a quorum of storage nodes spread across datacenters, and
//! persists object/directory metadata in a sharded metadata tier. Also
//! implements the multipart upload (MPU) protocol described in §4.6.
//!
//! Exposed as a library, not just a binary, so end-to-end pipeline tests
//! (§10.6) can assemble an in-process [`AppState`] and [`build_router`]
//! against it without shelling out to a built binary.

pub mod auth_middleware;
pub mod conditional;
pub mod error;
pub mod metrics_middleware;
pub mod mpu;
pub mod pipeline;
pub mod shark_adapter;
pub mod state;

use anyhow::{Context, Result};
use auth_middleware::auth_layer;
use axum::extract::DefaultBodyLimit;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, head, post, put};
use axum::{Router, middleware};
use quorumgate_placement::ClusterTopology;
use state::SharedState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Prometheus metrics endpoint handler (§10.2), mounted unauthenticated.
pub async fn metrics_handler(registry: Arc<metrics_exporter_prometheus::PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        registry.render(),
    )
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Loads the initial placement topology from `path`, or an empty topology
/// (every `plan()` call fails with `NotEnoughSpace`) if none is given.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_topology(path: Option<&PathBuf>) -> Result<ClusterTopology> {
    let Some(path) = path else {
        warn!("no --topology-file given; starting with an empty placement view (every plan() call will fail with NotEnoughSpace)");
        return Ok(ClusterTopology::new());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading topology file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing topology file {}", path.display()))
}

/// Periodically re-reads the topology file and swaps it into the planner,
/// per §5's "placement view is refreshed by a background task with lifecycle
/// init -> refresh-loop -> teardown". Runs until the process exits; there is
/// no explicit teardown signal beyond the task being dropped at shutdown.
pub async fn topology_refresh_loop(state: SharedState, path: Option<PathBuf>, interval: Duration) {
    let Some(path) = path else { return };
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match load_topology(Some(&path)) {
            Ok(topology) => {
                let mut planner = state.placement.write().await;
                planner.update_topology(topology);
                drop(planner);
                tracing::debug!("refreshed placement topology from {}", Path::display(&path));
            }
            Err(e) => {
                warn!(error = %e, "failed to refresh placement topology, keeping previous view");
            }
        }
    }
}

/// Assembles the full axum [`Router`]: the object/directory HTTP surface,
/// the MPU surface, and the unauthenticated `/health`/`/metrics` endpoints,
/// with the metrics and tracing middleware layered in and the auth layer
/// mounted only when `enable_auth` is set (tests typically pass `false` and
/// inject an `AuthContext` directly, or wire a [`quorumgate_auth::NoopAuthorizer`]).
#[must_use]
pub fn build_router(state: SharedState, metrics_handle: Arc<metrics_exporter_prometheus::PrometheusHandle>, enable_auth: bool) -> Router {
    let object_routes = Router::new()
        .route("/{*path}", put(pipeline::put::put_object))
        .route("/{*path}", get(pipeline::get::get_object_handler))
        .route("/{*path}", head(pipeline::get::head_object_handler))
        .route("/{*path}", axum::routing::delete(pipeline::delete::delete_object_handler));

    let upload_routes = Router::new()
        .route("/uploads", post(mpu::create::create_upload_handler))
        .route("/uploads/{id}", get(mpu::redirect::redirect_upload_handler))
        .route("/uploads/{id}", head(mpu::redirect::redirect_upload_handler))
        .route("/uploads/{id}", post(mpu::redirect::redirect_upload_handler))
        .route("/uploads/{id}/{part_num}", get(mpu::redirect::redirect_upload_part_handler))
        .route("/uploads/{id}/{part_num}", head(mpu::redirect::redirect_upload_part_handler))
        .route("/uploads/{id}/{part_num}", post(mpu::redirect::redirect_upload_part_handler))
        .route("/uploads/{prefix}/{id}/state", get(mpu::state::upload_state_handler))
        .route("/uploads/{prefix}/{id}/abort", post(mpu::abort::abort_upload_handler))
        .route("/uploads/{prefix}/{id}/commit", post(mpu::commit::commit_upload_handler))
        .route("/uploads/{prefix}/{id}/{part_num}", put(mpu::upload_part::upload_part_handler));

    let account_routes = Router::new().nest("/{account}", upload_routes.merge(object_routes));

    let app = Router::new()
        .route("/metrics", get(move || metrics_handler(metrics_handle.clone())))
        .route("/health", get(health_handler))
        .merge(account_routes)
        .layer(DefaultBodyLimit::max(
            usize::try_from(state.config.storage.default_max_streaming_size_mb * 1024 * 1024).unwrap_or(usize::MAX),
        ))
        .layer(middleware::from_fn(metrics_middleware::metrics_layer))
        .layer(TraceLayer::new_for_http());

    let app = if enable_auth {
        app.layer(middleware::from_fn_with_state(state.clone(), auth_layer))
    } else {
        app
    };

    app.with_state(state)
}

/// Waits for either Ctrl-C or `SIGHUP` (§6 "`SIGHUP` triggers graceful exit").
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let hangup = async {
        let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
            std::future::pending::<()>().await;
            return;
        };
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        () = hangup => tracing::info!("received SIGHUP, shutting down"),
    }
}
