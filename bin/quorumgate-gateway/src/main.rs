//! Binary entry point: argument parsing, process wiring, and the listen loop.
//! The actual router and pipeline logic live in the library crate (`lib.rs`)
//! so end-to-end tests can assemble the same `AppState`/`Router` in-process.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use quorumgate_auth::{Authorizer, NoopAuthorizer};
use quorumgate_common::GatewayConfig;
use quorumgate_gateway::state::{AppState, SharedState};
use quorumgate_metastore::MetaStore;
use quorumgate_placement::PlacementPlanner;
use quorumgate_shark::ReplicaPool;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "quorumgate-gateway")]
#[command(about = "QuorumGate object-storage gateway")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML), layered under environment variables
    /// and built-in defaults; see `GatewayConfig::load`.
    #[arg(short, long, default_value = "/etc/quorumgate/gateway.toml")]
    config: String,

    /// Listen address override. Defaults to `0.0.0.0:<storage.network.insecure_port>`.
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory holding this reference metadata tier's redb shard files.
    #[arg(long, default_value = "/var/lib/quorumgate/meta")]
    meta_dir: PathBuf,

    /// Number of metadata shards to open (§4.3 "keys are hashed to shards deterministically").
    #[arg(long, default_value_t = 8)]
    meta_shards: usize,

    /// JSON file describing the initial storage-node topology (`ClusterTopology`),
    /// re-read on the interval given by `--topology-refresh-secs` to simulate
    /// the placement view's periodic refresh (§5 "init -> refresh-loop -> teardown").
    #[arg(long)]
    topology_file: Option<PathBuf>,

    /// Topology refresh interval, in seconds.
    #[arg(long, default_value_t = 30)]
    topology_refresh_secs: u64,

    /// Disable authentication (development mode); wires a `NoopAuthorizer`
    /// that accepts every request as the account owner. Never use in production.
    #[arg(long, default_value_t = false)]
    no_auth: bool,

    /// Log level, overridden by `RUST_LOG` if set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting quorumgate-gateway");

    let mut config = GatewayConfig::load(Some(&args.config)).context("loading gateway configuration")?;
    if let Some(listen) = &args.listen {
        let addr: SocketAddr = listen.parse().with_context(|| format!("invalid --listen address {listen}"))?;
        config.network.insecure_port = addr.port();
    }
    if config.storage.max_utilization_pct > config.storage.max_operator_utilization_pct {
        warn!(
            normal = config.storage.max_utilization_pct,
            operator = config.storage.max_operator_utilization_pct,
            reconciled = config.storage.reconciled_operator_utilization_pct(),
            "configured operator utilization ceiling is below the normal ceiling, raising it"
        );
    }

    std::fs::create_dir_all(&args.meta_dir).with_context(|| format!("creating metadata directory {}", args.meta_dir.display()))?;
    let meta = Arc::new(MetaStore::open(&args.meta_dir, args.meta_shards).context("opening metadata store")?);

    let topology = quorumgate_gateway::load_topology(args.topology_file.as_ref())?;
    let placement = RwLock::new(PlacementPlanner::new(topology));

    let sharks = Arc::new(ReplicaPool::new(config.network.connect_timeout, config.network.read_timeout));

    let authorizer: Arc<dyn Authorizer> = Arc::new(NoopAuthorizer);
    if !args.no_auth {
        warn!("no external authorizer is wired up yet; running with NoopAuthorizer regardless of --no-auth (see §10.5)");
    } else {
        info!("authentication is DISABLED (--no-auth, development mode)");
    }

    let app_state: SharedState = Arc::new(AppState {
        config,
        meta,
        placement,
        sharks,
        authorizer,
    });

    tokio::spawn(quorumgate_gateway::topology_refresh_loop(
        app_state.clone(),
        args.topology_file.clone(),
        Duration::from_secs(args.topology_refresh_secs.max(1)),
    ));

    let metrics_handle = Arc::new(
        PrometheusBuilder::new()
            .install_recorder()
            .context("installing Prometheus metrics recorder")?,
    );

    // The auth layer is what injects the `AuthContext` extension every
    // handler extracts, so it must be mounted in both modes -- `--no-auth`
    // only changes which `Authorizer` it wraps (see above), not whether it
    // runs at all.
    let router = quorumgate_gateway::build_router(app_state.clone(), metrics_handle, true);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_state.config.network.insecure_port));
    info!(%addr, "listening (plaintext HTTP; TLS termination is out of scope for this core, see DESIGN.md)");
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(quorumgate_gateway::shutdown_signal())
        .await
        .context("server error")?;

    info!("quorumgate-gateway shut down gracefully");
    Ok(())
}
