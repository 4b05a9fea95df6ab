//! The gateway's injected-dependency application object (§9 "global singletons
//! → injected dependencies"): every shared resource is constructed once at
//! startup and handed to handlers by reference, never mutated as a global.

use quorumgate_auth::Authorizer;
use quorumgate_common::GatewayConfig;
use quorumgate_metastore::MetaStore;
use quorumgate_placement::PlacementPlanner;
use quorumgate_shark::ReplicaPool;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct AppState {
    pub config: GatewayConfig,
    pub meta: Arc<MetaStore>,
    /// Behind a lock because the background refresh task (§5) swaps in new
    /// topology snapshots; reads are far more frequent than refreshes.
    pub placement: RwLock<PlacementPlanner>,
    pub sharks: Arc<ReplicaPool>,
    pub authorizer: Arc<dyn Authorizer>,
}

pub type SharedState = Arc<AppState>;
