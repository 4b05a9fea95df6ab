//! Storage-node ("shark") connection pool.
//!
//! Mirrors the gateway's OSD connection pool: a cache of per-node HTTP
//! clients keyed by node id, built lazily and reused across requests.
//! Unlike a gRPC channel pool, a `reqwest::Client` is itself a connection
//! pool, so "connecting" here means constructing the client with this
//! node's timeout policy the first time it's addressed, then caching it.

use quorumgate_common::NodeId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
pub struct NodeHandle {
    pub node_id: NodeId,
    pub address: SocketAddr,
}

/// Pool of per-node HTTP clients for the storage-node protocol.
pub struct ReplicaPool {
    clients: RwLock<HashMap<NodeId, reqwest::Client>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ReplicaPool {
    #[must_use]
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            connect_timeout,
            read_timeout,
        }
    }

    /// Returns the cached client for `node_id`, building and inserting one
    /// if absent. Double-checks after re-acquiring the write lock so a
    /// client is never built twice for the same node under contention.
    pub async fn client_for(&self, node_id: NodeId) -> reqwest::Client {
        if let Some(client) = self.clients.read().await.get(&node_id) {
            return client.clone();
        }

        let built = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .build()
            .expect("reqwest client config is valid");

        let mut clients = self.clients.write().await;
        if let Some(existing) = clients.get(&node_id) {
            return existing.clone();
        }
        clients.insert(node_id, built.clone());
        built
    }

    pub async fn evict(&self, node_id: NodeId) {
        self.clients.write().await.remove(&node_id);
    }

    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_for_caches_per_node() {
        let pool = ReplicaPool::new(Duration::from_secs(1), Duration::from_secs(5));
        let node = NodeId::new();
        let a = pool.client_for(node).await;
        let b = pool.client_for(node).await;
        assert_eq!(pool.connected_count().await, 1);
        drop((a, b));
    }
}
