//! Cluster topology representation: the placement planner's view of the
//! storage node fleet, refreshed periodically from the metadata tier.

use quorumgate_common::{FailureDomain, NodeId, NodeStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Cluster topology containing all storage nodes organized by failure domain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Version number, incremented on every mutation.
    pub version: u64,
    pub regions: HashMap<String, RegionInfo>,
}

impl ClusterTopology {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.regions.values().flat_map(|r| {
            r.datacenters
                .values()
                .flat_map(|dc| dc.racks.values().flat_map(|rack| rack.nodes.values()))
        })
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&NodeInfo> {
        self.all_nodes().find(|n| n.id == node_id)
    }

    /// Active nodes under the given utilization ceiling.
    pub fn eligible_nodes(&self, max_utilization_pct: u8) -> impl Iterator<Item = &NodeInfo> {
        self.all_nodes()
            .filter(move |n| n.status == NodeStatus::Active && n.utilization_pct() <= max_utilization_pct)
    }

    pub fn upsert_node(&mut self, node: NodeInfo) {
        let region = self
            .regions
            .entry(node.failure_domain.region.clone())
            .or_insert_with(|| RegionInfo::new(&node.failure_domain.region));

        let dc = region
            .datacenters
            .entry(node.failure_domain.datacenter.clone())
            .or_insert_with(|| DatacenterInfo::new(&node.failure_domain.datacenter));

        let rack = dc
            .racks
            .entry(node.failure_domain.rack.clone())
            .or_insert_with(|| RackInfo::new(&node.failure_domain.rack));

        rack.nodes.insert(node.id, node);
        self.version += 1;
    }

    pub fn remove_node(&mut self, node_id: NodeId) -> Option<NodeInfo> {
        for region in self.regions.values_mut() {
            for dc in region.datacenters.values_mut() {
                for rack in dc.racks.values_mut() {
                    if let Some(node) = rack.nodes.remove(&node_id) {
                        self.version += 1;
                        return Some(node);
                    }
                }
            }
        }
        None
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionInfo {
    pub name: String,
    pub datacenters: HashMap<String, DatacenterInfo>,
}

impl RegionInfo {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            datacenters: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatacenterInfo {
    pub name: String,
    pub racks: HashMap<String, RackInfo>,
}

impl DatacenterInfo {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            racks: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RackInfo {
    pub name: String,
    pub nodes: HashMap<NodeId, NodeInfo>,
}

impl RackInfo {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: HashMap::new(),
        }
    }
}

/// A storage node ("shark") as seen by the placement planner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    /// HTTP endpoint used by the storage-node client.
    pub address: SocketAddr,
    pub failure_domain: FailureDomainInfo,
    pub status: NodeStatus,
    pub total_capacity: u64,
    pub used_capacity: u64,
    /// Relative placement weight; higher receives proportionally more objects.
    pub weight: f64,
    pub last_heartbeat: u64,
}

impl NodeInfo {
    #[must_use]
    pub fn available_capacity(&self) -> u64 {
        self.total_capacity.saturating_sub(self.used_capacity)
    }

    #[must_use]
    pub fn has_capacity(&self, size: u64) -> bool {
        self.available_capacity() >= size
    }

    /// Integer utilization percentage, `0` when capacity is unknown.
    #[must_use]
    pub fn utilization_pct(&self) -> u8 {
        if self.total_capacity == 0 {
            return 0;
        }
        let pct = (self.used_capacity.saturating_mul(100) / self.total_capacity).min(100);
        u8::try_from(pct).unwrap_or(100)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureDomainInfo {
    pub region: String,
    pub datacenter: String,
    pub rack: String,
}

impl FailureDomainInfo {
    #[must_use]
    pub fn new(region: &str, datacenter: &str, rack: &str) -> Self {
        Self {
            region: region.to_string(),
            datacenter: datacenter.to_string(),
            rack: rack.to_string(),
        }
    }

    #[must_use]
    pub fn at_level(&self, level: FailureDomain) -> &str {
        match level {
            FailureDomain::Node => "",
            FailureDomain::Rack => &self.rack,
            FailureDomain::Datacenter => &self.datacenter,
            FailureDomain::Region => &self.region,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_add_node() {
        let mut topology = ClusterTopology::new();

        let node = NodeInfo {
            id: NodeId::new(),
            name: "node1".to_string(),
            address: "127.0.0.1:9001".parse().unwrap(),
            failure_domain: FailureDomainInfo::new("us-east", "dc1", "rack1"),
            status: NodeStatus::Active,
            total_capacity: 0,
            used_capacity: 0,
            weight: 1.0,
            last_heartbeat: 0,
        };

        topology.upsert_node(node.clone());

        assert_eq!(topology.version, 1);
        assert!(topology.get_node(node.id).is_some());
    }

    #[test]
    fn test_utilization_pct() {
        let node = NodeInfo {
            id: NodeId::new(),
            name: "node1".to_string(),
            address: "127.0.0.1:9001".parse().unwrap(),
            failure_domain: FailureDomainInfo::new("us-east", "dc1", "rack1"),
            status: NodeStatus::Active,
            total_capacity: 1000,
            used_capacity: 950,
            weight: 1.0,
            last_heartbeat: 0,
        };
        assert_eq!(node.utilization_pct(), 95);
    }
}
