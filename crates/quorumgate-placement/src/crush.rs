//! CRUSH-like deterministic node selection.
//!
//! Given an object id and a desired replica count, picks that many
//! storage nodes by a weighted, deterministic hash — the same object id
//! always yields the same node list for a given topology snapshot — while
//! spreading replicas across distinct failure domains whenever enough
//! domains have capacity.

use crate::topology::{ClusterTopology, NodeInfo};
use quorumgate_common::{FailureDomain, NodeId, ObjectId};
use std::collections::HashSet;

/// CRUSH map for storage-node selection, wrapping a topology snapshot.
pub struct CrushMap {
    topology: ClusterTopology,
}

impl CrushMap {
    #[must_use]
    pub fn new(topology: ClusterTopology) -> Self {
        Self { topology }
    }

    pub fn update_topology(&mut self, topology: ClusterTopology) {
        self.topology = topology;
    }

    #[must_use]
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Select `count` nodes under `max_utilization_pct`, ensuring that
    /// selections are spread across the failure domain level specified.
    ///
    /// First pass: one node per distinct domain, in hash order. Second
    /// pass, only reached if the cluster has fewer distinct domains than
    /// `count`: fills remaining slots allowing domain repeats.
    #[must_use]
    pub fn select_nodes(
        &self,
        object_id: &ObjectId,
        count: usize,
        failure_domain: FailureDomain,
        max_utilization_pct: u8,
    ) -> Vec<NodeId> {
        let hash = hash_object(object_id);
        let mut selected = Vec::with_capacity(count);
        let mut used_domains: HashSet<String> = HashSet::new();

        let mut candidates: Vec<(&NodeInfo, u64)> = self
            .topology
            .eligible_nodes(max_utilization_pct)
            .map(|node| (node, weighted_hash(hash, node)))
            .collect();

        candidates.sort_by_key(|(_, h)| *h);

        for (node, _) in &candidates {
            if selected.len() >= count {
                break;
            }

            let domain_key = get_domain_key(node, failure_domain);
            if !used_domains.contains(&domain_key) {
                selected.push(node.id);
                used_domains.insert(domain_key);
            }
        }

        if selected.len() < count {
            for (node, _) in &candidates {
                if selected.len() >= count {
                    break;
                }
                if !selected.contains(&node.id) {
                    selected.push(node.id);
                }
            }
        }

        selected
    }
}

fn hash_object(object_id: &ObjectId) -> u64 {
    xxhash_rust::xxh64::xxh64(object_id.as_bytes(), 0)
}

fn weighted_hash(base_hash: u64, node: &NodeInfo) -> u64 {
    let node_hash = xxhash_rust::xxh64::xxh64(node.id.as_bytes(), 0);
    let weight_factor = (node.weight * 1000.0) as u64;
    base_hash.wrapping_mul(node_hash).wrapping_add(weight_factor)
}

fn get_domain_key(node: &NodeInfo, level: FailureDomain) -> String {
    match level {
        FailureDomain::Node => node.id.to_string(),
        FailureDomain::Rack => format!(
            "{}:{}:{}",
            node.failure_domain.region, node.failure_domain.datacenter, node.failure_domain.rack
        ),
        FailureDomain::Datacenter => format!(
            "{}:{}",
            node.failure_domain.region, node.failure_domain.datacenter
        ),
        FailureDomain::Region => node.failure_domain.region.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::FailureDomainInfo;
    use quorumgate_common::NodeStatus;

    fn create_test_topology() -> ClusterTopology {
        let mut topology = ClusterTopology::new();

        for rack_num in 1..=3 {
            for node_num in 1..=2 {
                let node = NodeInfo {
                    id: NodeId::new(),
                    name: format!("node-{rack_num}-{node_num}"),
                    address: format!("127.0.0.{rack_num}:900{node_num}").parse().unwrap(),
                    failure_domain: FailureDomainInfo::new("us-east", "dc1", &format!("rack{rack_num}")),
                    status: NodeStatus::Active,
                    total_capacity: 1_000_000,
                    used_capacity: 100_000,
                    weight: 1.0,
                    last_heartbeat: 0,
                };
                topology.upsert_node(node);
            }
        }

        topology
    }

    #[test]
    fn test_select_nodes_rack_diversity() {
        let topology = create_test_topology();
        let crush = CrushMap::new(topology);

        let object_id = ObjectId::new();
        let nodes = crush.select_nodes(&object_id, 3, FailureDomain::Rack, 90);

        assert_eq!(nodes.len(), 3);
        let unique: HashSet<_> = nodes.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_deterministic_placement() {
        let topology = create_test_topology();
        let crush = CrushMap::new(topology);

        let object_id = ObjectId::new();

        let nodes1 = crush.select_nodes(&object_id, 3, FailureDomain::Rack, 90);
        let nodes2 = crush.select_nodes(&object_id, 3, FailureDomain::Rack, 90);

        assert_eq!(nodes1, nodes2);
    }

    #[test]
    fn test_utilization_filter_excludes_full_nodes() {
        let mut topology = create_test_topology();
        for node in topology.all_nodes().map(|n| n.id).collect::<Vec<_>>() {
            if let Some(n) = topology
                .regions
                .values_mut()
                .flat_map(|r| r.datacenters.values_mut())
                .flat_map(|dc| dc.racks.values_mut())
                .flat_map(|rack| rack.nodes.values_mut())
                .find(|n| n.id == node)
            {
                n.used_capacity = n.total_capacity;
            }
        }
        let crush = CrushMap::new(topology);
        let nodes = crush.select_nodes(&ObjectId::new(), 3, FailureDomain::Rack, 90);
        assert!(nodes.is_empty());
    }
}
