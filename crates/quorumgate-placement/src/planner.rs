//! Replica-set placement planning.
//!
//! `plan` produces an ordered list of candidate replica sets for the
//! streaming PUT pipeline's fan-out stage: the gateway writes to the
//! first set, and on any single-replica failure abandons it and retries
//! with the next, so the candidate sets must be drawn from
//! non-overlapping-where-possible node pools.

use crate::crush::CrushMap;
use crate::topology::{ClusterTopology, NodeInfo};
use quorumgate_common::{Error, FailureDomain, ObjectId, Result};

/// Number of candidate replica sets the planner produces per object.
///
/// Three primary/secondary/tertiary tuples cover failover across three
/// datacenters while keeping planning bounded.
pub const CANDIDATE_SET_COUNT: usize = 3;

#[derive(Clone, Debug)]
pub struct ReplicaDescriptor {
    pub node: NodeInfo,
}

pub type ReplicaSet = Vec<ReplicaDescriptor>;

pub struct PlacementPlanner {
    crush: CrushMap,
}

impl PlacementPlanner {
    #[must_use]
    pub fn new(topology: ClusterTopology) -> Self {
        Self {
            crush: CrushMap::new(topology),
        }
    }

    pub fn update_topology(&mut self, topology: ClusterTopology) {
        self.crush.update_topology(topology);
    }

    #[must_use]
    pub fn topology(&self) -> &ClusterTopology {
        self.crush.topology()
    }

    /// Produce up to [`CANDIDATE_SET_COUNT`] ordered candidate replica sets
    /// of `copies` nodes each, honoring datacenter diversity and the
    /// utilization ceiling. Zero-byte objects carry no replica set.
    ///
    /// # Errors
    /// Returns [`Error::NotEnoughSpace`] if not even a single candidate set
    /// of `copies` distinct nodes can be formed.
    pub fn plan(&self, size: u64, copies: u32, max_utilization_pct: u8) -> Result<Vec<ReplicaSet>> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let copies = copies as usize;
        let mut sets = Vec::with_capacity(CANDIDATE_SET_COUNT);

        for attempt in 0..CANDIDATE_SET_COUNT {
            let object_id = seeded_object_id(size, copies, attempt);
            let node_ids = self
                .crush
                .select_nodes(&object_id, copies, FailureDomain::Datacenter, max_utilization_pct);

            if node_ids.len() < copies {
                continue;
            }

            let set: ReplicaSet = node_ids
                .into_iter()
                .filter_map(|id| self.crush.topology().get_node(id).cloned())
                .map(|node| ReplicaDescriptor { node })
                .collect();

            if set.len() == copies {
                sets.push(set);
            }
        }

        if sets.is_empty() {
            let available = self
                .crush
                .topology()
                .eligible_nodes(max_utilization_pct)
                .count();
            return Err(Error::NotEnoughSpace {
                available,
                required: copies,
            });
        }

        Ok(sets)
    }
}

/// Derives a distinct deterministic placement seed per attempt so the
/// three candidate sets are drawn from different points in hash order
/// rather than being identical copies of the same selection.
fn seeded_object_id(size: u64, copies: usize, attempt: usize) -> ObjectId {
    let seed = xxhash_rust::xxh64::xxh64(
        &[size.to_le_bytes().as_slice(), &copies.to_le_bytes(), &attempt.to_le_bytes()].concat(),
        attempt as u64,
    );
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&(seed ^ attempt as u64).to_le_bytes());
    ObjectId::from_uuid(uuid::Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::FailureDomainInfo;
    use quorumgate_common::{NodeId, NodeStatus};

    fn topology_with_datacenters(count: usize) -> ClusterTopology {
        let mut topology = ClusterTopology::new();
        for dc in 0..count {
            for node_num in 0..3 {
                let node = NodeInfo {
                    id: NodeId::new(),
                    name: format!("dc{dc}-node{node_num}"),
                    address: "127.0.0.1:9000".parse().unwrap(),
                    failure_domain: FailureDomainInfo::new("region-a", &format!("dc{dc}"), "rack0"),
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
    fn test_zero_byte_object_has_no_plan() {
        let planner = PlacementPlanner::new(topology_with_datacenters(3));
        let sets = planner.plan(0, 3, 90).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn test_plan_produces_three_candidate_sets() {
        let planner = PlacementPlanner::new(topology_with_datacenters(3));
        let sets = planner.plan(1024, 3, 90).unwrap();
        assert_eq!(sets.len(), 3);
        for set in &sets {
            assert_eq!(set.len(), 3);
        }
    }

    #[test]
    fn test_not_enough_space_when_below_copies() {
        let planner = PlacementPlanner::new(ClusterTopology::new());
        let err = planner.plan(1024, 3, 90).unwrap_err();
        assert!(matches!(err, Error::NotEnoughSpace { .. }));
    }

    #[test]
    fn test_plan_excludes_over_utilized_nodes() {
        let mut topology = topology_with_datacenters(3);
        for node in topology
            .regions
            .values_mut()
            .flat_map(|r| r.datacenters.values_mut())
            .flat_map(|dc| dc.racks.values_mut())
            .flat_map(|rack| rack.nodes.values_mut())
        {
            node.used_capacity = node.total_capacity;
        }
        let planner = PlacementPlanner::new(topology);
        let err = planner.plan(1024, 3, 90).unwrap_err();
        assert!(matches!(err, Error::NotEnoughSpace { .. }));
    }
}
