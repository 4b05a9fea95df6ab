//! Bridges the placement planner's `ReplicaSet` (topology-level `NodeInfo`)
//! to the shark client's `NodeHandle` (just the id and address it needs to
//! open a connection) — kept as a free function rather than a `From` impl so
//! neither crate needs to depend on the other's concrete type.

use quorumgate_placement::ReplicaSet;
use quorumgate_shark::NodeHandle;

#[must_use]
pub fn to_node_handles(set: &ReplicaSet) -> Vec<NodeHandle> {
    set.iter()
        .map(|descriptor| NodeHandle {
            node_id: descriptor.node.id,
            address: descriptor.node.address,
        })
        .collect()
}
