//! QuorumGate Placement - CRUSH-like replica-set placement
//!
//! Deterministic, datacenter-diversity-aware node selection for the
//! streaming PUT pipeline's fan-out stage: given an object size and a
//! replica count, produces an ordered list of candidate replica sets
//! honoring utilization thresholds.

pub mod crush;
pub mod planner;
pub mod topology;

pub use crush::CrushMap;
pub use planner::{PlacementPlanner, ReplicaDescriptor, ReplicaSet, CANDIDATE_SET_COUNT};
pub use topology::{ClusterTopology, NodeInfo, RackInfo};
