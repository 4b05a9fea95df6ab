//! QuorumGate Shark - HTTP client for storage nodes
//!
//! Implements the two request shapes the gateway core depends on against
//! a storage node ("shark"): the streaming object PUT and the MPU
//! finalize RPC, plus the N-way parallel fan-out used by the PUT
//! pipeline and the commit coordinator.

pub mod client;
pub mod fanout;
pub mod pool;

pub use client::{FinalizeRequest, finalize, get_object, put_object};
pub use fanout::{FanoutResult, fan_out_finalize, fan_out_put};
pub use pool::{NodeHandle, ReplicaPool};
