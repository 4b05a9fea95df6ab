//! QuorumGate Common - shared types, configuration, and error taxonomy
//!
//! Used by every other crate in the workspace: the placement planner,
//! the metadata store client, the storage-node client, the authorizer
//! interface, and the gateway binary itself.

pub mod checksum;
pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use checksum::{DigestCalculator, ZERO_BYTE_DIGEST, digest};
pub use config::{GatewayConfig, MultipartUploadConfig, NetworkConfig, StorageConfig};
pub use error::{Error, Result};
pub use time::now_millis;
pub use types::*;
