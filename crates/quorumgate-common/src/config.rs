//! Gateway configuration.
//!
//! Mirrors the configuration table in the external-interfaces section:
//! one nested struct per concern, each with a hand-rolled `Default` impl
//! so a bare `GatewayConfig::default()` is already a runnable dev config.
//! Loading order (file < env < CLI flags) is the binary's job — see
//! `quorumgate-gateway`'s `main.rs`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub multipart_upload: MultipartUploadConfig,
    pub max_object_copies: u32,
    pub accounts_snaplinks_disabled: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            multipart_upload: MultipartUploadConfig::default(),
            max_object_copies: 9,
            accounts_snaplinks_disabled: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub port: u16,
    pub insecure_port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_idle_per_host: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 8443,
            insecure_port: 8080,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(30),
            max_idle_per_host: 32,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Default cap for streaming PUTs whose size can't be determined up front, in MB.
    pub default_max_streaming_size_mb: u64,
    /// Exclude storage nodes above this utilization percent for ordinary requests.
    pub max_utilization_pct: u8,
    /// Exclude storage nodes above this (higher) utilization percent for operator requests.
    pub max_operator_utilization_pct: u8,
}

impl StorageConfig {
    /// `max_operator_utilization_pct`, reconciled per §4.1: if configuration sets
    /// normal > operator, raise operator to the greater of the default operator
    /// value or the configured normal value, with a warning left to the caller.
    #[must_use]
    pub fn reconciled_operator_utilization_pct(&self) -> u8 {
        const DEFAULT_OPERATOR_PCT: u8 = 92;
        if self.max_utilization_pct > self.max_operator_utilization_pct {
            self.max_utilization_pct.max(DEFAULT_OPERATOR_PCT)
        } else {
            self.max_operator_utilization_pct
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_max_streaming_size_mb: 51200,
            max_utilization_pct: 90,
            max_operator_utilization_pct: 92,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultipartUploadConfig {
    pub prefix_dir_len: u8,
}

impl Default for MultipartUploadConfig {
    fn default() -> Self {
        Self { prefix_dir_len: 2 }
    }
}

impl GatewayConfig {
    /// Loads configuration by layering a TOML file over environment
    /// variables (`GATEWAY__` prefix, double-underscore nesting, e.g.
    /// `GATEWAY__STORAGE__MAX_UTILIZATION_PCT`) over these built-in
    /// defaults. CLI flags take final precedence but are applied by the
    /// caller (`quorumgate-gateway`'s `main.rs`) after this returns, since
    /// they're parsed with `clap` rather than known to this crate.
    ///
    /// # Errors
    /// Returns a [`config::ConfigError`] if the file exists but fails to
    /// parse, or if a value can't be deserialized into `GatewayConfig`.
    pub fn load(file_path: Option<&str>) -> std::result::Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&defaults)?);
        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("__"));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.network.port, 8443);
        assert_eq!(config.max_object_copies, 9);
        assert_eq!(config.storage.max_utilization_pct, 90);
    }

    #[test]
    fn test_operator_utilization_reconciliation() {
        let mut storage = StorageConfig {
            max_utilization_pct: 95,
            max_operator_utilization_pct: 92,
            ..StorageConfig::default()
        };
        assert_eq!(storage.reconciled_operator_utilization_pct(), 95);

        storage.max_utilization_pct = 80;
        storage.max_operator_utilization_pct = 92;
        assert_eq!(storage.reconciled_operator_utilization_pct(), 92);
    }

    #[test]
    fn test_load_with_no_file_matches_defaults() {
        let loaded = GatewayConfig::load(None).unwrap();
        assert_eq!(loaded.network.port, GatewayConfig::default().network.port);
        assert_eq!(loaded.max_object_copies, GatewayConfig::default().max_object_copies);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let loaded = GatewayConfig::load(Some("/nonexistent/path/gateway")).unwrap();
        assert_eq!(loaded.multipart_upload.prefix_dir_len, GatewayConfig::default().multipart_upload.prefix_dir_len);
    }
}
