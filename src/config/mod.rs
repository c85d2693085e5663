//! Node configuration: an optional TOML file plus `FILEMESH_*` environment
//! overrides, matching the transfer/storage/network table from the wire
//! and control-API contracts.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use crate::model::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub default_chunk_size: u32,
    pub max_chunk_size: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: 256 * 1024,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub enable_compression: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./filemesh-data"),
            enable_compression: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub api_port: u16,
    pub seed_nodes: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_id: format!("node-{}", uuid::Uuid::new_v4()),
            host: "0.0.0.0".to_string(),
            port: 7777,
            api_port: 8080,
            seed_nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads defaults, overlays `path` (if given), then applies
    /// `FILEMESH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
                toml::from_str(&text)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_u32("FILEMESH_DEFAULT_CHUNK_SIZE") {
            self.transfer.default_chunk_size = v;
        }
        if let Some(v) = env_u32("FILEMESH_MAX_CHUNK_SIZE") {
            self.transfer.max_chunk_size = v;
        }
        if let Ok(v) = std::env::var("FILEMESH_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_bool("FILEMESH_ENABLE_COMPRESSION") {
            self.storage.enable_compression = v;
        }
        if let Ok(v) = std::env::var("FILEMESH_NODE_ID") {
            self.network.node_id = v;
        }
        if let Ok(v) = std::env::var("FILEMESH_HOST") {
            self.network.host = v;
        }
        if let Some(v) = env_u16("FILEMESH_PORT") {
            self.network.port = v;
        }
        if let Some(v) = env_u16("FILEMESH_API_PORT") {
            self.network.api_port = v;
        }
        if let Ok(v) = std::env::var("FILEMESH_SEED_NODES") {
            self.network.seed_nodes = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Some(v) = env_bool("FILEMESH_METRICS_ENABLED") {
            self.metrics.enabled = v;
        }
        if let Ok(v) = std::env::var("FILEMESH_METRICS_LISTEN_ADDR") {
            self.metrics.listen_addr = v;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.transfer.default_chunk_size) {
            return Err(format!(
                "default_chunk_size {} outside allowed range [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]",
                self.transfer.default_chunk_size
            ));
        }
        Ok(())
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
