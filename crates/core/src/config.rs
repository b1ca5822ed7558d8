use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::store::InputManagement;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    pub peer_address: String,
    pub network_magic: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UpstreamConfig {
    Peer(PeerConfig),
}

impl UpstreamConfig {
    pub fn network_magic(&self) -> u64 {
        match self {
            UpstreamConfig::Peer(peer) => peer.network_magic,
        }
    }

    pub fn peer_address(&self) -> &str {
        match self {
            UpstreamConfig::Peer(peer) => &peer.peer_address,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/argus.redb"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputManagementConfig {
    MarkSpentInputs,
    RemoveSpentInputs,
}

impl From<InputManagementConfig> for InputManagement {
    fn from(value: InputManagementConfig) -> Self {
        match value {
            InputManagementConfig::MarkSpentInputs => InputManagement::MarkSpentInputs,
            InputManagementConfig::RemoveSpentInputs => InputManagement::RemoveSpentInputs,
        }
    }
}

impl Default for InputManagementConfig {
    fn default() -> Self {
        InputManagementConfig::MarkSpentInputs
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    pub input_management: InputManagementConfig,
    /// Longest rollback the chain is expected to produce, in slots. Gates
    /// both `RemoveSpentInputs` pruning and the `within_safe_zone` forced
    /// rollback check.
    pub stability_window: u64,
    pub pull_batch_size: usize,
    pub prune_throttle_delay_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            input_management: InputManagementConfig::default(),
            stability_window: 2160 * 20, // ~3k/f for mainnet-shaped parameters
            pull_batch_size: 100,
            prune_throttle_delay_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServeConfig {
    pub listen_address: SocketAddr,
    #[serde(default)]
    pub permissive_cors: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:1442".parse().unwrap(),
            permissive_cors: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_max_level")]
    pub max_level: String,
    #[serde(default)]
    pub include_tokio: bool,
    #[serde(default)]
    pub include_pallas: bool,
}

fn default_max_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_level: default_max_level(),
            include_tokio: false,
            include_pallas: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RootConfig {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub patterns: Vec<String>,
}
