//! Node configuration file.
//!
//! ```toml
//! process_id = 0
//! num_resources = 2
//! tick_interval_ms = 1000
//!
//! [[peers]]
//! id = 0
//! address = "127.0.0.1:7100"
//!
//! [[peers]]
//! id = 1
//! address = "127.0.0.1:7101"
//!
//! [policy]
//! request_probability = 0.1
//! ```
//!
//! `peers` lists every process of the group, including this one; its own entry
//! gives the address to listen on.

use citygate_arbiter::{ArbiterConfig, PolicyConfig};
use citygate_node::NodeConfig;
use citygate_types::{ProcessId, StaticTopology, TopologyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate peer id {0}")]
    DuplicatePeer(ProcessId),

    #[error("Peer ids must be 0..{expected}, found {found}")]
    PeerIdOutOfRange { found: ProcessId, expected: u32 },

    #[error("Local process {0} is not listed in peers")]
    MissingLocal(ProcessId),

    #[error("Tick interval must be positive")]
    ZeroTickInterval,

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// One member of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub id: ProcessId,
    pub address: SocketAddr,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

/// Configuration of one production node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// This process.
    pub process_id: ProcessId,

    /// Number of cities (M).
    pub num_resources: u32,

    /// Every process of the group, this one included.
    pub peers: Vec<PeerConfig>,

    /// Interval between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How long to keep retrying connections to peers at startup.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub arbiter: ArbiterConfig,
}

impl ProductionConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that peer ids are exactly `0..N` and include this process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = self.num_processes();
        let mut seen = BTreeMap::new();
        for peer in &self.peers {
            if peer.id.0 >= expected {
                return Err(ConfigError::PeerIdOutOfRange {
                    found: peer.id,
                    expected,
                });
            }
            if seen.insert(peer.id, peer.address).is_some() {
                return Err(ConfigError::DuplicatePeer(peer.id));
            }
        }
        if !seen.contains_key(&self.process_id) {
            return Err(ConfigError::MissingLocal(self.process_id));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    /// Number of processes (N).
    pub fn num_processes(&self) -> u32 {
        self.peers.len() as u32
    }

    /// Build the static topology for this process.
    pub fn topology(&self) -> Result<StaticTopology, ConfigError> {
        Ok(StaticTopology::new(
            self.process_id,
            self.num_processes(),
            self.num_resources,
        )?)
    }

    /// Address this process listens on.
    pub fn listen_address(&self) -> Option<SocketAddr> {
        self.peers
            .iter()
            .find(|p| p.id == self.process_id)
            .map(|p| p.address)
    }

    /// Addresses of every other process.
    pub fn peer_addresses(&self) -> BTreeMap<ProcessId, SocketAddr> {
        self.peers
            .iter()
            .filter(|p| p.id != self.process_id)
            .map(|p| (p.id, p.address))
            .collect()
    }

    /// Tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Startup connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The node configuration this file describes.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::default()
            .with_tick_interval(self.tick_interval())
            .with_arbiter(self.arbiter.clone())
            .with_policy(self.policy.clone())
    }
}
