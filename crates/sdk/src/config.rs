//! Network and timeout configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One network node (peer or orderer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// host:port of the node's WebSocket endpoint
    pub address: String,
    /// Organization the node belongs to
    #[serde(default)]
    pub org_id: Option<String>,
}

impl NodeConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            org_id: None,
        }
    }
}

/// Deadlines in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub connect_ms: u64,
    pub endorse_ms: u64,
    pub broadcast_ms: u64,
    /// Commit confirmation; zero disables waiting for commit
    pub commit_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            endorse_ms: 30_000,
            broadcast_ms: 10_000,
            commit_ms: 30_000,
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn endorse(&self) -> Duration {
        Duration::from_millis(self.endorse_ms)
    }

    pub fn broadcast(&self) -> Duration {
        Duration::from_millis(self.broadcast_ms)
    }

    pub fn commit(&self) -> Option<Duration> {
        (self.commit_ms > 0).then(|| Duration::from_millis(self.commit_ms))
    }
}

/// SDK configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    pub orderer: NodeConfig,
    /// Endorsing peers
    #[serde(default)]
    pub peers: Vec<NodeConfig>,
    /// Peer used for lifecycle queries and commit checks; defaults to the first peer
    #[serde(default)]
    pub committer: Option<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            orderer: NodeConfig::new("127.0.0.1:7050"),
            peers: vec![NodeConfig::new("127.0.0.1:7051")],
            committer: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn with_orderer(mut self, address: impl Into<String>) -> Self {
        self.orderer = NodeConfig::new(address);
        self
    }

    pub fn with_peers(mut self, addresses: impl IntoIterator<Item = String>) -> Self {
        self.peers = addresses.into_iter().map(NodeConfig::new).collect();
        self
    }

    pub fn with_committer(mut self, address: impl Into<String>) -> Self {
        self.committer = Some(address.into());
        self
    }

    pub fn with_commit_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeouts.commit_ms = timeout_ms;
        self
    }

    /// Address of the committing peer
    pub fn committer_address(&self) -> Option<&str> {
        self.committer
            .as_deref()
            .or_else(|| self.peers.first().map(|p| p.address.as_str()))
    }
}
