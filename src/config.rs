pub mod topology_file;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::NodeId;
use crate::protocol::DEFAULT_HOPS;
pub use topology_file::{Adjacency, NamesFile, TopologyFile};

pub const DEFAULT_LSP_HOPS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub lsp_interval_secs: u64,
    pub hello_settle_ms: u64,
    pub initial_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            lsp_interval_secs: 10,   // 10 seconds
            hello_settle_ms: 1000,   // 1 second
            initial_delay_ms: 2000,  // 2 seconds
            connect_timeout_ms: 2000,
        }
    }
}

impl TimerConfig {
    pub fn lsp_interval(&self) -> Duration {
        Duration::from_secs(self.lsp_interval_secs)
    }

    pub fn hello_settle(&self) -> Duration {
        Duration::from_millis(self.hello_settle_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub node_id: NodeId,
    /// Statically configured neighbor -> link cost.
    #[serde(default)]
    pub neighbors: BTreeMap<NodeId, f64>,
    #[serde(default = "default_hops")]
    pub default_hops: u32,
    #[serde(default = "default_lsp_hops")]
    pub lsp_hops: u32,
    #[serde(default)]
    pub timers: TimerConfig,
}

fn default_hops() -> u32 {
    DEFAULT_HOPS
}

fn default_lsp_hops() -> u32 {
    DEFAULT_LSP_HOPS
}

impl RouterConfig {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            neighbors: BTreeMap::new(),
            default_hops: DEFAULT_HOPS,
            lsp_hops: DEFAULT_LSP_HOPS,
            timers: TimerConfig::default(),
        }
    }

    /// Seeds the neighbor set from this node's entry in a topology file.
    pub fn from_topology(node_id: &str, topology: &TopologyFile) -> Result<Self> {
        let Some(neighbors) = topology.neighbors_of(node_id) else {
            bail!("node {} does not appear in the topology", node_id);
        };
        let mut config = Self::new(node_id);
        config.neighbors = neighbors;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// A loaded config must describe the node this process was started as.
    pub fn check_node_id(&self, node_id: &str) -> Result<()> {
        if self.node_id != node_id {
            bail!(
                "node {} does not match node_id {} in the router config",
                node_id,
                self.node_id
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.is_empty() {
            bail!("node_id must not be empty");
        }
        for (neighbor, cost) in &self.neighbors {
            if neighbor == &self.node_id {
                bail!("node {} lists itself as a neighbor", self.node_id);
            }
            if !cost.is_finite() || *cost < 0.0 {
                bail!("invalid cost {} towards {}", cost, neighbor);
            }
        }
        if self.default_hops == 0 || self.lsp_hops == 0 {
            bail!("hop budgets must be at least 1");
        }
        if self.timers.lsp_interval_secs == 0 {
            bail!("lsp_interval_secs must be at least 1");
        }
        Ok(())
    }
}
