//! Topology and names files shared by every router of a lab network.
//!
//! ```json
//! {"type": "topo", "config": {"A": ["B", "C"], "B": {"A": 1.0, "C": 2.5}}}
//! {"type": "names", "config": {"A": "127.0.0.1:8001"}}
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::NodeId;
use crate::network::{AddressBook, Topology};
use crate::protocol::neighbor::DEFAULT_LINK_COST;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Adjacency {
    Weighted(BTreeMap<NodeId, f64>),
    Unweighted(Vec<NodeId>),
}

impl Adjacency {
    pub fn links(&self) -> BTreeMap<NodeId, f64> {
        match self {
            Adjacency::Weighted(map) => map.clone(),
            Adjacency::Unweighted(list) => list
                .iter()
                .map(|n| (n.clone(), DEFAULT_LINK_COST))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologyFile {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub config: BTreeMap<NodeId, Adjacency>,
}

impl TopologyFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading topology file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing topology file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: TopologyFile = serde_json::from_str(content)?;
        if let Some(kind) = &file.kind {
            if kind != "topo" {
                bail!("expected a \"topo\" file, got \"{}\"", kind);
            }
        }
        for (node, adjacency) in &file.config {
            for (neighbor, cost) in adjacency.links() {
                if !cost.is_finite() || cost < 0.0 {
                    bail!("invalid cost {} on link {} -> {}", cost, node, neighbor);
                }
            }
        }
        Ok(file)
    }

    pub fn neighbors_of(&self, node: &str) -> Option<BTreeMap<NodeId, f64>> {
        self.config.get(node).map(Adjacency::links)
    }

    /// Every node mentioned, including ones only listed as link targets.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.to_topology().nodes().cloned().collect()
    }

    pub fn to_topology(&self) -> Topology {
        let mut topology = Topology::new();
        for (node, adjacency) in &self.config {
            topology.add_node(node);
            for (neighbor, cost) in adjacency.links() {
                topology.add_edge(node, &neighbor, cost);
            }
        }
        topology
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NamesFile {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub config: BTreeMap<NodeId, String>,
}

impl NamesFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading names file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing names file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: NamesFile = serde_json::from_str(content)?;
        if let Some(kind) = &file.kind {
            if kind != "names" {
                bail!("expected a \"names\" file, got \"{}\"", kind);
            }
        }
        Ok(file)
    }

    pub fn to_address_book(&self) -> Result<AddressBook> {
        let mut book = AddressBook::new();
        for (node, address) in &self.config {
            let addr: SocketAddr = address
                .parse()
                .with_context(|| format!("invalid address {:?} for node {}", address, node))?;
            book.insert(node, addr);
        }
        Ok(book)
    }
}
