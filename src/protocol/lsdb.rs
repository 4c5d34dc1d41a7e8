use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::messages::LinkState;
use crate::NodeId;
use crate::network::Topology;

/// Packet ids already processed. Never pruned: it grows for the lifetime of
/// the router, which is acceptable for lab-sized networks and short runs.
#[derive(Debug, Default)]
pub struct SeenIds {
    ids: HashSet<String>,
}

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` when the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    Duplicate,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LsdbEntry {
    pub sequence: u64,
    pub neighbors: BTreeMap<NodeId, f64>,
    pub packet_id: String,
    pub installed_at: DateTime<Utc>,
}

/// Latest accepted LSP per originator. Entries are superseded, never removed.
#[derive(Debug, Default)]
pub struct LinkStateDatabase {
    entries: BTreeMap<NodeId, LsdbEntry>,
    seen: SeenIds,
}

impl LinkStateDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duplicate ids are checked before sequence numbers, so a replayed LSP is
    /// reported as `Duplicate` even when it is also older than the stored one.
    pub fn accept(&mut self, packet_id: &str, lsp: &LinkState) -> AcceptOutcome {
        if self.seen.contains(packet_id) {
            return AcceptOutcome::Duplicate;
        }
        if let Some(current) = self.entries.get(&lsp.originator) {
            if lsp.sequence <= current.sequence {
                return AcceptOutcome::Stale;
            }
        }

        self.seen.insert(packet_id);
        self.entries.insert(
            lsp.originator.clone(),
            LsdbEntry {
                sequence: lsp.sequence,
                neighbors: lsp.neighbors.clone(),
                packet_id: packet_id.to_string(),
                installed_at: Utc::now(),
            },
        );
        AcceptOutcome::Accepted
    }

    pub fn has_seen(&self, packet_id: &str) -> bool {
        self.seen.contains(packet_id)
    }

    pub fn get(&self, originator: &str) -> Option<&LsdbEntry> {
        self.entries.get(originator)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &LsdbEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Projects every stored LSP as `originator -> neighbor` directed edges.
    /// A node only enters the graph once its own LSP has been accepted.
    pub fn materialize_graph(&self) -> Topology {
        let mut topology = Topology::new();
        for (originator, entry) in &self.entries {
            topology.add_node(originator);
            for (neighbor, cost) in &entry.neighbors {
                if self.entries.contains_key(neighbor) {
                    topology.add_edge(originator, neighbor, *cost);
                }
            }
        }
        topology
    }
}
