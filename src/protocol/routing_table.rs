use serde::Serialize;
use std::fmt;

use crate::NodeId;
use crate::algorithms::dijkstra;
use crate::network::Topology;

pub const NO_PATH: &str = "∅";
pub const INFINITE_COST: &str = "∞";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEntry {
    pub destination: NodeId,
    /// `f64::INFINITY` when unreachable; serialized as `null`.
    pub cost: f64,
    pub next_hop: Option<NodeId>,
    /// Full path including source and destination, empty when unreachable.
    pub path: Vec<NodeId>,
}

impl RouteEntry {
    pub fn unreachable(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            cost: f64::INFINITY,
            next_hop: None,
            path: Vec::new(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_finite() && self.next_hop.is_some()
    }

    pub fn path_display(&self) -> String {
        if self.path.is_empty() {
            NO_PATH.to_string()
        } else {
            self.path.join("→")
        }
    }

    pub fn cost_display(&self) -> String {
        if self.cost.is_finite() {
            format!("{}", self.cost)
        } else {
            INFINITE_COST.to_string()
        }
    }
}

/// Rows sorted by destination, rebuilt wholesale from a topology snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingTable {
    source: NodeId,
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn recompute(&mut self, topology: &Topology) {
        self.entries = dijkstra::routing_table(topology, &self.source);
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get_route(&self, destination: &str) -> Option<&RouteEntry> {
        self.entries
            .binary_search_by(|e| e.destination.as_str().cmp(destination))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Never fails: unknown destinations come back as an unreachable row.
    pub fn lookup(&self, destination: &str) -> RouteEntry {
        self.get_route(destination)
            .cloned()
            .unwrap_or_else(|| RouteEntry::unreachable(destination))
    }

    pub fn next_hop(&self, destination: &str) -> Option<&NodeId> {
        self.get_route(destination)?.next_hop.as_ref()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn reachable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_reachable()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routing table for {}", self.source)?;
        writeln!(f, "{:<12} {:<8} {:<10} {}", "Destination", "Cost", "NextHop", "Path")?;
        for entry in &self.entries {
            writeln!(
                f,
                "{:<12} {:<8} {:<10} {}",
                entry.destination,
                entry.cost_display(),
                entry.next_hop.as_deref().unwrap_or("-"),
                entry.path_display()
            )?;
        }
        Ok(())
    }
}
