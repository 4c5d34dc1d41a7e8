use serde::Serialize;
use std::collections::BTreeMap;

use crate::NodeId;

/// Weighted directed graph keyed by node id. Ordered maps keep iteration
/// stable so shortest-path ties resolve the same way on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Topology {
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str) {
        self.adjacency.entry(id.to_string()).or_default();
    }

    /// Adds or replaces the `from -> to` link. Both ends become nodes.
    pub fn add_edge(&mut self, from: &str, to: &str, cost: f64) {
        self.add_node(to);
        self.adjacency
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), cost);
    }

    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = (&NodeId, f64)> {
        self.adjacency
            .get(id)
            .into_iter()
            .flat_map(|links| links.iter().map(|(n, c)| (n, *c)))
    }

    pub fn link_cost(&self, from: &str, to: &str) -> Option<f64> {
        self.adjacency.get(from)?.get(to).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.adjacency.keys()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_create_nodes() {
        let mut topology = Topology::new();
        topology.add_edge("A", "B", 2.0);
        assert!(topology.contains("A"));
        assert!(topology.contains("B"));
        assert_eq!(topology.node_count(), 2);
        assert_eq!(topology.edge_count(), 1);
        assert_eq!(topology.neighbors("B").count(), 0);
    }

    #[test]
    fn test_neighbors_are_sorted() {
        let mut topology = Topology::new();
        topology.add_edge("A", "D", 1.0);
        topology.add_edge("A", "B", 1.0);
        topology.add_edge("A", "C", 3.0);
        let order: Vec<_> = topology.neighbors("A").map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "D"]);
        assert_eq!(topology.neighbors("missing").count(), 0);
    }
}
