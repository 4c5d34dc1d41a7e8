use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::NodeId;
use crate::network::Topology;
use crate::protocol::RouteEntry;

#[derive(Debug)]
struct State {
    cost: f64,
    node: NodeId,
}

impl Eq for State {}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; equal costs pop in node-id order
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct ShortestPaths {
    pub source: NodeId,
    pub distances: BTreeMap<NodeId, f64>,
    pub previous: BTreeMap<NodeId, Option<NodeId>>,
}

impl ShortestPaths {
    pub fn distance(&self, dest: &str) -> f64 {
        self.distances.get(dest).copied().unwrap_or(f64::INFINITY)
    }

    /// Path from source to `dest`, empty when `dest` is unreachable.
    pub fn path_to(&self, dest: &str) -> Vec<NodeId> {
        reconstruct_path(&self.previous, &self.source, dest)
    }

    pub fn next_hop(&self, dest: &str) -> Option<NodeId> {
        find_next_hop(&self.previous, &self.source, dest)
    }
}

pub fn calculate_shortest_paths(topology: &Topology, source: &str) -> ShortestPaths {
    let mut distances: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut previous: BTreeMap<NodeId, Option<NodeId>> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    for node in topology.nodes() {
        distances.insert(node.clone(), f64::INFINITY);
        previous.insert(node.clone(), None);
    }
    distances.insert(source.to_string(), 0.0);
    previous.insert(source.to_string(), None);

    heap.push(State {
        cost: 0.0,
        node: source.to_string(),
    });

    while let Some(State { cost, node }) = heap.pop() {
        // Skip stale heap entries
        if cost > distances.get(&node).copied().unwrap_or(f64::INFINITY) {
            continue;
        }

        for (neighbor, link_cost) in topology.neighbors(&node) {
            let new_cost = cost + link_cost;
            if new_cost < distances.get(neighbor).copied().unwrap_or(f64::INFINITY) {
                distances.insert(neighbor.clone(), new_cost);
                previous.insert(neighbor.clone(), Some(node.clone()));
                heap.push(State {
                    cost: new_cost,
                    node: neighbor.clone(),
                });
            }
        }
    }

    ShortestPaths {
        source: source.to_string(),
        distances,
        previous,
    }
}

/// One row per node other than `source`, sorted by destination.
pub fn routing_table(topology: &Topology, source: &str) -> Vec<RouteEntry> {
    let paths = calculate_shortest_paths(topology, source);

    paths
        .distances
        .keys()
        .filter(|dest| dest.as_str() != source)
        .map(|dest| {
            let path = paths.path_to(dest);
            match paths.next_hop(dest) {
                Some(next_hop) if !path.is_empty() => RouteEntry {
                    destination: dest.clone(),
                    cost: paths.distance(dest),
                    next_hop: Some(next_hop),
                    path,
                },
                _ => RouteEntry::unreachable(dest),
            }
        })
        .collect()
}

fn find_next_hop(
    previous: &BTreeMap<NodeId, Option<NodeId>>,
    source: &str,
    dest: &str,
) -> Option<NodeId> {
    let path = reconstruct_path(previous, source, dest);
    path.get(1).cloned()
}

fn reconstruct_path(
    previous: &BTreeMap<NodeId, Option<NodeId>>,
    source: &str,
    dest: &str,
) -> Vec<NodeId> {
    let mut path = vec![dest.to_string()];
    let mut current = dest;

    // A predecessor chain can be no longer than the node count
    for _ in 0..previous.len() {
        if current == source {
            path.reverse();
            return path;
        }
        match previous.get(current) {
            Some(Some(prev)) => {
                path.push(prev.clone());
                current = prev;
            }
            _ => break,
        }
    }

    if current == source {
        path.reverse();
        return path;
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undirected(edges: &[(&str, &str, f64)]) -> Topology {
        let mut topology = Topology::new();
        for (a, b, cost) in edges {
            topology.add_edge(a, b, *cost);
            topology.add_edge(b, a, *cost);
        }
        topology
    }

    #[test]
    fn test_ring_routes_from_a() {
        let topology = undirected(&[
            ("A", "B", 1.0),
            ("B", "C", 1.0),
            ("C", "D", 1.0),
            ("D", "A", 1.0),
        ]);
        let table = routing_table(&topology, "A");

        let dests: Vec<_> = table.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(dests, vec!["B", "C", "D"]);

        assert_eq!(table[0].next_hop.as_deref(), Some("B"));
        assert_eq!(table[0].cost, 1.0);
        assert_eq!(table[2].next_hop.as_deref(), Some("D"));
        assert_eq!(table[2].cost, 1.0);

        // Equal-cost tie resolved towards the lower node id
        assert_eq!(table[1].cost, 2.0);
        assert_eq!(table[1].next_hop.as_deref(), Some("B"));
        assert_eq!(table[1].path, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_weighted_detour() {
        let topology = undirected(&[("A", "B", 1.0), ("B", "C", 1.0), ("A", "C", 5.0)]);
        let paths = calculate_shortest_paths(&topology, "A");
        assert_eq!(paths.distance("C"), 2.0);
        assert_eq!(paths.next_hop("C").as_deref(), Some("B"));
        assert_eq!(paths.path_to("C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_unreachable_destination() {
        let mut topology = undirected(&[("A", "B", 1.0)]);
        topology.add_node("Z");
        // Edge only in the wrong direction
        topology.add_edge("Y", "A", 1.0);

        let table = routing_table(&topology, "A");
        let z = table.iter().find(|r| r.destination == "Z").unwrap();
        assert!(z.cost.is_infinite());
        assert_eq!(z.next_hop, None);
        assert!(z.path.is_empty());

        let y = table.iter().find(|r| r.destination == "Y").unwrap();
        assert!(!y.is_reachable());
    }

    #[test]
    fn test_source_missing_from_graph() {
        let topology = undirected(&[("B", "C", 1.0)]);
        let table = routing_table(&topology, "A");
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| !r.is_reachable()));
    }

    #[test]
    fn test_deterministic_output() {
        let topology = undirected(&[
            ("A", "B", 1.0),
            ("A", "C", 1.0),
            ("B", "D", 1.0),
            ("C", "D", 1.0),
        ]);
        let first = routing_table(&topology, "A");
        for _ in 0..10 {
            assert_eq!(routing_table(&topology, "A"), first);
        }
    }
}
