use log::info;
use std::collections::BTreeMap;

use super::neighbor::Neighbor;
use crate::NodeId;

/// Static neighbors from configuration plus any HELLO senders, in the order
/// they became known.
#[derive(Debug, Default)]
pub struct NeighborManager {
    neighbors: Vec<Neighbor>,
}

impl NeighborManager {
    pub fn new(configured: &BTreeMap<NodeId, f64>) -> Self {
        Self {
            neighbors: configured
                .iter()
                .map(|(id, cost)| Neighbor::configured(id, *cost))
                .collect(),
        }
    }

    /// Adds `sender` if unknown. Returns `true` when the neighbor set changed.
    pub fn discover(&mut self, sender: &str) -> bool {
        if let Some(neighbor) = self.get_mut(sender) {
            neighbor.touch();
            return false;
        }
        info!("New neighbor discovered: {}", sender);
        self.neighbors.push(Neighbor::discovered(sender));
        true
    }

    /// Refreshes liveness of a known neighbor without adding unknown ones.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(neighbor) => {
                neighbor.touch();
                true
            }
            None => false,
        }
    }

    pub fn list_neighbors(&self) -> Vec<NodeId> {
        self.neighbors.iter().map(|n| n.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Neighbor> {
        self.neighbors.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Neighbor -> cost map advertised in our own LSP.
    pub fn link_state(&self) -> BTreeMap<NodeId, f64> {
        self.neighbors
            .iter()
            .map(|n| (n.id.clone(), n.cost))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
