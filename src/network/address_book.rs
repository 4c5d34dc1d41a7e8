use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::NodeId;

/// Node id -> socket address mapping queried by the TCP transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressBook {
    addresses: BTreeMap<NodeId, SocketAddr>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `base_port + 1`, `base_port + 2`, ... on localhost in sorted
    /// node order, so with a base of 8000 `A` listens on 8001.
    pub fn sequential<'a>(nodes: impl IntoIterator<Item = &'a NodeId>, base_port: u16) -> Self {
        let mut sorted: Vec<&NodeId> = nodes.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let addresses = sorted
            .into_iter()
            .zip(1u16..)
            .map(|(node, offset)| {
                (node.clone(), SocketAddr::new(host, base_port.saturating_add(offset)))
            })
            .collect();
        Self { addresses }
    }

    pub fn insert(&mut self, node: &str, addr: SocketAddr) {
        self.addresses.insert(node.to_string(), addr);
    }

    pub fn resolve(&self, node: &str) -> Option<SocketAddr> {
        self.addresses.get(node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &SocketAddr)> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ports() {
        let nodes: Vec<NodeId> = vec!["C".into(), "A".into(), "B".into(), "A".into()];
        let book = AddressBook::sequential(&nodes, 8000);
        assert_eq!(book.len(), 3);
        assert_eq!(book.resolve("A"), Some("127.0.0.1:8001".parse().unwrap()));
        assert_eq!(book.resolve("C"), Some("127.0.0.1:8003".parse().unwrap()));
        assert_eq!(book.resolve("Z"), None);
    }
}
