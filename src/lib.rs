pub mod algorithms;
pub mod config;
pub mod control_server;
pub mod error;
pub mod network;
pub mod protocol;
pub mod router;

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use config::RouterConfig;
pub use router::{Router, RouterPhase};

use protocol::{
    LinkState, LinkStateDatabase, NeighborManager, Outbound, Packet, PacketKind, RoutingTable,
    SeenIds, BROADCAST,
};

pub type NodeId = String;

/// Everything a router mutates, kept behind one lock so that an LSDB update
/// and the routing-table recomputation it triggers are never observed apart.
#[derive(Debug)]
pub struct RouterState {
    pub id: NodeId,
    pub phase: RouterPhase,
    pub neighbors: NeighborManager,
    pub lsdb: LinkStateDatabase,
    pub routing_table: RoutingTable,
    /// Ids of data packets already handled.
    pub data_seen: SeenIds,
    pub sequence: u64,
    pub default_hops: u32,
    pub lsp_hops: u32,
}

impl RouterState {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            id: config.node_id.clone(),
            phase: RouterPhase::Init,
            neighbors: NeighborManager::new(&config.neighbors),
            lsdb: LinkStateDatabase::new(),
            routing_table: RoutingTable::new(&config.node_id),
            data_seen: SeenIds::new(),
            // Wall-clock seed so a restarted router outranks its previous LSPs
            sequence: Utc::now().timestamp_millis().max(0) as u64,
            default_hops: config.default_hops,
            lsp_hops: config.lsp_hops,
        }
    }

    pub fn recompute_routes(&mut self) {
        let topology = self.lsdb.materialize_graph();
        self.routing_table.recompute(&topology);
    }

    /// Builds the next self-originated LSP from the current neighbor set.
    pub fn next_lsp(&mut self) -> Packet {
        self.sequence += 1;
        let link_state = LinkState {
            originator: self.id.clone(),
            sequence: self.sequence,
            neighbors: self.neighbors.link_state(),
        };
        Packet::new(
            PacketKind::Lsp(link_state),
            self.id.clone(),
            BROADCAST,
            self.lsp_hops,
            json!({}),
        )
    }

    pub fn hello_packets(&self) -> Vec<Outbound> {
        self.neighbors
            .list_neighbors()
            .into_iter()
            .map(|neighbor| Outbound {
                packet: Packet::new(PacketKind::Hello, self.id.clone(), neighbor.clone(), 1, json!("hello")),
                to: neighbor,
            })
            .collect()
    }
}

pub type SharedRouterState = Arc<Mutex<RouterState>>;
