pub mod flooding;
pub mod lsdb;
pub mod message_handler;
pub mod messages;
pub mod neighbor;
pub mod neighbor_manager;
pub mod routing_table;
pub mod task_manager;

pub use flooding::{FloodPlan, FloodTrace, flood, simulate_flood};
pub use lsdb::{AcceptOutcome, LinkStateDatabase, LsdbEntry, SeenIds};
pub use message_handler::{Disposition, DropReason, Handled, Outbound};
pub use messages::*;
pub use neighbor::{Neighbor, NeighborOrigin};
pub use neighbor_manager::NeighborManager;
pub use routing_table::{RouteEntry, RoutingTable};
