use std::collections::{BTreeSet, HashSet, VecDeque};

use super::message_handler::Outbound;
use super::messages::Packet;
use crate::NodeId;
use crate::network::Topology;

#[derive(Debug, Default)]
pub struct FloodPlan {
    pub copies: Vec<Outbound>,
    /// Neighbors skipped because the decremented hop count reached zero.
    pub expired: Vec<NodeId>,
}

/// Builds one independent copy of `packet` per neighbor except `exclude`,
/// each with its hop count decremented and `from` set to `local_id`.
pub fn flood(
    packet: &Packet,
    local_id: &str,
    neighbors: &[NodeId],
    exclude: Option<&str>,
) -> FloodPlan {
    let mut plan = FloodPlan::default();

    for neighbor in neighbors {
        if Some(neighbor.as_str()) == exclude || neighbor == local_id {
            continue;
        }
        let mut copy = packet.clone();
        if copy.dec_hops() <= 0 {
            plan.expired.push(neighbor.clone());
            continue;
        }
        copy.from = local_id.to_string();
        plan.copies.push(Outbound {
            to: neighbor.clone(),
            packet: copy,
        });
    }

    plan
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    pub from: NodeId,
    pub to: NodeId,
    pub hops: i64,
}

#[derive(Debug, Default)]
pub struct FloodTrace {
    pub transmissions: Vec<Transmission>,
    pub reached: BTreeSet<NodeId>,
    pub delivered_at: Option<NodeId>,
    pub expired: usize,
}

/// Floods `packet` across a whole topology starting at `start`, as if every
/// node ran [`flood`]. Uses a work queue and a per-node visited set so cyclic
/// graphs terminate. Propagation stops at the packet's destination.
pub fn simulate_flood(topology: &Topology, start: &str, packet: &Packet) -> FloodTrace {
    let mut trace = FloodTrace::default();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<(NodeId, Packet, Option<NodeId>)> = VecDeque::new();
    queue.push_back((start.to_string(), packet.clone(), None));

    while let Some((node, current, previous)) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }
        trace.reached.insert(node.clone());

        if current.to == node {
            trace.delivered_at = Some(node);
            continue;
        }

        let neighbors: Vec<NodeId> = topology.neighbors(&node).map(|(n, _)| n.clone()).collect();
        let plan = flood(&current, &node, &neighbors, previous.as_deref());
        trace.expired += plan.expired.len();

        for Outbound { to, packet } in plan.copies {
            trace.transmissions.push(Transmission {
                from: node.clone(),
                to: to.clone(),
                hops: packet.hops,
            });
            if !visited.contains(&to) {
                queue.push_back((to, packet, Some(node.clone())));
            }
        }
    }

    trace
}
