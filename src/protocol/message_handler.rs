//! Inbound dispatch by packet type.
//!
//! Handlers run with the router state locked and never perform I/O: they
//! return what to send and what to deliver, and the caller does the rest
//! after releasing the lock.

use log::{debug, info, warn};
use serde_json::json;

use super::flooding::flood;
use super::lsdb::AcceptOutcome;
use super::messages::{Packet, PacketKind};
use crate::{NodeId, RouterState};

/// A packet waiting to be handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: NodeId,
    pub packet: Packet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NotRunning,
    Malformed,
    Expired,
    Duplicate,
    Stale,
    SelfOriginated,
    NoRoute,
    UnknownType(String),
}

/// What happened to one inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Broadcast { flooded: usize },
    Forwarded { next_hop: NodeId },
    LspAccepted { flooded: usize },
    HelloAnswered { discovered: bool },
    HelloAckRecorded,
    Dropped(DropReason),
}

impl Disposition {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Disposition::Dropped(_))
    }
}

#[derive(Debug)]
pub struct Handled {
    pub disposition: Disposition,
    pub outbound: Vec<Outbound>,
    pub delivered: Option<Packet>,
}

impl Handled {
    fn dropped(reason: DropReason) -> Self {
        Self {
            disposition: Disposition::Dropped(reason),
            outbound: Vec::new(),
            delivered: None,
        }
    }
}

pub fn handle_packet(state: &mut RouterState, packet: Packet) -> Handled {
    if packet.kind.carries_data() {
        return handle_data(state, packet);
    }
    match packet.kind {
        PacketKind::Hello => handle_hello(state, packet),
        PacketKind::HelloAck => handle_hello_ack(state, packet),
        PacketKind::Lsp(_) => handle_lsp(state, packet),
        _ => {
            let type_name = packet.kind.type_name().to_string();
            debug!("[{}] Unknown message type from {}: {}", state.id, packet.from, type_name);
            Handled::dropped(DropReason::UnknownType(type_name))
        }
    }
}

fn handle_hello(state: &mut RouterState, packet: Packet) -> Handled {
    // Don't process our own hello messages
    if packet.from == state.id {
        return Handled::dropped(DropReason::SelfOriginated);
    }

    let discovered = state.neighbors.discover(&packet.from);
    debug!("[{}] HELLO from {}", state.id, packet.from);

    let ack = Packet::new(
        PacketKind::HelloAck,
        state.id.clone(),
        packet.from.clone(),
        1,
        json!("hello_ack"),
    );
    Handled {
        disposition: Disposition::HelloAnswered { discovered },
        outbound: vec![Outbound {
            to: packet.from,
            packet: ack,
        }],
        delivered: None,
    }
}

fn handle_hello_ack(state: &mut RouterState, packet: Packet) -> Handled {
    if !state.neighbors.mark_seen(&packet.from) {
        debug!("[{}] HELLO_ACK from non-neighbor {}", state.id, packet.from);
    }
    Handled {
        disposition: Disposition::HelloAckRecorded,
        outbound: Vec::new(),
        delivered: None,
    }
}

fn handle_lsp(state: &mut RouterState, packet: Packet) -> Handled {
    let (Some(id), Some(lsp)) = (packet.id(), packet.link_state()) else {
        return Handled::dropped(DropReason::Malformed);
    };

    if lsp.originator == state.id {
        debug!("[{}] ignoring LSP claiming to be ours (from {})", state.id, packet.from);
        return Handled::dropped(DropReason::SelfOriginated);
    }

    match state.lsdb.accept(id, lsp) {
        AcceptOutcome::Duplicate => {
            debug!("[{}] duplicate LSP {} from {}", state.id, id, lsp.originator);
            return Handled::dropped(DropReason::Duplicate);
        }
        AcceptOutcome::Stale => {
            debug!(
                "[{}] stale LSP from {} (seq {})",
                state.id, lsp.originator, lsp.sequence
            );
            return Handled::dropped(DropReason::Stale);
        }
        AcceptOutcome::Accepted => {}
    }

    info!(
        "[{}] accepted LSP from {} seq {} via {}",
        state.id, lsp.originator, lsp.sequence, packet.from
    );
    state.recompute_routes();
    debug!("{}", state.routing_table);

    let neighbors = state.neighbors.list_neighbors();
    let plan = flood(&packet, &state.id, &neighbors, Some(&packet.from));
    if !plan.expired.is_empty() {
        debug!("[{}] LSP expired before reaching {:?}", state.id, plan.expired);
    }

    Handled {
        disposition: Disposition::LspAccepted {
            flooded: plan.copies.len(),
        },
        outbound: plan.copies,
        delivered: None,
    }
}

fn handle_data(state: &mut RouterState, packet: Packet) -> Handled {
    let Some(id) = packet.id() else {
        return Handled::dropped(DropReason::Malformed);
    };
    if !state.data_seen.insert(id) {
        debug!("[{}] duplicate {} {}", state.id, packet.kind.type_name(), id);
        return Handled::dropped(DropReason::Duplicate);
    }

    if packet.to == state.id {
        return Handled {
            disposition: Disposition::Delivered,
            outbound: Vec::new(),
            delivered: Some(packet),
        };
    }

    if packet.is_broadcast() {
        let neighbors = state.neighbors.list_neighbors();
        let plan = flood(&packet, &state.id, &neighbors, Some(&packet.from));
        return Handled {
            disposition: Disposition::Broadcast {
                flooded: plan.copies.len(),
            },
            outbound: plan.copies,
            delivered: Some(packet),
        };
    }

    match forward(state, packet) {
        Ok(outbound) => Handled {
            disposition: Disposition::Forwarded {
                next_hop: outbound.to.clone(),
            },
            outbound: vec![outbound],
            delivered: None,
        },
        Err(reason) => Handled::dropped(reason),
    }
}

/// Next hop from the routing table, falling back to a direct link when the
/// destination is a neighbor the table does not know yet.
pub fn next_hop_for(state: &RouterState, destination: &str) -> Option<NodeId> {
    state
        .routing_table
        .next_hop(destination)
        .cloned()
        .or_else(|| {
            state
                .neighbors
                .contains(destination)
                .then(|| destination.to_string())
        })
}

fn forward(state: &RouterState, mut packet: Packet) -> Result<Outbound, DropReason> {
    let Some(next_hop) = next_hop_for(state, &packet.to) else {
        warn!("[{}] no route to {}, dropping packet from {}", state.id, packet.to, packet.from);
        return Err(DropReason::NoRoute);
    };

    if packet.dec_hops() <= 0 {
        warn!("[{}] packet for {} expired", state.id, packet.to);
        return Err(DropReason::Expired);
    }
    packet.from = state.id.clone();

    debug!("[{}] forwarding to {} via {}", state.id, packet.to, next_hop);
    Ok(Outbound {
        to: next_hop,
        packet,
    })
}

/// Generates our next LSP, installs it locally and floods it to every
/// neighbor.
pub fn originate_lsp(state: &mut RouterState) -> Vec<Outbound> {
    let lsp = state.next_lsp();
    if let (Some(id), Some(link_state)) = (lsp.id(), lsp.link_state()) {
        state.lsdb.accept(id, link_state);
    }
    state.recompute_routes();
    debug!("{}", state.routing_table);

    let neighbors = state.neighbors.list_neighbors();
    let plan = flood(&lsp, &state.id, &neighbors, None);
    if !plan.expired.is_empty() {
        warn!("[{}] LSP hop budget too small to reach {:?}", state.id, plan.expired);
    }
    info!(
        "[{}] originated LSP seq {} to {} neighbors",
        state.id,
        state.sequence,
        plan.copies.len()
    );
    plan.copies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouterConfig;
    use crate::protocol::messages::{BROADCAST, LinkState};
    use std::collections::BTreeMap;

    fn state(id: &str, neighbors: &[&str]) -> RouterState {
        let mut config = RouterConfig::new(id);
        for n in neighbors {
            config.neighbors.insert(n.to_string(), 1.0);
        }
        RouterState::new(&config)
    }

    fn lsp(from: &str, originator: &str, sequence: u64, links: &[&str]) -> Packet {
        let neighbors: BTreeMap<_, _> = links.iter().map(|n| (n.to_string(), 1.0)).collect();
        Packet::new(
            PacketKind::Lsp(LinkState {
                originator: originator.to_string(),
                sequence,
                neighbors,
            }),
            from,
            BROADCAST,
            10,
            json!({}),
        )
    }

    fn data(from: &str, to: &str, hops: u32) -> Packet {
        Packet::new(PacketKind::Message, from, to, hops, json!("payload"))
    }

    #[test]
    fn test_hello_discovers_and_acks() {
        let mut st = state("B", &["A"]);
        let handled = handle_packet(&mut st, Packet::new(PacketKind::Hello, "E", "B", 1, json!("hello")));

        assert_eq!(handled.disposition, Disposition::HelloAnswered { discovered: true });
        assert_eq!(handled.outbound.len(), 1);
        assert_eq!(handled.outbound[0].to, "E");
        assert_eq!(handled.outbound[0].packet.kind, PacketKind::HelloAck);
        assert!(st.neighbors.contains("E"));

        let again = handle_packet(&mut st, Packet::new(PacketKind::Hello, "E", "B", 1, json!("hello")));
        assert_eq!(again.disposition, Disposition::HelloAnswered { discovered: false });
        assert_eq!(st.neighbors.len(), 2);
    }

    #[test]
    fn test_lsp_flooded_except_sender() {
        let mut st = state("B", &["A", "C", "D"]);
        let handled = handle_packet(&mut st, lsp("A", "A", 1, &["B"]));

        assert_eq!(handled.disposition, Disposition::LspAccepted { flooded: 2 });
        let targets: Vec<_> = handled.outbound.iter().map(|o| o.to.as_str()).collect();
        assert_eq!(targets, vec!["C", "D"]);
        for out in &handled.outbound {
            assert_eq!(out.packet.from, "B");
            assert_eq!(out.packet.hops, 9);
        }
        assert!(st.lsdb.get("A").is_some());
    }

    #[test]
    fn test_duplicate_lsp_is_noop() {
        let mut st = state("B", &["A", "C"]);
        let packet = lsp("A", "A", 1, &["B"]);

        let first = handle_packet(&mut st, packet.clone());
        assert_eq!(first.disposition, Disposition::LspAccepted { flooded: 1 });

        let second = handle_packet(&mut st, packet);
        assert_eq!(second.disposition, Disposition::Dropped(DropReason::Duplicate));
        assert!(second.outbound.is_empty());
        assert_eq!(st.lsdb.len(), 1);
    }

    #[test]
    fn test_stale_lsp_rejected() {
        let mut st = state("B", &["A"]);
        handle_packet(&mut st, lsp("A", "A", 7, &["B"]));
        let stale = handle_packet(&mut st, lsp("A", "A", 6, &["B", "Z"]));
        assert_eq!(stale.disposition, Disposition::Dropped(DropReason::Stale));
        assert!(!st.lsdb.get("A").unwrap().neighbors.contains_key("Z"));
    }

    #[test]
    fn test_foreign_copy_of_own_lsp_ignored() {
        let mut st = state("B", &["A"]);
        let handled = handle_packet(&mut st, lsp("A", "B", u64::MAX, &["A"]));
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::SelfOriginated));
        assert!(st.lsdb.is_empty());
    }

    #[test]
    fn test_accepted_lsp_recomputes_routes() {
        let mut st = state("A", &["B"]);
        originate_lsp(&mut st);
        handle_packet(&mut st, lsp("B", "B", 1, &["A", "C"]));
        handle_packet(&mut st, lsp("B", "C", 1, &["B"]));

        let row = st.routing_table.lookup("C");
        assert_eq!(row.cost, 2.0);
        assert_eq!(row.next_hop.as_deref(), Some("B"));
    }

    #[test]
    fn test_data_for_self_delivered() {
        let mut st = state("C", &["B"]);
        let handled = handle_packet(&mut st, data("B", "C", 3));
        assert_eq!(handled.disposition, Disposition::Delivered);
        assert!(handled.delivered.is_some());
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_data_forwarded_with_hop_decrement() {
        let mut st = state("B", &["A", "C"]);
        let handled = handle_packet(&mut st, data("A", "C", 3));
        assert_eq!(
            handled.disposition,
            Disposition::Forwarded {
                next_hop: "C".into()
            }
        );
        let out = &handled.outbound[0];
        assert_eq!(out.packet.hops, 2);
        assert_eq!(out.packet.from, "B");
    }

    #[test]
    fn test_data_expiring_is_dropped() {
        let mut st = state("B", &["A", "C"]);
        let handled = handle_packet(&mut st, data("A", "C", 1));
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::Expired));
        assert!(handled.outbound.is_empty());
    }

    #[test]
    fn test_data_without_route_dropped() {
        let mut st = state("B", &["A"]);
        let handled = handle_packet(&mut st, data("A", "Z", 5));
        assert_eq!(handled.disposition, Disposition::Dropped(DropReason::NoRoute));
    }

    #[test]
    fn test_duplicate_data_dropped() {
        let mut st = state("B", &["A", "C"]);
        let packet = data("A", "C", 5);
        handle_packet(&mut st, packet.clone());
        let again = handle_packet(&mut st, packet);
        assert_eq!(again.disposition, Disposition::Dropped(DropReason::Duplicate));
    }

    #[test]
    fn test_broadcast_data_delivered_and_flooded() {
        let mut st = state("B", &["A", "C", "D"]);
        let handled = handle_packet(&mut st, data("A", BROADCAST, 4));
        assert_eq!(handled.disposition, Disposition::Broadcast { flooded: 2 });
        assert!(handled.delivered.is_some());
        assert!(handled.outbound.iter().all(|o| o.to != "A"));
    }

    #[test]
    fn test_unknown_type_dropped() {
        let mut st = state("B", &["A"]);
        let packet = Packet::new(PacketKind::Other("telemetry".into()), "A", "B", 3, json!(1));
        let handled = handle_packet(&mut st, packet);
        assert_eq!(
            handled.disposition,
            Disposition::Dropped(DropReason::UnknownType("telemetry".into()))
        );
    }

    #[test]
    fn test_hello_ack_refreshes_known_neighbor() {
        let mut st = state("B", &["A"]);
        let handled = handle_packet(&mut st, Packet::new(PacketKind::HelloAck, "A", "B", 1, json!(null)));
        assert_eq!(handled.disposition, Disposition::HelloAckRecorded);
        assert!(st.neighbors.get("A").unwrap().last_seen.is_some());

        handle_packet(&mut st, Packet::new(PacketKind::HelloAck, "Q", "B", 1, json!(null)));
        assert!(!st.neighbors.contains("Q"));
    }

    #[test]
    fn test_originate_installs_own_lsp() {
        let mut st = state("A", &["B", "C"]);
        let before = st.sequence;
        let copies = originate_lsp(&mut st);
        assert_eq!(copies.len(), 2);
        assert_eq!(st.sequence, before + 1);

        let own = st.lsdb.get("A").unwrap();
        assert_eq!(own.sequence, st.sequence);
        // B stays out of the table until its own LSP arrives
        assert!(!st.routing_table.lookup("B").is_reachable());

        // Our own LSP coming back from a neighbor is never re-accepted
        let echoed = copies[0].packet.clone();
        let handled = handle_packet(&mut st, echoed);
        assert!(handled.disposition.is_dropped());

        handle_packet(&mut st, lsp("B", "B", 1, &["A"]));
        assert_eq!(st.routing_table.lookup("B").cost, 1.0);
    }
}
