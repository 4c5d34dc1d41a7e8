use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::RouterError;
use crate::network::Transport;
use crate::protocol::message_handler::{self, next_hop_for};
use crate::protocol::{
    Disposition, DropReason, LsdbEntry, Neighbor, Outbound, Packet, PacketKind, RouteEntry,
    RoutingTable, flood, task_manager,
};
use crate::{NodeId, RouterConfig, RouterState, SharedRouterState};

const DELIVERY_BACKLOG: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterPhase {
    Init,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub node_id: NodeId,
    pub phase: RouterPhase,
    pub neighbors: Vec<NodeId>,
    pub lsdb_entries: usize,
    pub seen_lsp_ids: usize,
    pub seen_data_ids: usize,
    pub reachable: usize,
    pub sequence: u64,
}

/// Outcome of one attempt to hand a packet to the transport.
#[derive(Debug)]
pub struct SendReport {
    pub to: NodeId,
    pub result: Result<(), RouterError>,
}

pub struct Router<T: Transport> {
    id: NodeId,
    config: RouterConfig,
    state: SharedRouterState,
    transport: Arc<T>,
    deliveries: broadcast::Sender<Packet>,
    shutdown_tx: broadcast::Sender<()>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport> Router<T> {
    pub fn new(config: RouterConfig, transport: T) -> Arc<Self> {
        let (deliveries, _) = broadcast::channel(DELIVERY_BACKLOG);
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = RouterState::new(&config);

        Arc::new(Self {
            id: config.node_id.clone(),
            config,
            state: Arc::new(Mutex::new(state)),
            transport: Arc::new(transport),
            deliveries,
            shutdown_tx,
            task_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub async fn phase(&self) -> RouterPhase {
        self.state.lock().await.phase
    }

    /// `INIT -> RUNNING`: subscribes to the transport and starts the inbound
    /// and maintenance workers. A subscription failure is fatal.
    pub async fn start(self: &Arc<Self>) -> Result<(), RouterError> {
        let subscription = {
            let mut state = self.state.lock().await;
            if state.phase != RouterPhase::Init {
                return Err(RouterError::InvalidTransition {
                    from: state.phase,
                    to: RouterPhase::Running,
                });
            }
            let subscription = match self.transport.subscribe().await {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!("[{}] cannot subscribe to transport: {}", self.id, e);
                    return Err(e.into());
                }
            };
            state.phase = RouterPhase::Running;
            subscription
        };

        let handles = task_manager::start_tasks(self, subscription);
        self.task_handles.lock().await.extend(handles);

        info!(
            "[{}] router running with neighbors {:?}",
            self.id,
            self.config.neighbors.keys().collect::<Vec<_>>()
        );
        Ok(())
    }

    /// `RUNNING -> STOPPED`: signals the workers and waits for them to exit.
    /// Sends already in flight are allowed to finish.
    pub async fn stop(&self) -> Result<(), RouterError> {
        {
            let mut state = self.state.lock().await;
            if state.phase != RouterPhase::Running {
                return Err(RouterError::InvalidTransition {
                    from: state.phase,
                    to: RouterPhase::Stopped,
                });
            }
            state.phase = RouterPhase::Stopped;
        }

        let _ = self.shutdown_tx.send(());
        let handles: Vec<_> = self.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("[{}] task ended abnormally: {}", self.id, e);
                }
            }
        }

        info!("[{}] router stopped", self.id);
        Ok(())
    }

    /// Resolves once the router has reached `STOPPED`, however it got there.
    pub async fn wait_stopped(&self) {
        let mut shutdown_rx = self.shutdown_receiver();
        if self.phase().await == RouterPhase::Stopped {
            return;
        }
        let _ = shutdown_rx.recv().await;
    }

    pub(crate) fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Entry point for raw bytes from the transport.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Disposition {
        match Packet::decode(bytes) {
            Ok(packet) => self.handle_packet(packet).await,
            Err(e) => {
                debug!("[{}] dropping invalid packet: {}", self.id, e);
                Disposition::Dropped(DropReason::Malformed)
            }
        }
    }

    pub async fn handle_packet(&self, packet: Packet) -> Disposition {
        let handled = {
            let mut state = self.state.lock().await;
            if state.phase != RouterPhase::Running {
                return Disposition::Dropped(DropReason::NotRunning);
            }
            message_handler::handle_packet(&mut state, packet)
        };

        if let Some(packet) = handled.delivered {
            self.deliver(packet);
        }
        self.transmit(handled.outbound).await;
        handled.disposition
    }

    /// Sends a HELLO to every neighbor. Returns how many sends succeeded.
    pub async fn send_hellos(&self) -> usize {
        let outbound = {
            let state = self.state.lock().await;
            if state.phase != RouterPhase::Running {
                return 0;
            }
            state.hello_packets()
        };
        let reports = self.transmit(outbound).await;
        reports.iter().filter(|r| r.result.is_ok()).count()
    }

    /// Generates, installs and floods our own LSP.
    pub async fn originate_lsp(&self) -> Result<Vec<SendReport>, RouterError> {
        let outbound = {
            let mut state = self.state.lock().await;
            if state.phase != RouterPhase::Running {
                return Err(RouterError::NotRunning);
            }
            message_handler::originate_lsp(&mut state)
        };
        Ok(self.transmit(outbound).await)
    }

    pub async fn send_message(&self, destination: &str, payload: Value) -> Result<Disposition, RouterError> {
        self.send_data(PacketKind::Message, destination, payload).await
    }

    /// Originates a data packet. Local origination does not consume a hop.
    pub async fn send_data(
        &self,
        kind: PacketKind,
        destination: &str,
        payload: Value,
    ) -> Result<Disposition, RouterError> {
        let (disposition, outbound, local) = {
            let mut state = self.state.lock().await;
            if state.phase != RouterPhase::Running {
                return Err(RouterError::NotRunning);
            }
            let packet = Packet::new(kind, state.id.clone(), destination, state.default_hops, payload);
            if let Some(id) = packet.id() {
                state.data_seen.insert(id);
            }

            if destination == state.id {
                (Disposition::Delivered, Vec::new(), Some(packet))
            } else if packet.is_broadcast() {
                let plan = flood(&packet, &state.id, &state.neighbors.list_neighbors(), None);
                let flooded = plan.copies.len();
                (Disposition::Broadcast { flooded }, plan.copies, Some(packet))
            } else {
                let Some(next_hop) = next_hop_for(&state, destination) else {
                    warn!("[{}] no route to {}", self.id, destination);
                    return Err(RouterError::NoRoute(destination.to_string()));
                };
                let outbound = vec![Outbound {
                    to: next_hop.clone(),
                    packet,
                }];
                (Disposition::Forwarded { next_hop }, outbound, None)
            }
        };

        if let Some(packet) = local {
            self.deliver(packet);
        }
        let reports = self.transmit(outbound).await;
        if let Disposition::Forwarded { .. } = disposition {
            if let Some(report) = reports.into_iter().next() {
                report.result?;
            }
        }
        Ok(disposition)
    }

    pub fn subscribe_deliveries(&self) -> broadcast::Receiver<Packet> {
        self.deliveries.subscribe()
    }

    pub async fn routing_table(&self) -> RoutingTable {
        self.state.lock().await.routing_table.clone()
    }

    pub async fn route_to(&self, destination: &str) -> RouteEntry {
        self.state.lock().await.routing_table.lookup(destination)
    }

    pub async fn neighbors(&self) -> Vec<Neighbor> {
        self.state.lock().await.neighbors.iter().cloned().collect()
    }

    pub async fn lsdb_entries(&self) -> Vec<(NodeId, LsdbEntry)> {
        let state = self.state.lock().await;
        state
            .lsdb
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    pub async fn status(&self) -> RouterStatus {
        let state = self.state.lock().await;
        RouterStatus {
            node_id: state.id.clone(),
            phase: state.phase,
            neighbors: state.neighbors.list_neighbors(),
            lsdb_entries: state.lsdb.len(),
            seen_lsp_ids: state.lsdb.seen_count(),
            seen_data_ids: state.data_seen.len(),
            reachable: state.routing_table.reachable_count(),
            sequence: state.sequence,
        }
    }

    pub async fn format_status(&self) -> String {
        let status = self.status().await;
        let table = self.routing_table().await;
        let mut output = String::new();

        let _ = writeln!(output, "Router {} ({:?})", status.node_id, status.phase);
        let _ = writeln!(output, "Neighbors: {}", status.neighbors.join(", "));
        let _ = writeln!(
            output,
            "LSDB: {} entries, {} LSP ids seen, sequence {}",
            status.lsdb_entries, status.seen_lsp_ids, status.sequence
        );
        let _ = write!(output, "{}", table);
        output
    }

    fn deliver(&self, packet: Packet) {
        info!(
            "[{}] {} from {}: {}",
            self.id,
            packet.kind.type_name(),
            packet.from,
            packet.payload
        );
        // No subscriber is fine: delivery then ends at the log line above
        let _ = self.deliveries.send(packet);
    }

    /// Sends every packet in parallel and waits for all attempts.
    async fn transmit(&self, outbound: Vec<Outbound>) -> Vec<SendReport> {
        let mut sends = JoinSet::new();
        for Outbound { to, packet } in outbound {
            let transport = Arc::clone(&self.transport);
            sends.spawn(async move {
                let result = match packet.encode() {
                    Ok(bytes) => transport.send(&to, bytes).await.map_err(RouterError::from),
                    Err(e) => Err(RouterError::from(e)),
                };
                SendReport { to, result }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok(report) => {
                    if let Err(e) = &report.result {
                        warn!("[{}] send to {} failed: {}", self.id, report.to, e);
                    }
                    reports.push(report);
                }
                Err(e) => warn!("[{}] send task failed: {}", self.id, e),
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryNetwork;

    fn config(id: &str, neighbors: &[&str]) -> RouterConfig {
        let mut config = RouterConfig::new(id);
        for n in neighbors {
            config.neighbors.insert(n.to_string(), 1.0);
        }
        config.timers.initial_delay_ms = 3_600_000;
        config
    }

    fn neighbor_lsp(originator: &str, neighbor: &str) -> Packet {
        let link_state = crate::protocol::LinkState {
            originator: originator.to_string(),
            sequence: 1,
            neighbors: [(neighbor.to_string(), 1.0)].into_iter().collect(),
        };
        Packet::new(PacketKind::Lsp(link_state), originator, "broadcast", 10, Value::Null)
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &["B"]), network.transport("A"));
        assert_eq!(router.phase().await, RouterPhase::Init);
        assert!(matches!(router.stop().await, Err(RouterError::InvalidTransition { .. })));

        router.start().await.unwrap();
        assert_eq!(router.phase().await, RouterPhase::Running);
        assert!(router.start().await.is_err());

        let waiter = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.wait_stopped().await })
        };
        router.stop().await.unwrap();
        assert_eq!(router.phase().await, RouterPhase::Stopped);
        tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
            .await
            .expect("wait_stopped did not resolve")
            .unwrap();
        // Already stopped: returns immediately
        router.wait_stopped().await;
        assert!(router.start().await.is_err());
        assert_eq!(
            router.handle_bytes(b"{}").await,
            Disposition::Dropped(DropReason::Malformed)
        );
    }

    #[tokio::test]
    async fn test_inbound_ignored_unless_running() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &["B"]), network.transport("A"));
        let hello = Packet::new(PacketKind::Hello, "B", "A", 1, Value::Null);
        assert_eq!(
            router.handle_packet(hello).await,
            Disposition::Dropped(DropReason::NotRunning)
        );
        assert!(matches!(router.originate_lsp().await, Err(RouterError::NotRunning)));
    }

    #[tokio::test]
    async fn test_send_without_route_is_reported() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &["B"]), network.transport("A"));
        router.start().await.unwrap();

        let err = router.send_message("Z", Value::from("hi")).await.unwrap_err();
        assert!(matches!(err, RouterError::NoRoute(ref d) if d == "Z"));

        let route = router.route_to("Z").await;
        assert!(route.cost.is_infinite());
        assert!(route.next_hop.is_none());
        router.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_to_self_is_delivered_locally() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &[]), network.transport("A"));
        router.start().await.unwrap();
        let mut deliveries = router.subscribe_deliveries();

        let disposition = router.send_message("A", Value::from("loop")).await.unwrap();
        assert_eq!(disposition, Disposition::Delivered);
        assert_eq!(deliveries.recv().await.unwrap().payload, Value::from("loop"));
        router.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &["B"]), network.transport("A"));
        router.start().await.unwrap();

        // B never subscribed
        let err = router.send_message("B", Value::from("hi")).await.unwrap_err();
        assert!(matches!(err, RouterError::Transport(_)));
        assert_eq!(router.send_hellos().await, 0);
        router.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_and_format() {
        let network = MemoryNetwork::new();
        let router = Router::new(config("A", &["B"]), network.transport("A"));
        router.start().await.unwrap();
        router.originate_lsp().await.unwrap();
        router.handle_packet(neighbor_lsp("B", "A")).await;

        let status = router.status().await;
        assert_eq!(status.neighbors, vec!["B"]);
        assert_eq!(status.lsdb_entries, 2);
        assert_eq!(status.reachable, 1);

        let text = router.format_status().await;
        assert!(text.contains("Router A"));
        assert!(text.contains("A→B"));
        router.stop().await.unwrap();
    }
}
