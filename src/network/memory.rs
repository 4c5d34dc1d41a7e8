//! In-process transport: every node gets a mailbox on a shared hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::transport::{INBOUND_QUEUE, Subscription, Transport};
use crate::NodeId;
use crate::error::TransportError;

/// One send attempt as seen by the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub from: NodeId,
    pub to: NodeId,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct Hub {
    mailboxes: HashMap<NodeId, mpsc::Sender<Vec<u8>>>,
    frames: Vec<Frame>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self, node: &str) -> MemoryTransport {
        MemoryTransport {
            local: node.to_string(),
            network: self.clone(),
        }
    }

    /// Every frame sent so far, in send order.
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().frames.clone()
    }

    pub fn frames_to(&self, node: &str) -> Vec<Frame> {
        self.lock()
            .frames
            .iter()
            .filter(|f| f.to == node)
            .cloned()
            .collect()
    }

    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    local: NodeId,
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn local_id(&self) -> &str {
        &self.local
    }
}

impl Transport for MemoryTransport {
    async fn subscribe(&self) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        self.network.lock().mailboxes.insert(self.local.clone(), tx);
        Ok(Subscription::new(rx))
    }

    async fn send(&self, destination: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mailbox = {
            let mut hub = self.network.lock();
            hub.frames.push(Frame {
                from: self.local.clone(),
                to: destination.to_string(),
                bytes: bytes.clone(),
            });
            hub.mailboxes.get(destination).cloned()
        };

        match mailbox {
            Some(tx) => tx
                .send(bytes)
                .await
                .map_err(|_| TransportError::Unreachable(destination.to_string())),
            None => Err(TransportError::Unreachable(destination.to_string())),
        }
    }
}
