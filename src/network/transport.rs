use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;

/// Queue depth between a transport listener and the router.
pub const INBOUND_QUEUE: usize = 1024;

/// Delivery substrate used by a router. Implementations own the mapping from
/// node id to concrete address.
pub trait Transport: Send + Sync + 'static {
    /// Starts listening for the local node. Raw packets arrive on the returned
    /// subscription in receipt order per sender.
    fn subscribe(&self) -> impl Future<Output = Result<Subscription, TransportError>> + Send;

    /// Best-effort send of one encoded packet.
    fn send(
        &self,
        destination: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Inbound side of a transport. Dropping it stops the listener.
#[derive(Debug)]
pub struct Subscription {
    pub inbound: mpsc::Receiver<Vec<u8>>,
    listener: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(inbound: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            inbound,
            listener: None,
        }
    }

    pub fn with_listener(inbound: mpsc::Receiver<Vec<u8>>, listener: JoinHandle<()>) -> Self {
        Self {
            inbound,
            listener: Some(listener),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
