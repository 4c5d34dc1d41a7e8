//! One JSON packet per TCP connection: the sender connects, writes the
//! encoded packet and closes; the receiver reads until EOF.

use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::address_book::AddressBook;
use super::transport::{INBOUND_QUEUE, Subscription, Transport};
use crate::NodeId;
use crate::error::TransportError;

pub const MAX_PACKET_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct TcpTransport {
    local: NodeId,
    book: AddressBook,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(local: &str, book: AddressBook, connect_timeout: Duration) -> Self {
        Self {
            local: local.to_string(),
            book,
            connect_timeout,
        }
    }

    fn resolve(&self, node: &str) -> Result<SocketAddr, TransportError> {
        self.book
            .resolve(node)
            .ok_or_else(|| TransportError::UnknownAddress(node.to_string()))
    }
}

impl Transport for TcpTransport {
    async fn subscribe(&self) -> Result<Subscription, TransportError> {
        let addr = self.resolve(&self.local)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!("[{}] listening on {}", self.local, addr);

        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);
        let local = self.local.clone();
        let accept_task = tokio::spawn(accept_loop(listener, tx, local, self.connect_timeout));
        Ok(Subscription::with_listener(rx, accept_task))
    }

    async fn send(&self, destination: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let addr = self.resolve(destination)?;
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout { addr })?
            .map_err(|source| TransportError::Connect { addr, source })?;

        stream.write_all(&bytes).await?;
        stream.shutdown().await?;
        debug!("[{}] sent {} bytes to {} ({})", self.local, bytes.len(), destination, addr);
        Ok(())
    }
}

/// Each connection gets `read_timeout` to deliver its packet and close.
async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<Vec<u8>>,
    local: NodeId,
    read_timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let tx = tx.clone();
                let local = local.clone();
                tokio::spawn(async move {
                    match timeout(read_timeout, read_packet(stream)).await {
                        Err(_) => warn!("[{}] read from {} timed out", local, peer),
                        Ok(Ok(bytes)) if bytes.is_empty() => {}
                        Ok(Ok(bytes)) => {
                            if tx.send(bytes).await.is_err() {
                                debug!("[{}] inbound queue closed, dropping packet from {}", local, peer);
                            }
                        }
                        Ok(Err(e)) => warn!("[{}] failed reading from {}: {}", local, peer, e),
                    }
                });
            }
            Err(e) => {
                error!("[{}] failed to accept connection: {}", local, e);
            }
        }
    }
}

async fn read_packet(stream: TcpStream) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.take(MAX_PACKET_BYTES).read_to_end(&mut buf).await?;
    Ok(buf)
}
