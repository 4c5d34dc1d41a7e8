//! Error types shared across the router.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::NodeId;
use crate::router::RouterPhase;

/// Reasons a raw packet fails to decode into a [`crate::protocol::Packet`].
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("hop count must be non-negative, got {0}")]
    NegativeHops(i64),

    #[error("headers[0] carries no packet id")]
    MissingId,

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("lsp packet is missing `{0}`")]
    MissingLinkState(&'static str),

    #[error("invalid link cost {cost} towards {neighbor}")]
    InvalidCost { neighbor: NodeId, cost: f64 },
}

/// Failures reported by a [`crate::network::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no address known for node {0}")]
    UnknownAddress(NodeId),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connection to {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error("node {0} is unreachable")]
    Unreachable(NodeId),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("cannot move router from {from:?} to {to:?}")]
    InvalidTransition { from: RouterPhase, to: RouterPhase },

    #[error("router is not running")]
    NotRunning,

    #[error("no route to {0}")]
    NoRoute(NodeId),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Packet(#[from] PacketError),
}
