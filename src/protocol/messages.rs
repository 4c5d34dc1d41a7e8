use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::NodeId;
use crate::error::PacketError;

/// Destination sentinel meaning "every node".
pub const BROADCAST: &str = "broadcast";
pub const DEFAULT_HOPS: u32 = 8;
/// Hop count written by [`dec_hops`] when the field cannot be decremented.
pub const EXPIRED_HOPS: i64 = -1;

const REQUIRED_FIELDS: [&str; 6] = ["type", "from", "to", "hops", "headers", "payload"];

/// One header record. `headers[0]` carries the packet id used for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_id"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    pub fn fresh() -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now()),
            extra: Map::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Ids are compared as strings; numeric and boolean ids are stringified.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Accepts RFC 3339 strings or epoch numbers (seconds, or milliseconds when
/// too large to be seconds). Anything else reads as no timestamp.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    })
}

const MILLIS_THRESHOLD: f64 = 1e11;

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let millis = if epoch.abs() >= MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    DateTime::from_timestamp_millis(millis as i64)
}

/// Link-state fields carried by an `lsp` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub originator: NodeId,
    pub sequence: u64,
    pub neighbors: BTreeMap<NodeId, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketKind {
    Hello,
    HelloAck,
    Lsp(LinkState),
    Message,
    Info,
    Echo,
    Other(String),
}

impl PacketKind {
    pub fn type_name(&self) -> &str {
        match self {
            PacketKind::Hello => "hello",
            PacketKind::HelloAck => "hello_ack",
            PacketKind::Lsp(_) => "lsp",
            PacketKind::Message => "message",
            PacketKind::Info => "info",
            PacketKind::Echo => "echo",
            PacketKind::Other(name) => name.as_str(),
        }
    }

    /// Application types that are routed hop by hop and delivered at `to`.
    pub fn carries_data(&self) -> bool {
        matches!(self, PacketKind::Message | PacketKind::Info | PacketKind::Echo)
    }

    /// Parses the data-carrying type names accepted from operators.
    pub fn data_kind(name: &str) -> Option<Self> {
        match name {
            "message" => Some(PacketKind::Message),
            "info" => Some(PacketKind::Info),
            "echo" => Some(PacketKind::Echo),
            _ => None,
        }
    }
}

/// A decoded protocol packet. Only ever constructed from validated input or
/// through [`make_packet`], so `headers[0]` always has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WirePacket", into = "WirePacket")]
pub struct Packet {
    pub kind: PacketKind,
    pub from: NodeId,
    pub to: NodeId,
    pub hops: i64,
    pub headers: Vec<Header>,
    pub payload: Value,
}

#[derive(Serialize, Deserialize)]
struct WirePacket {
    #[serde(rename = "type")]
    packet_type: String,
    from: String,
    to: String,
    hops: i64,
    headers: Vec<Header>,
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    originator: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    neighbors: Option<BTreeMap<NodeId, f64>>,
}

impl TryFrom<WirePacket> for Packet {
    type Error = PacketError;

    fn try_from(wire: WirePacket) -> Result<Self, Self::Error> {
        let WirePacket {
            packet_type,
            from,
            to,
            hops,
            headers,
            payload,
            originator,
            sequence,
            neighbors,
        } = wire;

        if hops < 0 {
            return Err(PacketError::NegativeHops(hops));
        }
        if from.is_empty() {
            return Err(PacketError::EmptyField("from"));
        }
        if packet_type.is_empty() {
            return Err(PacketError::EmptyField("type"));
        }
        match headers.first().and_then(Header::id) {
            Some(id) if !id.is_empty() => {}
            _ => return Err(PacketError::MissingId),
        }

        let kind = match packet_type.as_str() {
            "hello" => PacketKind::Hello,
            "hello_ack" => PacketKind::HelloAck,
            "message" => PacketKind::Message,
            "info" => PacketKind::Info,
            "echo" => PacketKind::Echo,
            "lsp" => {
                let originator = originator
                    .filter(|o| !o.is_empty())
                    .ok_or(PacketError::MissingLinkState("originator"))?;
                let sequence = sequence.ok_or(PacketError::MissingLinkState("sequence"))?;
                let neighbors = neighbors.ok_or(PacketError::MissingLinkState("neighbors"))?;
                if let Some((neighbor, &cost)) =
                    neighbors.iter().find(|(_, c)| !c.is_finite() || **c < 0.0)
                {
                    return Err(PacketError::InvalidCost {
                        neighbor: neighbor.clone(),
                        cost,
                    });
                }
                PacketKind::Lsp(LinkState {
                    originator,
                    sequence,
                    neighbors,
                })
            }
            _ => PacketKind::Other(packet_type),
        };

        Ok(Packet {
            kind,
            from,
            to,
            hops,
            headers,
            payload,
        })
    }
}

impl From<Packet> for WirePacket {
    fn from(packet: Packet) -> Self {
        let packet_type = packet.kind.type_name().to_string();
        let (originator, sequence, neighbors) = match packet.kind {
            PacketKind::Lsp(ls) => (Some(ls.originator), Some(ls.sequence), Some(ls.neighbors)),
            _ => (None, None, None),
        };
        WirePacket {
            packet_type,
            from: packet.from,
            to: packet.to,
            hops: packet.hops,
            headers: packet.headers,
            payload: packet.payload,
            originator,
            sequence,
            neighbors,
        }
    }
}

/// Builds a packet, injecting a fresh id header at `headers[0]` unless the
/// supplied headers already start with one.
pub fn make_packet(
    kind: PacketKind,
    from: impl Into<NodeId>,
    to: impl Into<NodeId>,
    hops: u32,
    payload: Value,
    headers: Option<Vec<Header>>,
) -> Packet {
    let mut headers = headers.unwrap_or_default();
    if headers.first().and_then(Header::id).is_none() {
        headers.insert(0, Header::fresh());
    }
    Packet {
        kind,
        from: from.into(),
        to: to.into(),
        hops: i64::from(hops),
        headers,
        payload,
    }
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        hops: u32,
        payload: Value,
    ) -> Self {
        make_packet(kind, from, to, hops, payload, None)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, PacketError> {
        let Some(object) = value.as_object() else {
            return Err(PacketError::NotAnObject);
        };
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(PacketError::MissingField(*missing));
        }
        let wire: WirePacket = serde_json::from_value(value)?;
        Packet::try_from(wire)
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn id(&self) -> Option<&str> {
        self.headers.first().and_then(Header::id)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.headers.first().and_then(|h| h.timestamp)
    }

    pub fn link_state(&self) -> Option<&LinkState> {
        match &self.kind {
            PacketKind::Lsp(ls) => Some(ls),
            _ => None,
        }
    }

    /// Decrements the hop count and returns the new value.
    pub fn dec_hops(&mut self) -> i64 {
        self.hops = self.hops.saturating_sub(1).max(EXPIRED_HOPS);
        self.hops
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.eq_ignore_ascii_case(BROADCAST)
    }

    /// True when `node` should consume this packet.
    pub fn is_deliver_to(&self, node: &str) -> bool {
        self.to == node || self.is_broadcast()
    }
}

/// Structural validation of an undecoded packet.
pub fn validate(raw: &Value) -> bool {
    Packet::from_value(raw.clone()).is_ok()
}

pub fn get_packet_id(raw: &Value) -> Option<String> {
    let header = raw.get("headers")?.as_array()?.first()?;
    Header::deserialize(header).ok()?.id
}

/// Decrements `hops` in place on an undecoded packet. A missing or
/// non-integral field becomes [`EXPIRED_HOPS`].
pub fn dec_hops(raw: &mut Value) -> i64 {
    let Some(object) = raw.as_object_mut() else {
        return EXPIRED_HOPS;
    };
    let next = match object.get("hops").and_then(Value::as_i64) {
        Some(hops) => hops.saturating_sub(1),
        None => EXPIRED_HOPS,
    };
    object.insert("hops".to_string(), Value::from(next));
    next
}
