use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NodeId;

pub const DEFAULT_LINK_COST: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborOrigin {
    Static,
    Discovered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: NodeId,
    pub cost: f64,
    pub origin: NeighborOrigin,
    /// Last HELLO or HELLO_ACK received from this neighbor.
    pub last_seen: Option<DateTime<Utc>>,
}

impl Neighbor {
    pub fn configured(id: &str, cost: f64) -> Self {
        Self {
            id: id.to_string(),
            cost,
            origin: NeighborOrigin::Static,
            last_seen: None,
        }
    }

    pub fn discovered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            cost: DEFAULT_LINK_COST,
            origin: NeighborOrigin::Discovered,
            last_seen: Some(Utc::now()),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Some(Utc::now());
    }

    pub fn seconds_since_seen(&self) -> Option<i64> {
        self.last_seen
            .map(|seen| Utc::now().signed_duration_since(seen).num_seconds())
    }
}
