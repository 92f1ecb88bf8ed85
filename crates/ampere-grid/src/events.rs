//! Notifications the ledger hands to its host.

use serde::{Deserialize, Serialize};

use crate::types::{NetworkId, NodeId};

/// Who a power status notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node")]
pub enum EventScope {
    /// Every node of the network.
    Network,
    /// A single node, e.g. one that just attached.
    Node(NodeId),
}

/// Events produced while the system ticks or reacts to topology changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GridEvent {
    /// Power availability changed (or a node needs to re-read it).
    PowerStatusChanged {
        network: NetworkId,
        scope: EventScope,
        powered: bool,
        tick: u64,
    },

    /// Stored energy moved across a watched level.
    ThresholdCrossed {
        network: NetworkId,
        consumer: NodeId,
        level: f64,
        stored: f64,
        tick: u64,
    },

    /// The graph-wide unbounded-source flag of a network changed.
    InfiniteStoreChanged {
        network: NetworkId,
        infinite: bool,
        tick: u64,
    },
}

impl GridEvent {
    /// Tick the event was produced in.
    pub fn tick(&self) -> u64 {
        match self {
            GridEvent::PowerStatusChanged { tick, .. } => *tick,
            GridEvent::ThresholdCrossed { tick, .. } => *tick,
            GridEvent::InfiniteStoreChanged { tick, .. } => *tick,
        }
    }

    /// Network the event belongs to.
    pub fn network(&self) -> NetworkId {
        match self {
            GridEvent::PowerStatusChanged { network, .. } => *network,
            GridEvent::ThresholdCrossed { network, .. } => *network,
            GridEvent::InfiniteStoreChanged { network, .. } => *network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = GridEvent::ThresholdCrossed {
            network: NetworkId(1),
            consumer: NodeId(7),
            level: 250.0,
            stored: 240.0,
            tick: 12,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ThresholdCrossed"));

        let parsed: GridEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tick(), 12);
        assert_eq!(parsed.network(), NetworkId(1));
    }

    #[test]
    fn scope_serialization() {
        let event = GridEvent::PowerStatusChanged {
            network: NetworkId(2),
            scope: EventScope::Node(NodeId(3)),
            powered: false,
            tick: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: GridEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
