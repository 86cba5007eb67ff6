//! Change events emitted by the graph model.
//!
//! Every successful apply produces a sequence of events describing what
//! changed. The spatial index and the render engine consume these instead
//! of watching the model directly, so each can be driven with synthetic
//! events in tests.

use flowloom_core::{ConnectionId, NodeId};
use serde::{Deserialize, Serialize};

/// A single change to the document, in apply order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    NodeInserted { node_id: NodeId },
    NodeUpdated { node_id: NodeId },
    NodeRemoved { node_id: NodeId },
    ConnectionInserted { connection_id: ConnectionId },
    ConnectionUpdated { connection_id: ConnectionId },
    ConnectionRemoved { connection_id: ConnectionId },
    /// A connection lost an endpoint during concurrent editing and was
    /// flagged rather than dropped.
    ConnectionDetached { connection_id: ConnectionId },
}
