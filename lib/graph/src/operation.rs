//! Atomic graph operations.
//!
//! Operations are the unit of mutation, of collaborative exchange, and of
//! transformation against concurrent edits. They are immutable once
//! created and serializable for the wire and for local history.
//!
//! Ordering between concurrent operations uses Lamport timestamps with the
//! client id as a deterministic tiebreak; wall-clock time is metadata only
//! and never decides a conflict.

use crate::connection::{Connection, ConnectionPatch};
use crate::node::{Node, NodePatch};
use chrono::{DateTime, Utc};
use flowloom_core::{ClientId, ConnectionId, NodeId, OperationId};
use serde::{Deserialize, Serialize};

/// A Lamport timestamp: logical counter plus origin client as tiebreak.
///
/// The derived ordering (counter first, then client id) is a total order,
/// so any two distinct operations from distinct clients compare
/// consistently on every participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LogicalTimestamp {
    /// Lamport counter.
    pub counter: u64,
    /// Origin client, used as a deterministic tiebreak.
    pub client: ClientId,
}

impl LogicalTimestamp {
    /// Creates a timestamp.
    #[must_use]
    pub const fn new(counter: u64, client: ClientId) -> Self {
        Self { counter, client }
    }
}

/// A Lamport clock owned by one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    counter: u64,
    client: ClientId,
}

impl LamportClock {
    /// Creates a clock for a client, starting at zero.
    #[must_use]
    pub const fn new(client: ClientId) -> Self {
        Self { counter: 0, client }
    }

    /// Advances the clock and returns a fresh timestamp.
    pub fn tick(&mut self) -> LogicalTimestamp {
        self.counter += 1;
        LogicalTimestamp::new(self.counter, self.client)
    }

    /// Merges an observed remote timestamp into the clock.
    pub fn observe(&mut self, remote: LogicalTimestamp) {
        self.counter = self.counter.max(remote.counter);
    }
}

/// The payload of an operation: what mutation to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationPayload {
    /// Inserts a node. The node carries its own id.
    InsertNode { node: Node },
    /// Patches fields of an existing node.
    UpdateNode { node_id: NodeId, patch: NodePatch },
    /// Deletes a node, cascading all connections that reference it.
    DeleteNode { node_id: NodeId },
    /// Inserts a connection. The connection carries its own id.
    InsertConnection { connection: Connection },
    /// Patches fields of an existing connection.
    UpdateConnection {
        connection_id: ConnectionId,
        patch: ConnectionPatch,
    },
    /// Deletes a connection.
    DeleteConnection { connection_id: ConnectionId },
    /// Applies several payloads atomically: all succeed or none apply.
    Batch { operations: Vec<OperationPayload> },
}

impl OperationPayload {
    /// The node this payload depends on existing, if any.
    ///
    /// Used by the delete-wins transform rule: a payload that references a
    /// concurrently deleted node is voided.
    #[must_use]
    pub fn references_node(&self, node_id: NodeId) -> bool {
        match self {
            Self::InsertNode { node } => node.id == node_id,
            Self::UpdateNode { node_id: id, .. } | Self::DeleteNode { node_id: id } => {
                *id == node_id
            }
            Self::InsertConnection { connection } => connection.references(node_id),
            Self::UpdateConnection { .. } | Self::DeleteConnection { .. } => false,
            Self::Batch { operations } => operations.iter().any(|op| op.references_node(node_id)),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsertNode { .. } => "insert_node",
            Self::UpdateNode { .. } => "update_node",
            Self::DeleteNode { .. } => "delete_node",
            Self::InsertConnection { .. } => "insert_connection",
            Self::UpdateConnection { .. } => "update_connection",
            Self::DeleteConnection { .. } => "delete_connection",
            Self::Batch { .. } => "batch",
        }
    }
}

/// An atomic, serializable graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique id; replays of the same id are ignored by the model.
    pub id: OperationId,
    /// The client that generated the operation.
    pub client: ClientId,
    /// Logical timestamp used for conflict resolution.
    pub timestamp: LogicalTimestamp,
    /// Per-client sequence number; enforces FIFO ordering per client.
    pub seq: u64,
    /// Wall-clock creation time. Metadata only; never used for ordering.
    pub created_at: DateTime<Utc>,
    /// The mutation to perform.
    pub payload: OperationPayload,
}

impl Operation {
    /// Creates an operation from a client with a fresh id.
    #[must_use]
    pub fn new(
        client: ClientId,
        timestamp: LogicalTimestamp,
        seq: u64,
        payload: OperationPayload,
    ) -> Self {
        Self {
            id: OperationId::new(),
            client,
            timestamp,
            seq,
            created_at: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowloom_core::{Point, Size};
    use ulid::Ulid;

    fn client(n: u128) -> ClientId {
        ClientId::from_ulid(Ulid::from(n))
    }

    #[test]
    fn lamport_clock_is_monotonic() {
        let mut clock = LamportClock::new(client(1));
        let a = clock.tick();
        let b = clock.tick();
        assert!(a < b);
    }

    #[test]
    fn lamport_clock_observes_remote() {
        let mut clock = LamportClock::new(client(1));
        clock.tick();
        clock.observe(LogicalTimestamp::new(10, client(2)));
        let next = clock.tick();
        assert_eq!(next.counter, 11);
    }

    #[test]
    fn timestamp_tiebreak_on_client() {
        let a = LogicalTimestamp::new(5, client(1));
        let b = LogicalTimestamp::new(5, client(2));
        assert!(a < b);
        assert!(LogicalTimestamp::new(4, client(9)) < a);
    }

    #[test]
    fn payload_node_references() {
        let node = Node::new("transform", Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let node_id = node.id;
        let other = NodeId::new();

        let insert = OperationPayload::InsertNode { node };
        assert!(insert.references_node(node_id));
        assert!(!insert.references_node(other));

        let batch = OperationPayload::Batch {
            operations: vec![OperationPayload::DeleteNode { node_id }],
        };
        assert!(batch.references_node(node_id));
    }

    #[test]
    fn operation_serde_roundtrip() {
        let mut clock = LamportClock::new(client(1));
        let op = Operation::new(
            client(1),
            clock.tick(),
            1,
            OperationPayload::DeleteNode { node_id: NodeId::new() },
        );
        let json = serde_json::to_string(&op).expect("serialize");
        let parsed: Operation = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(op, parsed);
    }
}
