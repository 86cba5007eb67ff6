//! Collaboration error and conflict types.

use flowloom_core::{ConnectionId, NodeId, OperationId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an optimistic operation was voided by a concurrent remote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VoidReason {
    /// A node the operation depends on was concurrently deleted.
    NodeDeleted { node_id: NodeId },
    /// A concurrent connection claimed the same port pair first.
    ConnectionSuperseded { connection_id: ConnectionId },
}

impl fmt::Display for VoidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeDeleted { node_id } => {
                write!(f, "node {node_id} was deleted by another client")
            }
            Self::ConnectionSuperseded { connection_id } => {
                write!(f, "connection {connection_id} no longer valid")
            }
        }
    }
}

/// Notification that a previously accepted operation was invalidated.
///
/// The local optimistic change has already been rolled back when this is
/// surfaced; the user only needs to be told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictVoid {
    /// The voided operation.
    pub operation_id: OperationId,
    /// Why it lost.
    pub reason: VoidReason,
}

/// Transport-level failures. Never fatal: the session falls back to
/// offline queueing and resyncs on reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The channel dropped; local edits queue until reconnect.
    Disconnected,
    /// A message could not be decoded.
    Malformed(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "collaboration channel disconnected"),
            Self::Malformed(detail) => write!(f, "malformed wire message: {detail}"),
        }
    }
}

impl std::error::Error for SyncError {}
