//! Wire messages between client and relay.
//!
//! The transport is assumed ordered and reliable (a WebSocket); the
//! protocol does no retransmission of its own beyond reconnect-and-resync.

use crate::error::VoidReason;
use crate::presence::PresenceState;
use flowloom_core::OperationId;
use flowloom_graph::{DocumentSnapshot, Operation};
use serde::{Deserialize, Serialize};

/// A message on the collaboration channel, either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// A graph operation. `revision_ref` is the sender's document
    /// revision when the operation was created.
    Operation {
        operation: Operation,
        revision_ref: u64,
    },
    /// Presence update; non-authoritative, forwarded without ordering.
    Presence { presence: PresenceState },
    /// Relay acknowledgment of a client operation, carrying the
    /// authoritative revision it was committed at.
    Ack { operation_id: OperationId, revision: u64 },
    /// Full document state, served on join and on resync.
    Snapshot {
        document: DocumentSnapshot,
        revision: u64,
    },
    /// Client asks for a snapshot plus anything after `last_revision`.
    ResyncRequest { last_revision: u64 },
    /// An operation lost a conflict and was discarded.
    Voided {
        operation_id: OperationId,
        reason: VoidReason,
    },
}

impl WireMessage {
    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Operation { .. } => "operation",
            Self::Presence { .. } => "presence",
            Self::Ack { .. } => "ack",
            Self::Snapshot { .. } => "snapshot",
            Self::ResyncRequest { .. } => "resync_request",
            Self::Voided { .. } => "voided",
        }
    }

    /// Encodes for the channel.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes from the channel.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
