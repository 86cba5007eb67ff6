//! Document rooms.
//!
//! A room holds everything the relay knows about one document: the
//! connected members, the base snapshot, the operation backlog, and the
//! authoritative revision counter. The relay never interprets operations;
//! it only orders them, acknowledges them, and fans them out. Conflict
//! resolution is entirely client-side.

use crate::config::RoomConfig;
use flowloom_collab::WireMessage;
use flowloom_core::DocumentId;
use flowloom_graph::{DocumentSnapshot, Operation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Identifies one WebSocket connection within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u64);

static NEXT_MEMBER: AtomicU64 = AtomicU64::new(1);

impl MemberId {
    fn next() -> Self {
        Self(NEXT_MEMBER.fetch_add(1, Ordering::Relaxed))
    }
}

/// One operation with its server-assigned revision.
#[derive(Debug, Clone)]
struct StoredOperation {
    revision: u64,
    operation: Operation,
}

struct RoomState {
    revision: u64,
    base: DocumentSnapshot,
    backlog: Vec<StoredOperation>,
    members: HashMap<MemberId, mpsc::UnboundedSender<WireMessage>>,
}

/// One collaborative document on the relay.
pub struct Room {
    document_id: DocumentId,
    config: RoomConfig,
    state: Mutex<RoomState>,
}

impl Room {
    /// Creates an empty room for a document.
    #[must_use]
    pub fn new(document_id: DocumentId, config: RoomConfig) -> Self {
        Self {
            document_id,
            config,
            state: Mutex::new(RoomState {
                revision: 0,
                base: DocumentSnapshot::empty(document_id, "untitled"),
                backlog: Vec::new(),
                members: HashMap::new(),
            }),
        }
    }

    /// Adds a member and serves it the current state: the base snapshot
    /// followed by the whole backlog. Replay on the client is idempotent,
    /// so over-serving is safe.
    pub async fn join(&self, sender: mpsc::UnboundedSender<WireMessage>) -> MemberId {
        let member = MemberId::next();
        let mut state = self.state.lock().await;

        let _ = sender.send(WireMessage::Snapshot {
            document: state.base.clone(),
            revision: state.base.revision,
        });
        for stored in &state.backlog {
            let _ = sender.send(WireMessage::Operation {
                operation: stored.operation.clone(),
                revision_ref: stored.revision,
            });
        }
        state.members.insert(member, sender);
        tracing::info!(
            document = %self.document_id,
            members = state.members.len(),
            "member joined"
        );
        member
    }

    /// Removes a member. Returns the number left.
    pub async fn leave(&self, member: MemberId) -> usize {
        let mut state = self.state.lock().await;
        state.members.remove(&member);
        tracing::info!(
            document = %self.document_id,
            members = state.members.len(),
            "member left"
        );
        state.members.len()
    }

    /// Handles one message from a member.
    pub async fn handle(&self, from: MemberId, message: WireMessage) {
        match message {
            WireMessage::Operation { operation, .. } => {
                self.commit(from, operation).await;
            }
            WireMessage::Presence { presence } => {
                // Fire-and-forget fan-out, no ordering guarantees.
                let state = self.state.lock().await;
                for (member, sender) in &state.members {
                    if *member != from {
                        let _ = sender.send(WireMessage::Presence {
                            presence: presence.clone(),
                        });
                    }
                }
            }
            WireMessage::ResyncRequest { last_revision } => {
                self.resync(from, last_revision).await;
            }
            other => {
                tracing::warn!(
                    document = %self.document_id,
                    kind = other.kind(),
                    "unexpected client message"
                );
            }
        }
    }

    /// Assigns the next revision, acks the sender, and fans the operation
    /// out to everyone else.
    async fn commit(&self, from: MemberId, operation: Operation) {
        let mut state = self.state.lock().await;
        state.revision += 1;
        let revision = state.revision;
        state.backlog.push(StoredOperation {
            revision,
            operation: operation.clone(),
        });
        if state.backlog.len() == self.config.backlog_warn {
            tracing::warn!(
                document = %self.document_id,
                backlog = state.backlog.len(),
                "backlog is large; joins and resyncs will be slow"
            );
        }

        tracing::debug!(
            document = %self.document_id,
            op = operation.payload.kind(),
            revision,
            "operation committed"
        );
        for (member, sender) in &state.members {
            if *member == from {
                let _ = sender.send(WireMessage::Ack {
                    operation_id: operation.id,
                    revision,
                });
            } else {
                let _ = sender.send(WireMessage::Operation {
                    operation: operation.clone(),
                    revision_ref: revision,
                });
            }
        }
    }

    /// Re-serves the snapshot and backlog to one member.
    async fn resync(&self, to: MemberId, last_revision: u64) {
        let state = self.state.lock().await;
        let Some(sender) = state.members.get(&to) else {
            return;
        };
        tracing::info!(
            document = %self.document_id,
            last_revision,
            revision = state.revision,
            "resync requested"
        );
        let _ = sender.send(WireMessage::Snapshot {
            document: state.base.clone(),
            revision: state.base.revision,
        });
        for stored in &state.backlog {
            let _ = sender.send(WireMessage::Operation {
                operation: stored.operation.clone(),
                revision_ref: stored.revision,
            });
        }
    }
}

/// All live rooms, keyed by document.
#[derive(Default)]
pub struct RoomManager {
    config: RoomConfig,
    rooms: Mutex<HashMap<DocumentId, Arc<Room>>>,
}

impl RoomManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the room for a document, creating it on first join.
    pub async fn room(&self, document_id: DocumentId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(document_id)
            .or_insert_with(|| {
                tracing::info!(document = %document_id, "room created");
                Arc::new(Room::new(document_id, self.config.clone()))
            })
            .clone()
    }

    /// Drops a room once it has no members.
    pub async fn retire_if_empty(&self, document_id: DocumentId) {
        let mut rooms = self.rooms.lock().await;
        let empty = match rooms.get(&document_id) {
            Some(room) => room.state.lock().await.members.is_empty(),
            None => false,
        };
        if empty {
            rooms.remove(&document_id);
            tracing::info!(document = %document_id, "room retired");
        }
    }
}
