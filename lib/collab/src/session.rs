//! Per-client collaboration session.

use crate::error::{ConflictVoid, SyncError, VoidReason};
use crate::presence::{PresenceState, PresenceTracker};
use crate::transform::{transform_remote, PendingLocal};
use crate::wire::WireMessage;
use flowloom_core::{ClientId, OperationId};
use flowloom_graph::{
    ApplyOutcome, ChangeEvent, GraphModel, LamportClock, Operation, OperationPayload,
    RejectionReason,
};
use std::collections::VecDeque;

/// Something the session did that the host may want to surface or react
/// to (refresh the spatial index, show a notice).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A remote operation was applied; the events describe the changes.
    RemoteApplied {
        operation_id: OperationId,
        events: Vec<ChangeEvent>,
    },
    /// The relay confirmed a local operation.
    LocalAcked { operation_id: OperationId },
    /// A local optimistic operation lost a conflict and was rolled back.
    LocalVoided {
        conflict: ConflictVoid,
        /// Rollback changes, for index maintenance.
        events: Vec<ChangeEvent>,
    },
    /// A remote operation was voided or failed validation here; nothing
    /// was applied.
    RemoteDropped {
        operation_id: OperationId,
        reason: DropReason,
    },
    /// The document was replaced by an authoritative snapshot; derived
    /// state must be rebuilt wholesale.
    Resynced { revision: u64 },
    /// A participant's presence changed.
    PresenceChanged { client: ClientId },
}

/// Why a remote operation was not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Voided by a transform rule (e.g. a pending local delete).
    Voided(VoidReason),
    /// Failed model validation.
    Rejected(RejectionReason),
}

/// Client-side collaboration state: the pending queue, the outbox, and
/// presence. The session owns no document state; it drives the shared
/// [`GraphModel`] passed into each call.
#[derive(Debug)]
pub struct CollabSession {
    client: ClientId,
    /// Clock for local-only repair operations; observes remote stamps so
    /// repairs always sort after what they react to.
    clock: LamportClock,
    repair_seq: u64,
    pending: Vec<PendingLocal>,
    outbox: VecDeque<WireMessage>,
    connected: bool,
    last_revision: u64,
    presence: PresenceTracker,
}

impl CollabSession {
    /// Creates a session; starts offline until the join snapshot arrives.
    #[must_use]
    pub fn new(client: ClientId) -> Self {
        Self {
            client,
            clock: LamportClock::new(client),
            repair_seq: 0,
            pending: Vec::new(),
            outbox: VecDeque::new(),
            connected: false,
            last_revision: 0,
            presence: PresenceTracker::new(),
        }
    }

    /// The owning client.
    #[must_use]
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Whether the channel is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Operations sent but not yet acknowledged.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Last revision confirmed by the relay.
    #[must_use]
    pub fn last_revision(&self) -> u64 {
        self.last_revision
    }

    /// Presence of the other participants.
    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Marks the channel down. Local edits keep queueing.
    pub fn disconnect(&mut self) {
        self.connected = false;
        tracing::info!(client = %self.client, "collaboration channel down, editing offline");
    }

    /// The message to send when (re)establishing the channel.
    #[must_use]
    pub fn resync_request(&self) -> WireMessage {
        WireMessage::ResyncRequest {
            last_revision: self.last_revision,
        }
    }

    /// Queues a locally applied operation for the relay.
    ///
    /// The operation has already gone through `GraphModel::apply`; the
    /// session only tracks and ships it.
    pub fn queue_local(&mut self, operation: Operation) {
        self.clock.observe(operation.timestamp);
        self.outbox.push_back(WireMessage::Operation {
            operation: operation.clone(),
            revision_ref: self.last_revision,
        });
        self.pending.push(PendingLocal {
            operation,
            revision_ref: self.last_revision,
        });
    }

    /// Queues a presence update. Fire-and-forget: dropped while offline.
    pub fn queue_presence(&mut self, presence: PresenceState) {
        if self.connected {
            self.outbox.push_back(WireMessage::Presence { presence });
        }
    }

    /// Drains messages ready to go on the wire. Empty while offline.
    pub fn take_outgoing(&mut self) -> Vec<WireMessage> {
        if !self.connected {
            return Vec::new();
        }
        self.outbox.drain(..).collect()
    }

    /// Handles one incoming message, driving the model.
    pub fn handle_message(
        &mut self,
        message: WireMessage,
        model: &mut GraphModel,
    ) -> Result<Vec<SessionEvent>, SyncError> {
        match message {
            WireMessage::Operation { operation, .. } => Ok(self.handle_remote(operation, model)),
            WireMessage::Ack {
                operation_id,
                revision,
            } => {
                self.last_revision = self.last_revision.max(revision);
                let before = self.pending.len();
                self.pending.retain(|p| p.operation.id != operation_id);
                if self.pending.len() == before {
                    // Ack for something already voided; nothing to do.
                    return Ok(Vec::new());
                }
                Ok(vec![SessionEvent::LocalAcked { operation_id }])
            }
            WireMessage::Snapshot { document, revision } => {
                self.handle_snapshot(&document, revision, model)
            }
            WireMessage::Voided {
                operation_id,
                reason,
            } => Ok(self.handle_voided(operation_id, reason, model)),
            WireMessage::Presence { presence } => {
                if presence.client == self.client {
                    return Ok(Vec::new());
                }
                let client = presence.client;
                self.presence.update(presence);
                Ok(vec![SessionEvent::PresenceChanged { client }])
            }
            WireMessage::ResyncRequest { .. } => {
                // Server-bound only; a client receiving one is a protocol
                // error but not worth tearing the channel down for.
                Err(SyncError::Malformed("resync_request sent to client".into()))
            }
        }
    }

    fn handle_remote(&mut self, operation: Operation, model: &mut GraphModel) -> Vec<SessionEvent> {
        if operation.client == self.client {
            return Vec::new();
        }
        self.clock.observe(operation.timestamp);

        let operation_id = operation.id;
        let mut events = Vec::new();
        let result = transform_remote(operation, &mut self.pending);

        for conflict in result.voided_local {
            tracing::debug!(
                op = %conflict.operation_id,
                reason = %conflict.reason,
                "local operation voided by remote"
            );
            events.push(SessionEvent::LocalVoided {
                conflict,
                events: Vec::new(),
            });
        }

        // Roll back losing optimistic state before the winner lands.
        for repair in result.repairs {
            let repair_op = self.next_repair(repair);
            if let ApplyOutcome::Applied(change) = model.apply(&repair_op) {
                if let Some(SessionEvent::LocalVoided { events: ev, .. }) = events.last_mut() {
                    ev.extend(change.events);
                }
            }
        }

        if let Some(reason) = result.remote_void {
            events.push(SessionEvent::RemoteDropped {
                operation_id,
                reason: DropReason::Voided(reason),
            });
            return events;
        }

        let Some(remote) = result.remote else {
            // Emptied by the per-field merge; silently dropped.
            return events;
        };

        match model.apply(&remote) {
            ApplyOutcome::Applied(change) => {
                self.last_revision = self.last_revision.max(change.revision);
                events.push(SessionEvent::RemoteApplied {
                    operation_id,
                    events: change.events,
                });
            }
            ApplyOutcome::AlreadyApplied => {}
            ApplyOutcome::Rejected(reason) => {
                tracing::debug!(op = %operation_id, %reason, "remote operation rejected");
                events.push(SessionEvent::RemoteDropped {
                    operation_id,
                    reason: DropReason::Rejected(reason),
                });
            }
        }
        events
    }

    fn handle_snapshot(
        &mut self,
        document: &flowloom_graph::DocumentSnapshot,
        revision: u64,
        model: &mut GraphModel,
    ) -> Result<Vec<SessionEvent>, SyncError> {
        let restored = GraphModel::restore(document, model.registry().clone())
            .map_err(|e| SyncError::Malformed(e.to_string()))?;
        *model = restored;
        self.connected = true;
        self.last_revision = revision;

        // Queued operation messages are superseded by the replay below.
        self.outbox
            .retain(|m| !matches!(m, WireMessage::Operation { .. }));

        // Replay surviving pending operations on top of the authoritative
        // state and re-send them; drop the ones the rules invalidated.
        let pending = std::mem::take(&mut self.pending);
        let mut events = vec![SessionEvent::Resynced { revision }];
        for entry in pending {
            match model.apply(&entry.operation) {
                ApplyOutcome::Applied(_) | ApplyOutcome::AlreadyApplied => {
                    self.outbox.push_back(WireMessage::Operation {
                        operation: entry.operation.clone(),
                        revision_ref: revision,
                    });
                    self.pending.push(PendingLocal {
                        operation: entry.operation,
                        revision_ref: revision,
                    });
                }
                ApplyOutcome::Rejected(reason) => {
                    tracing::info!(
                        op = %entry.operation.id,
                        %reason,
                        "pending local dropped during resync"
                    );
                    events.push(SessionEvent::RemoteDropped {
                        operation_id: entry.operation.id,
                        reason: DropReason::Rejected(reason),
                    });
                }
            }
        }
        tracing::info!(revision, pending = self.pending.len(), "resynced");
        Ok(events)
    }

    fn handle_voided(
        &mut self,
        operation_id: OperationId,
        reason: VoidReason,
        model: &mut GraphModel,
    ) -> Vec<SessionEvent> {
        let Some(position) = self
            .pending
            .iter()
            .position(|p| p.operation.id == operation_id)
        else {
            return Vec::new();
        };
        let entry = self.pending.remove(position);

        // Undo the optimistic connection insert; other payload kinds are
        // rolled back by the winning remote operation itself.
        let mut rollback_events = Vec::new();
        if let OperationPayload::InsertConnection { connection } = &entry.operation.payload {
            let repair = self.next_repair(OperationPayload::DeleteConnection {
                connection_id: connection.id,
            });
            if let ApplyOutcome::Applied(change) = model.apply(&repair) {
                rollback_events = change.events;
            }
        }
        vec![SessionEvent::LocalVoided {
            conflict: ConflictVoid {
                operation_id,
                reason,
            },
            events: rollback_events,
        }]
    }

    fn next_repair(&mut self, payload: OperationPayload) -> Operation {
        self.repair_seq += 1;
        Operation::new(self.client, self.clock.tick(), self.repair_seq, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowloom_core::{DocumentId, NodeId, Point, Size};
    use flowloom_graph::{
        Connection, InputPort, Node, NodePatch, NodeTypeDefinition, NodeTypeRegistry,
        OutputPort, PortSchema, PropertyValue,
    };

    fn registry() -> NodeTypeRegistry {
        let mut registry = NodeTypeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("step", "Step")
                .with_input(InputPort::new("input", PortSchema::any()))
                .with_output(OutputPort::new("output", PortSchema::any())),
        );
        registry
    }

    /// One simulated participant: model, session, and a local clock.
    struct Peer {
        session: CollabSession,
        model: GraphModel,
        clock: LamportClock,
        seq: u64,
    }

    impl Peer {
        fn new(doc: DocumentId) -> Self {
            let client = ClientId::new();
            let mut session = CollabSession::new(client);
            session.connected = true;
            Self {
                session,
                model: GraphModel::new(doc, "doc", registry()),
                clock: LamportClock::new(client),
                seq: 0,
            }
        }

        /// Applies a payload locally and queues it, like the controller
        /// and canvas do for a real edit.
        fn edit(&mut self, payload: OperationPayload) -> Operation {
            self.seq += 1;
            let op = Operation::new(
                self.session.client(),
                self.clock.tick(),
                self.seq,
                payload,
            );
            assert!(self.model.apply(&op).is_applied(), "local edit must apply");
            self.session.queue_local(op.clone());
            op
        }

        fn edit_at(&mut self, counter: u64, payload: OperationPayload) -> Operation {
            self.seq += 1;
            let op = Operation::new(
                self.session.client(),
                flowloom_graph::LogicalTimestamp::new(counter, self.session.client()),
                self.seq,
                payload,
            );
            assert!(self.model.apply(&op).is_applied(), "local edit must apply");
            self.session.queue_local(op.clone());
            op
        }

        fn receive(&mut self, operation: &Operation) -> Vec<SessionEvent> {
            self.session
                .handle_message(
                    WireMessage::Operation {
                        operation: operation.clone(),
                        revision_ref: 0,
                    },
                    &mut self.model,
                )
                .expect("handle")
        }

        fn ack(&mut self, operation: &Operation, revision: u64) {
            self.session
                .handle_message(
                    WireMessage::Ack {
                        operation_id: operation.id,
                        revision,
                    },
                    &mut self.model,
                )
                .expect("handle");
        }
    }

    /// Seeds both peers with the same starting node outside the session
    /// machinery, as if it came from the join snapshot.
    fn seed_shared_node(peers: &mut [&mut Peer]) -> NodeId {
        let node = Node::new("step", Point::new(0.0, 0.0), Size::new(100.0, 50.0));
        let id = node.id;
        let seeder = ClientId::new();
        let op = Operation::new(
            seeder,
            flowloom_graph::LogicalTimestamp::new(1, seeder),
            1,
            OperationPayload::InsertNode { node },
        );
        for peer in peers {
            assert!(peer.model.apply(&op).is_applied());
        }
        id
    }

    fn assert_converged(a: &Peer, b: &Peer) {
        let sa = a.model.snapshot();
        let sb = b.model.snapshot();
        assert_eq!(sa.nodes, sb.nodes, "node state diverged");
        assert_eq!(sa.connections, sb.connections, "connection state diverged");
    }

    #[test]
    fn concurrent_inserts_converge_in_either_order() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);

        let op_a = a.edit(OperationPayload::InsertNode {
            node: Node::new("step", Point::new(0.0, 0.0), Size::new(100.0, 50.0)),
        });
        let op_b = b.edit(OperationPayload::InsertNode {
            node: Node::new("step", Point::new(300.0, 0.0), Size::new(100.0, 50.0)),
        });

        // Server order: A then B; A sees B's op, B sees A's op.
        a.receive(&op_b);
        b.receive(&op_a);
        a.ack(&op_a, 1);
        b.ack(&op_b, 2);

        assert_eq!(a.model.node_count(), 2);
        assert_converged(&a, &b);
    }

    #[test]
    fn rename_and_move_both_survive() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);
        let node_id = seed_shared_node(&mut [&mut a, &mut b]);

        // A renames at t=10, B moves at t=8; concurrent.
        let rename = a.edit_at(
            10,
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::set_property("label", PropertyValue::String("Fetch".into())),
            },
        );
        let shift = b.edit_at(
            8,
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::move_to(Point::new(40.0, 0.0)),
            },
        );

        a.receive(&shift);
        b.receive(&rename);
        a.ack(&rename, 2);
        b.ack(&shift, 3);

        for peer in [&a, &b] {
            let node = peer.model.node(node_id).expect("node");
            assert_eq!(
                node.property("label"),
                Some(&PropertyValue::String("Fetch".into())),
                "rename survives"
            );
            assert_eq!(node.position, Point::new(40.0, 0.0), "move survives");
        }
        assert_converged(&a, &b);
    }

    #[test]
    fn contested_field_goes_to_later_timestamp_in_both_orders() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);
        let node_id = seed_shared_node(&mut [&mut a, &mut b]);

        let early = a.edit_at(
            5,
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::set_property("label", PropertyValue::String("Early".into())),
            },
        );
        let late = b.edit_at(
            9,
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::set_property("label", PropertyValue::String("Late".into())),
            },
        );

        a.receive(&late);
        b.receive(&early);

        for peer in [&a, &b] {
            assert_eq!(
                peer.model.node(node_id).expect("node").property("label"),
                Some(&PropertyValue::String("Late".into()))
            );
        }
        assert_converged(&a, &b);
    }

    #[test]
    fn delete_vs_connect_voids_the_connection() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);
        let doomed = seed_shared_node(&mut [&mut a, &mut b]);
        let stable = seed_shared_node(&mut [&mut a, &mut b]);

        // A deletes X; B concurrently connects X → stable.
        let delete = a.edit(OperationPayload::DeleteNode { node_id: doomed });
        let connect = b.edit(OperationPayload::InsertConnection {
            connection: Connection::new(doomed, "output", stable, "input"),
        });

        // B sees the delete: its pending connect is voided and rolled back.
        let events = b.receive(&delete);
        assert!(
            events.iter().any(|e| matches!(
                e,
                SessionEvent::LocalVoided {
                    conflict: ConflictVoid {
                        reason: VoidReason::NodeDeleted { .. },
                        ..
                    },
                    ..
                }
            )),
            "B is notified its operation was voided"
        );
        assert!(b.model.node(doomed).is_none());
        assert_eq!(b.model.connection_count(), 0, "no dangling connection");

        // A sees the connect after its pending delete: voided, not applied.
        let events = a.receive(&connect);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::RemoteDropped { .. })));
        assert_eq!(a.model.connection_count(), 0);
        assert_converged(&a, &b);
    }

    #[test]
    fn port_pair_conflict_keeps_server_winner_on_both_sides() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);
        let source = seed_shared_node(&mut [&mut a, &mut b]);
        let target = seed_shared_node(&mut [&mut a, &mut b]);

        let win = a.edit(OperationPayload::InsertConnection {
            connection: Connection::new(source, "output", target, "input"),
        });
        let lose = b.edit(OperationPayload::InsertConnection {
            connection: Connection::new(source, "output", target, "input"),
        });

        // Server commits A first. B must yield to it.
        let events = b.receive(&win);
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::LocalVoided {
                conflict: ConflictVoid {
                    reason: VoidReason::ConnectionSuperseded { .. },
                    ..
                },
                ..
            }
        )));
        // The channel is ordered: A's ack arrives before B's duplicate,
        // so the duplicate meets an empty pending queue and is rejected.
        a.ack(&win, 3);
        let events = a.receive(&lose);
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::RemoteDropped {
                reason: DropReason::Rejected(RejectionReason::DuplicatePortBinding { .. }),
                ..
            }
        )));

        assert_eq!(a.model.connection_count(), 1);
        assert_eq!(b.model.connection_count(), 1);
        let winner_id = match &win.payload {
            OperationPayload::InsertConnection { connection } => connection.id,
            _ => unreachable!(),
        };
        assert!(b.model.connection(winner_id).is_some());
        assert_converged(&a, &b);
    }

    #[test]
    fn replayed_operation_is_idempotent() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);

        let op = a.edit(OperationPayload::InsertNode {
            node: Node::new("step", Point::new(0.0, 0.0), Size::new(100.0, 50.0)),
        });
        let first = b.receive(&op);
        let second = b.receive(&op);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "replay is silent");
        assert_eq!(b.model.node_count(), 1);
    }

    #[test]
    fn ack_clears_pending() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let op = a.edit(OperationPayload::InsertNode {
            node: Node::new("step", Point::new(0.0, 0.0), Size::new(100.0, 50.0)),
        });
        assert_eq!(a.session.pending_len(), 1);
        a.ack(&op, 5);
        assert_eq!(a.session.pending_len(), 0);
        assert_eq!(a.session.last_revision(), 5);
    }

    #[test]
    fn offline_edits_queue_until_reconnect() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        a.session.disconnect();

        a.edit(OperationPayload::InsertNode {
            node: Node::new("step", Point::new(0.0, 0.0), Size::new(100.0, 50.0)),
        });
        assert!(
            a.session.take_outgoing().is_empty(),
            "nothing leaves while offline"
        );

        // Reconnect: the authoritative snapshot is empty; the queued edit
        // replays on top and is re-sent.
        let resync = a.session.resync_request();
        assert_eq!(resync, WireMessage::ResyncRequest { last_revision: 0 });

        let empty = flowloom_graph::DocumentSnapshot::empty(doc, "doc");
        let events = a
            .session
            .handle_message(
                WireMessage::Snapshot {
                    document: empty,
                    revision: 0,
                },
                &mut a.model,
            )
            .expect("snapshot");
        assert!(matches!(events[0], SessionEvent::Resynced { .. }));
        assert_eq!(a.model.node_count(), 1, "pending edit replayed");
        let outgoing = a.session.take_outgoing();
        assert_eq!(outgoing.len(), 1, "pending edit re-sent");
    }

    #[test]
    fn resync_drops_newly_invalid_pending() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let mut b = Peer::new(doc);
        let shared = seed_shared_node(&mut [&mut a, &mut b]);
        let other = seed_shared_node(&mut [&mut a, &mut b]);

        // A goes offline and connects shared → other.
        a.session.disconnect();
        a.edit(OperationPayload::InsertConnection {
            connection: Connection::new(shared, "output", other, "input"),
        });

        // Meanwhile the authoritative document deleted `shared`.
        let mut authoritative = b.model.snapshot();
        authoritative.nodes.retain(|n| n.id != shared);
        authoritative.revision = 10;

        let events = a
            .session
            .handle_message(
                WireMessage::Snapshot {
                    document: authoritative,
                    revision: 10,
                },
                &mut a.model,
            )
            .expect("snapshot");

        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::RemoteDropped { .. })));
        assert_eq!(a.session.pending_len(), 0);
        assert_eq!(a.model.connection_count(), 0);
        assert!(a.session.take_outgoing().is_empty());
    }

    #[test]
    fn presence_updates_tracked_not_applied() {
        let doc = DocumentId::new();
        let mut a = Peer::new(doc);
        let other = ClientId::new();

        let events = a
            .session
            .handle_message(
                WireMessage::Presence {
                    presence: PresenceState {
                        client: other,
                        name: "ada".into(),
                        cursor: Some(Point::new(5.0, 5.0)),
                        selection: Vec::new(),
                    },
                },
                &mut a.model,
            )
            .expect("presence");

        assert_eq!(events, vec![SessionEvent::PresenceChanged { client: other }]);
        assert_eq!(a.session.presence().len(), 1);
        assert_eq!(a.model.revision(), 0, "presence never touches the model");
    }
}
