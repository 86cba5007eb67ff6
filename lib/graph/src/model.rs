//! The graph model: single source of truth for document state.
//!
//! All mutations flow through [`GraphModel::apply`]. The model validates
//! each operation against its invariants, applies it, bumps the revision
//! counter, and returns the change events for the spatial index and the
//! render engine. Validation failures are returned as typed
//! [`RejectionReason`] values; they are expected flow, not errors.
//!
//! Storage is a petgraph `StableDiGraph` with id-to-index maps for O(1)
//! lookup; stable indices keep the maps valid across removals.

use crate::connection::Connection;
use crate::document::DocumentSnapshot;
use crate::error::{GraphError, RejectionReason};
use crate::event::ChangeEvent;
use crate::node::Node;
use crate::operation::{Operation, OperationPayload};
use crate::registry::NodeTypeRegistry;
use flowloom_core::{ConnectionId, DocumentId, NodeId, OperationId};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef as _;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};

/// The result of applying an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The operation was applied; the change describes what happened.
    Applied(AppliedChange),
    /// The operation id was seen before; state is unchanged.
    AlreadyApplied,
    /// The operation failed validation; state is unchanged.
    Rejected(RejectionReason),
}

impl ApplyOutcome {
    /// Returns true if the operation mutated the document.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Returns the rejection reason, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// What an applied operation changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    /// The operation that was applied.
    pub operation_id: OperationId,
    /// The document revision after the apply.
    pub revision: u64,
    /// Change events in apply order, including cascades.
    pub events: Vec<ChangeEvent>,
}

/// A reference to either entity kind, returned by queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityRef<'a> {
    Node(&'a Node),
    Connection(&'a Connection),
}

/// In-memory document state and the sole mutation entry point.
#[derive(Debug, Clone)]
pub struct GraphModel {
    id: DocumentId,
    name: String,
    revision: u64,
    graph: StableDiGraph<Node, Connection>,
    node_index: HashMap<NodeId, NodeIndex>,
    connection_index: HashMap<ConnectionId, EdgeIndex>,
    /// Connections flagged after losing an endpoint during concurrent
    /// editing. Kept out of the graph (no valid endpoints) but not dropped.
    detached: BTreeMap<ConnectionId, Connection>,
    applied: HashSet<OperationId>,
    registry: NodeTypeRegistry,
}

impl GraphModel {
    /// Creates an empty document with the given registry.
    #[must_use]
    pub fn new(id: DocumentId, name: impl Into<String>, registry: NodeTypeRegistry) -> Self {
        Self {
            id,
            name: name.into(),
            revision: 0,
            graph: StableDiGraph::new(),
            node_index: HashMap::new(),
            connection_index: HashMap::new(),
            detached: BTreeMap::new(),
            applied: HashSet::new(),
            registry,
        }
    }

    /// The document id.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The document name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current revision counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The node type registry.
    #[must_use]
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Number of nodes in the document.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of connections, detached ones included.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connection_index.len() + self.detached.len()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Looks up a connection by id, detached ones included.
    #[must_use]
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        if let Some(index) = self.connection_index.get(&connection_id) {
            return self.graph.edge_weight(*index);
        }
        self.detached.get(&connection_id)
    }

    /// Iterates all nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Iterates all connections, detached ones included.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.graph.edge_weights().chain(self.detached.values())
    }

    /// Returns entities matching the predicate.
    pub fn query<'a, F>(&'a self, mut predicate: F) -> Vec<EntityRef<'a>>
    where
        F: FnMut(&EntityRef<'a>) -> bool,
    {
        let mut out = Vec::new();
        for node in self.nodes() {
            let entity = EntityRef::Node(node);
            if predicate(&entity) {
                out.push(entity);
            }
        }
        for connection in self.connections() {
            let entity = EntityRef::Connection(connection);
            if predicate(&entity) {
                out.push(entity);
            }
        }
        out
    }

    /// Applies an operation.
    ///
    /// Idempotent per operation id: replays return
    /// [`ApplyOutcome::AlreadyApplied`] without touching state. Validation
    /// failures return [`ApplyOutcome::Rejected`]; the document is
    /// unchanged in both cases. Batches are atomic: if any member fails,
    /// nothing applies.
    pub fn apply(&mut self, operation: &Operation) -> ApplyOutcome {
        if self.applied.contains(&operation.id) {
            return ApplyOutcome::AlreadyApplied;
        }

        let mut events = Vec::new();
        let result = match &operation.payload {
            OperationPayload::Batch { operations } => {
                // Atomicity: rehearse the whole batch on a scratch copy,
                // commit only if every member applies.
                let mut scratch = self.clone();
                let mut batch_events = Vec::new();
                let mut failure = None;
                for payload in operations {
                    if let Err(reason) = scratch.apply_payload(payload, &mut batch_events) {
                        failure = Some(reason);
                        break;
                    }
                }
                match failure {
                    Some(reason) => Err(reason),
                    None => {
                        self.graph = scratch.graph;
                        self.node_index = scratch.node_index;
                        self.connection_index = scratch.connection_index;
                        self.detached = scratch.detached;
                        events = batch_events;
                        Ok(())
                    }
                }
            }
            payload => self.apply_payload(payload, &mut events),
        };

        match result {
            Ok(()) => {
                self.applied.insert(operation.id);
                self.revision += 1;
                ApplyOutcome::Applied(AppliedChange {
                    operation_id: operation.id,
                    revision: self.revision,
                    events,
                })
            }
            Err(reason) => ApplyOutcome::Rejected(reason),
        }
    }

    fn apply_payload(
        &mut self,
        payload: &OperationPayload,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        match payload {
            OperationPayload::InsertNode { node } => self.insert_node(node, events),
            OperationPayload::UpdateNode { node_id, patch } => {
                self.update_node(*node_id, patch, events)
            }
            OperationPayload::DeleteNode { node_id } => self.delete_node(*node_id, events),
            OperationPayload::InsertConnection { connection } => {
                self.insert_connection(connection, events)
            }
            OperationPayload::UpdateConnection {
                connection_id,
                patch,
            } => self.update_connection(*connection_id, patch, events),
            OperationPayload::DeleteConnection { connection_id } => {
                self.delete_connection(*connection_id, events)
            }
            OperationPayload::Batch { operations } => {
                // Nested batches flatten; atomicity is handled by `apply`.
                for inner in operations {
                    self.apply_payload(inner, events)?;
                }
                Ok(())
            }
        }
    }

    fn insert_node(
        &mut self,
        node: &Node,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        if self.node_index.contains_key(&node.id) {
            return Err(RejectionReason::DuplicateNode { node_id: node.id });
        }
        if !self.registry.contains(&node.type_id) {
            return Err(RejectionReason::UnknownNodeType {
                type_id: node.type_id.to_string(),
            });
        }
        if !node.has_valid_geometry() {
            return Err(RejectionReason::InvalidGeometry { node_id: node.id });
        }

        let index = self.graph.add_node(node.clone());
        self.node_index.insert(node.id, index);
        events.push(ChangeEvent::NodeInserted { node_id: node.id });
        Ok(())
    }

    fn update_node(
        &mut self,
        node_id: NodeId,
        patch: &crate::node::NodePatch,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        let index = *self
            .node_index
            .get(&node_id)
            .ok_or(RejectionReason::NodeNotFound { node_id })?;

        if let Some(position) = patch.position {
            if !position.is_finite() {
                return Err(RejectionReason::InvalidGeometry { node_id });
            }
        }
        if let Some(size) = patch.size {
            if !size.is_valid() {
                return Err(RejectionReason::InvalidGeometry { node_id });
            }
        }

        let node = self
            .graph
            .node_weight_mut(index)
            .ok_or(RejectionReason::NodeNotFound { node_id })?;
        patch.apply_to(node);
        events.push(ChangeEvent::NodeUpdated { node_id });
        Ok(())
    }

    fn delete_node(
        &mut self,
        node_id: NodeId,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        let index = *self
            .node_index
            .get(&node_id)
            .ok_or(RejectionReason::NodeNotFound { node_id })?;

        // Cascade: every connection referencing the node goes with it.
        let mut cascade: Vec<ConnectionId> = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in self.graph.edges_directed(index, direction) {
                cascade.push(edge.weight().id);
            }
        }
        cascade.sort();
        cascade.dedup(); // self-loops appear in both directions

        for connection_id in cascade {
            if let Some(edge_index) = self.connection_index.remove(&connection_id) {
                self.graph.remove_edge(edge_index);
            }
            events.push(ChangeEvent::ConnectionRemoved { connection_id });
        }

        // Detached connections referencing the node settle out too.
        let settled: Vec<ConnectionId> = self
            .detached
            .iter()
            .filter(|(_, c)| c.references(node_id))
            .map(|(id, _)| *id)
            .collect();
        for connection_id in settled {
            self.detached.remove(&connection_id);
            events.push(ChangeEvent::ConnectionRemoved { connection_id });
        }

        self.graph.remove_node(index);
        self.node_index.remove(&node_id);
        events.push(ChangeEvent::NodeRemoved { node_id });
        Ok(())
    }

    fn insert_connection(
        &mut self,
        connection: &Connection,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        if self.connection_index.contains_key(&connection.id)
            || self.detached.contains_key(&connection.id)
        {
            return Err(RejectionReason::DuplicateConnection {
                connection_id: connection.id,
            });
        }

        let source_index = *self.node_index.get(&connection.source_node).ok_or(
            RejectionReason::NodeNotFound {
                node_id: connection.source_node,
            },
        )?;
        let target_index = *self.node_index.get(&connection.target_node).ok_or(
            RejectionReason::NodeNotFound {
                node_id: connection.target_node,
            },
        )?;

        let source_node = self
            .graph
            .node_weight(source_index)
            .ok_or(RejectionReason::NodeNotFound {
                node_id: connection.source_node,
            })?;
        let target_node = self
            .graph
            .node_weight(target_index)
            .ok_or(RejectionReason::NodeNotFound {
                node_id: connection.target_node,
            })?;

        let source_def =
            self.registry
                .get(&source_node.type_id)
                .ok_or(RejectionReason::UnknownNodeType {
                    type_id: source_node.type_id.to_string(),
                })?;
        let target_def =
            self.registry
                .get(&target_node.type_id)
                .ok_or(RejectionReason::UnknownNodeType {
                    type_id: target_node.type_id.to_string(),
                })?;

        if connection.is_self_loop() && !source_def.allow_self_loops {
            return Err(RejectionReason::SelfLoop {
                node_id: connection.source_node,
            });
        }

        let source_port = source_def.output_port(&connection.source_port).ok_or_else(|| {
            RejectionReason::PortNotFound {
                node_id: connection.source_node,
                port_name: connection.source_port.clone(),
            }
        })?;
        let target_port = target_def.input_port(&connection.target_port).ok_or_else(|| {
            RejectionReason::PortNotFound {
                node_id: connection.target_node,
                port_name: connection.target_port.clone(),
            }
        })?;

        if !source_port.schema.is_compatible_with(&target_port.schema) {
            return Err(RejectionReason::IncompatiblePorts {
                source_node: connection.source_node,
                source_port: connection.source_port.clone(),
                target_node: connection.target_node,
                target_port: connection.target_port.clone(),
            });
        }

        // At most one connection per identical (source port, target port) pair.
        for edge in self.graph.edges_connecting(source_index, target_index) {
            if edge.weight().same_binding(connection) {
                return Err(RejectionReason::DuplicatePortBinding {
                    existing: edge.weight().id,
                });
            }
        }

        let edge_index = self
            .graph
            .add_edge(source_index, target_index, connection.clone());
        self.connection_index.insert(connection.id, edge_index);
        events.push(ChangeEvent::ConnectionInserted {
            connection_id: connection.id,
        });
        Ok(())
    }

    fn update_connection(
        &mut self,
        connection_id: ConnectionId,
        patch: &crate::connection::ConnectionPatch,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        let connection = if let Some(index) = self.connection_index.get(&connection_id) {
            self.graph.edge_weight_mut(*index)
        } else {
            self.detached.get_mut(&connection_id)
        };
        let connection = connection.ok_or(RejectionReason::ConnectionNotFound { connection_id })?;

        patch.apply_to(connection);
        events.push(ChangeEvent::ConnectionUpdated { connection_id });
        Ok(())
    }

    fn delete_connection(
        &mut self,
        connection_id: ConnectionId,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<(), RejectionReason> {
        if let Some(edge_index) = self.connection_index.remove(&connection_id) {
            self.graph.remove_edge(edge_index);
        } else if self.detached.remove(&connection_id).is_none() {
            return Err(RejectionReason::ConnectionNotFound { connection_id });
        }
        events.push(ChangeEvent::ConnectionRemoved { connection_id });
        Ok(())
    }

    /// Moves a live connection into the detached set, flagging it.
    ///
    /// Used by the collaboration layer when a remote delete voids a local
    /// optimistic insert: the connection loses its endpoint but is kept
    /// visible (flagged) rather than silently dropped.
    pub fn detach_connection(&mut self, connection_id: ConnectionId) -> Option<ChangeEvent> {
        let edge_index = self.connection_index.remove(&connection_id)?;
        let mut connection = self.graph.remove_edge(edge_index)?;
        connection.detached = true;
        self.detached.insert(connection_id, connection);
        self.revision += 1;
        Some(ChangeEvent::ConnectionDetached { connection_id })
    }

    /// Produces a normalized snapshot of the document.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        let mut snapshot = DocumentSnapshot {
            id: self.id,
            name: self.name.clone(),
            revision: self.revision,
            nodes: self.nodes().cloned().collect(),
            connections: self.connections().cloned().collect(),
        };
        snapshot.normalize();
        snapshot
    }

    /// Rebuilds a model from a snapshot.
    ///
    /// Connections referencing missing nodes are kept but flagged as
    /// detached. Duplicate ids and invalid geometry are genuine failures.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the snapshot is internally inconsistent.
    pub fn restore(
        snapshot: &DocumentSnapshot,
        registry: NodeTypeRegistry,
    ) -> Result<Self, GraphError> {
        let mut model = Self::new(snapshot.id, snapshot.name.clone(), registry);
        model.revision = snapshot.revision;

        for node in &snapshot.nodes {
            if model.node_index.contains_key(&node.id) {
                return Err(GraphError::DuplicateIdInSnapshot {
                    id: node.id.to_string(),
                });
            }
            if !node.has_valid_geometry() {
                return Err(GraphError::InvalidSnapshotGeometry { node_id: node.id });
            }
            let index = model.graph.add_node(node.clone());
            model.node_index.insert(node.id, index);
        }

        for connection in &snapshot.connections {
            if model.connection_index.contains_key(&connection.id)
                || model.detached.contains_key(&connection.id)
            {
                return Err(GraphError::DuplicateIdInSnapshot {
                    id: connection.id.to_string(),
                });
            }
            let endpoints = (
                model.node_index.get(&connection.source_node).copied(),
                model.node_index.get(&connection.target_node).copied(),
            );
            match endpoints {
                (Some(source), Some(target)) if !connection.detached => {
                    let edge_index = model.graph.add_edge(source, target, connection.clone());
                    model.connection_index.insert(connection.id, edge_index);
                }
                _ => {
                    let mut detached = connection.clone();
                    detached.detached = true;
                    model.detached.insert(connection.id, detached);
                }
            }
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodePatch, PropertyValue};
    use crate::operation::{LamportClock, Operation};
    use crate::port::{InputPort, OutputPort, PortSchema};
    use crate::registry::NodeTypeDefinition;
    use flowloom_core::{ClientId, Point, Size};

    fn registry() -> NodeTypeRegistry {
        let mut registry = NodeTypeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("source", "Source")
                .with_output(OutputPort::new("output", PortSchema::any())),
        );
        registry.register(
            NodeTypeDefinition::new("sink", "Sink")
                .with_input(InputPort::new("input", PortSchema::any())),
        );
        registry.register(
            NodeTypeDefinition::new("transform", "Transform")
                .with_input(InputPort::new("input", PortSchema::any()))
                .with_output(OutputPort::new("output", PortSchema::any()))
                .with_self_loops(),
        );
        registry
    }

    struct Fixture {
        model: GraphModel,
        clock: LamportClock,
        client: ClientId,
        seq: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let client = ClientId::new();
            Self {
                model: GraphModel::new(DocumentId::new(), "test", registry()),
                clock: LamportClock::new(client),
                client,
                seq: 0,
            }
        }

        fn op(&mut self, payload: OperationPayload) -> Operation {
            self.seq += 1;
            Operation::new(self.client, self.clock.tick(), self.seq, payload)
        }

        fn apply(&mut self, payload: OperationPayload) -> ApplyOutcome {
            let op = self.op(payload);
            self.model.apply(&op)
        }

        fn insert_node(&mut self, type_id: &str, x: f64, y: f64) -> Node {
            let node = Node::new(type_id, Point::new(x, y), Size::new(120.0, 60.0));
            let outcome = self.apply(OperationPayload::InsertNode { node: node.clone() });
            assert!(outcome.is_applied(), "insert rejected: {outcome:?}");
            node
        }

        fn connect(&mut self, source: &Node, target: &Node) -> Connection {
            let connection = Connection::new(source.id, "output", target.id, "input");
            let outcome = self.apply(OperationPayload::InsertConnection {
                connection: connection.clone(),
            });
            assert!(outcome.is_applied(), "connect rejected: {outcome:?}");
            connection
        }
    }

    #[test]
    fn insert_and_lookup_node() {
        let mut fx = Fixture::new();
        let node = fx.insert_node("source", 10.0, 20.0);

        assert_eq!(fx.model.node_count(), 1);
        assert_eq!(fx.model.node(node.id).expect("present").position.x, 10.0);
        assert_eq!(fx.model.revision(), 1);
    }

    #[test]
    fn insert_unknown_type_rejected() {
        let mut fx = Fixture::new();
        let node = Node::new("mystery", Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let outcome = fx.apply(OperationPayload::InsertNode { node });
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::UnknownNodeType { .. })
        ));
    }

    #[test]
    fn insert_invalid_geometry_rejected() {
        let mut fx = Fixture::new();
        let node = Node::new("source", Point::new(f64::NAN, 0.0), Size::new(10.0, 10.0));
        let outcome = fx.apply(OperationPayload::InsertNode { node });
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::InvalidGeometry { .. })
        ));
        assert_eq!(fx.model.node_count(), 0);
    }

    #[test]
    fn replay_is_idempotent() {
        let mut fx = Fixture::new();
        let node = Node::new("source", Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let op = fx.op(OperationPayload::InsertNode { node });

        assert!(fx.model.apply(&op).is_applied());
        let snapshot = fx.model.snapshot();

        assert_eq!(fx.model.apply(&op), ApplyOutcome::AlreadyApplied);
        assert_eq!(fx.model.snapshot(), snapshot, "replay must not change state");
    }

    #[test]
    fn update_patches_fields() {
        let mut fx = Fixture::new();
        let node = fx.insert_node("source", 0.0, 0.0);

        let mut patch = NodePatch::move_to(Point::new(50.0, 60.0));
        patch
            .properties
            .insert("label".into(), Some(PropertyValue::String("Fetch".into())));
        let outcome = fx.apply(OperationPayload::UpdateNode {
            node_id: node.id,
            patch,
        });
        assert!(outcome.is_applied());

        let updated = fx.model.node(node.id).expect("present");
        assert_eq!(updated.position, Point::new(50.0, 60.0));
        assert_eq!(
            updated.property("label"),
            Some(&PropertyValue::String("Fetch".into()))
        );
    }

    #[test]
    fn update_missing_node_rejected() {
        let mut fx = Fixture::new();
        let outcome = fx.apply(OperationPayload::UpdateNode {
            node_id: NodeId::new(),
            patch: NodePatch::move_to(Point::new(1.0, 1.0)),
        });
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::NodeNotFound { .. })
        ));
    }

    #[test]
    fn delete_cascades_connections() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let middle = fx.insert_node("transform", 200.0, 0.0);
        let sink = fx.insert_node("sink", 400.0, 0.0);
        let in_conn = fx.connect(&source, &middle);
        let out_conn = fx.connect(&middle, &sink);

        let outcome = fx.apply(OperationPayload::DeleteNode { node_id: middle.id });
        let ApplyOutcome::Applied(change) = outcome else {
            panic!("delete rejected");
        };

        assert!(fx.model.node(middle.id).is_none());
        assert!(fx.model.connection(in_conn.id).is_none());
        assert!(fx.model.connection(out_conn.id).is_none());
        assert_eq!(fx.model.connection_count(), 0, "no orphaned connections");

        let removed: Vec<_> = change
            .events
            .iter()
            .filter(|e| matches!(e, ChangeEvent::ConnectionRemoved { .. }))
            .collect();
        assert_eq!(removed.len(), 2, "cascade reported in events");
    }

    #[test]
    fn self_loop_cascades_once() {
        let mut fx = Fixture::new();
        let node = fx.insert_node("transform", 0.0, 0.0);
        let loop_conn = Connection::new(node.id, "output", node.id, "input");
        assert!(fx
            .apply(OperationPayload::InsertConnection {
                connection: loop_conn.clone()
            })
            .is_applied());

        let outcome = fx.apply(OperationPayload::DeleteNode { node_id: node.id });
        let ApplyOutcome::Applied(change) = outcome else {
            panic!("delete rejected");
        };
        let removed = change
            .events
            .iter()
            .filter(|e| matches!(e, ChangeEvent::ConnectionRemoved { .. }))
            .count();
        assert_eq!(removed, 1);
    }

    #[test]
    fn self_loop_rejected_when_type_forbids() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let connection = Connection::new(source.id, "output", source.id, "output");
        let outcome = fx.apply(OperationPayload::InsertConnection { connection });
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::SelfLoop { .. })
        ));
    }

    #[test]
    fn duplicate_port_binding_rejected() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let sink = fx.insert_node("sink", 200.0, 0.0);
        let first = fx.connect(&source, &sink);

        let duplicate = Connection::new(source.id, "output", sink.id, "input");
        let outcome = fx.apply(OperationPayload::InsertConnection {
            connection: duplicate,
        });
        assert_eq!(
            outcome.rejection(),
            Some(&RejectionReason::DuplicatePortBinding { existing: first.id })
        );
    }

    #[test]
    fn connection_to_missing_port_rejected() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let sink = fx.insert_node("sink", 200.0, 0.0);
        let connection = Connection::new(source.id, "output", sink.id, "nonexistent");
        let outcome = fx.apply(OperationPayload::InsertConnection { connection });
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::PortNotFound { .. })
        ));
    }

    #[test]
    fn batch_is_atomic() {
        let mut fx = Fixture::new();
        let existing = fx.insert_node("source", 0.0, 0.0);
        let snapshot = fx.model.snapshot();

        // Second member references a node that does not exist; the first
        // member must not apply either.
        let payload = OperationPayload::Batch {
            operations: vec![
                OperationPayload::UpdateNode {
                    node_id: existing.id,
                    patch: NodePatch::move_to(Point::new(99.0, 99.0)),
                },
                OperationPayload::DeleteNode {
                    node_id: NodeId::new(),
                },
            ],
        };
        let outcome = fx.apply(payload);
        assert!(matches!(
            outcome.rejection(),
            Some(RejectionReason::NodeNotFound { .. })
        ));
        assert_eq!(fx.model.snapshot(), snapshot, "batch must not partially apply");
    }

    #[test]
    fn batch_applies_dependent_members() {
        let mut fx = Fixture::new();
        let source = Node::new("source", Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let sink = Node::new("sink", Point::new(50.0, 0.0), Size::new(10.0, 10.0));
        let connection = Connection::new(source.id, "output", sink.id, "input");

        let outcome = fx.apply(OperationPayload::Batch {
            operations: vec![
                OperationPayload::InsertNode { node: source },
                OperationPayload::InsertNode { node: sink },
                OperationPayload::InsertConnection {
                    connection: connection.clone(),
                },
            ],
        });
        assert!(outcome.is_applied());
        assert!(fx.model.connection(connection.id).is_some());
        assert_eq!(fx.model.revision(), 1, "one revision per batch");
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let sink = fx.insert_node("sink", 200.0, 100.0);
        fx.connect(&source, &sink);

        let snapshot = fx.model.snapshot();
        let restored = GraphModel::restore(&snapshot, registry()).expect("restore");
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn restore_flags_dangling_connections() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let sink = fx.insert_node("sink", 200.0, 0.0);
        let connection = fx.connect(&source, &sink);

        let mut snapshot = fx.model.snapshot();
        snapshot.nodes.retain(|n| n.id != sink.id);

        let restored = GraphModel::restore(&snapshot, registry()).expect("restore");
        let conn = restored.connection(connection.id).expect("kept");
        assert!(conn.detached, "dangling connection flagged, not dropped");
    }

    #[test]
    fn detach_then_settle_by_delete() {
        let mut fx = Fixture::new();
        let source = fx.insert_node("source", 0.0, 0.0);
        let sink = fx.insert_node("sink", 200.0, 0.0);
        let connection = fx.connect(&source, &sink);

        let event = fx.model.detach_connection(connection.id).expect("detached");
        assert_eq!(
            event,
            ChangeEvent::ConnectionDetached {
                connection_id: connection.id
            }
        );
        assert!(fx.model.connection(connection.id).expect("kept").detached);

        assert!(fx
            .apply(OperationPayload::DeleteNode { node_id: sink.id })
            .is_applied());
        assert!(
            fx.model.connection(connection.id).is_none(),
            "settled delete cascades detached connections"
        );
    }

    #[test]
    fn query_filters_entities() {
        let mut fx = Fixture::new();
        fx.insert_node("source", 0.0, 0.0);
        fx.insert_node("sink", 500.0, 0.0);

        let far_right = fx.model.query(|entity| match entity {
            EntityRef::Node(node) => node.position.x > 100.0,
            EntityRef::Connection(_) => false,
        });
        assert_eq!(far_right.len(), 1);
    }
}
