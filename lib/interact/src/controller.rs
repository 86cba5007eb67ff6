//! The gesture state machine.

use crate::history::History;
use crate::input::{InputEvent, Key, Modifiers, PointerButton};
use crate::state::{Gesture, HitTarget, UiState};
use crate::sync::sync_index;
use flowloom_core::{ClientId, NodeId, Point, Vector, Viewport};
use flowloom_graph::{
    AppliedChange, ApplyOutcome, Connection, ConnectionPatch, GraphModel, LamportClock, NodePatch,
    Operation, OperationPayload, RejectionReason,
};
use flowloom_spatial::{EntityId, GridIndex};
use std::collections::BTreeSet;

/// Screen-space radius within which a port accepts a press.
const PORT_HIT_RADIUS_PX: f64 = 8.0;
/// Drags shorter than this (canvas units) commit nothing.
const DRAG_DEAD_ZONE: f64 = 0.5;
/// Arrow-key nudge distance in canvas units; shift multiplies by ten.
const NUDGE_STEP: f64 = 1.0;
/// Wheel zoom factor per event.
const WHEEL_ZOOM_FACTOR: f64 = 1.1;

/// What one input event produced.
#[derive(Debug, Default)]
pub struct EventOutcome {
    /// Operations applied locally, in order, for the collaboration queue.
    pub operations: Vec<Operation>,
    /// The matching applied changes, for host change callbacks.
    pub changes: Vec<AppliedChange>,
    /// Validation rejections to surface as non-fatal notices.
    pub rejections: Vec<RejectionReason>,
}

impl EventOutcome {
    fn none() -> Self {
        Self::default()
    }
}

/// Translates input events into viewport changes and graph operations.
///
/// All graph mutations flow through [`GraphModel::apply`]; the controller
/// holds no entity state of its own beyond the active gesture.
#[derive(Debug)]
pub struct InteractionController {
    client: ClientId,
    clock: LamportClock,
    seq: u64,
    state: UiState,
    gesture: Gesture,
    history: History,
}

impl InteractionController {
    /// Creates a controller for a client and viewport.
    #[must_use]
    pub fn new(client: ClientId, viewport: Viewport) -> Self {
        Self {
            client,
            clock: LamportClock::new(client),
            seq: 0,
            state: UiState::new(viewport),
            gesture: Gesture::Idle,
            history: History::new(),
        }
    }

    /// The UI state (viewport, selection, hover).
    #[must_use]
    pub fn ui(&self) -> &UiState {
        &self.state
    }

    /// The active gesture.
    #[must_use]
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// The undo history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Clears history and selection, used after a full resync.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state.selection.clear();
        self.state.hovered = None;
        self.gesture = Gesture::Idle;
    }

    /// Keeps the logical clock ahead of observed remote operations.
    pub fn observe_remote(&mut self, operation: &Operation) {
        self.clock.observe(operation.timestamp);
    }

    /// Drops deleted nodes from the selection; call after remote applies.
    pub fn prune_selection(&mut self, model: &GraphModel) {
        self.state
            .selection
            .retain(|node_id| model.node(*node_id).is_some());
    }

    /// The drag displacement to preview, if a drag is in progress.
    ///
    /// Positions are not committed until release; renderers offset the
    /// dragged nodes by this vector.
    #[must_use]
    pub fn drag_preview(&self) -> Option<Vector> {
        match &self.gesture {
            Gesture::Dragging { delta, .. } => Some(*delta),
            _ => None,
        }
    }

    /// Handles one input event.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        model: &mut GraphModel,
        index: &mut GridIndex,
    ) -> EventOutcome {
        match event {
            InputEvent::PointerDown {
                position,
                button,
                modifiers,
            } => self.pointer_down(*position, *button, *modifiers, model, index),
            InputEvent::PointerMove {
                position,
                modifiers,
            } => self.pointer_move(*position, *modifiers, model, index),
            InputEvent::PointerUp { position, .. } => self.pointer_up(*position, model, index),
            InputEvent::Wheel { position, delta } => {
                let zoom = self.state.viewport.zoom
                    * if *delta > 0.0 {
                        1.0 / WHEEL_ZOOM_FACTOR
                    } else {
                        WHEEL_ZOOM_FACTOR
                    };
                self.state.viewport.zoom_to(zoom, *position);
                EventOutcome::none()
            }
            InputEvent::KeyDown { key, modifiers } => self.key_down(*key, *modifiers, model, index),
        }
    }

    /// Undoes the most recent local operation.
    pub fn undo(&mut self, model: &mut GraphModel, index: &mut GridIndex) -> Option<Operation> {
        let payload = self.history.pop_undo()?;
        let redo_entry = inverse_of(model, &payload)?;
        let operation = self.next_operation(payload);
        match model.apply(&operation) {
            ApplyOutcome::Applied(change) => {
                sync_index(index, model, &change.events);
                self.prune_selection(model);
                self.history.push_redo(redo_entry);
                Some(operation)
            }
            // The inverse no longer applies (a remote edit got there
            // first); the entry is consumed either way.
            _ => None,
        }
    }

    /// Redoes the most recently undone local operation.
    pub fn redo(&mut self, model: &mut GraphModel, index: &mut GridIndex) -> Option<Operation> {
        let payload = self.history.pop_redo()?;
        let undo_entry = inverse_of(model, &payload)?;
        let operation = self.next_operation(payload);
        match model.apply(&operation) {
            ApplyOutcome::Applied(change) => {
                sync_index(index, model, &change.events);
                self.prune_selection(model);
                self.history.push_undo(undo_entry);
                Some(operation)
            }
            _ => None,
        }
    }

    fn pointer_down(
        &mut self,
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
        model: &GraphModel,
        index: &GridIndex,
    ) -> EventOutcome {
        let canvas = self.state.viewport.to_canvas(position);
        let hit = hit_test(model, index, &self.state.viewport, position);

        if button == PointerButton::Middle || modifiers.space {
            self.gesture = Gesture::Panning { last: position };
            return EventOutcome::none();
        }
        if button != PointerButton::Primary {
            return EventOutcome::none();
        }

        match hit {
            Some(HitTarget::OutputPort { node_id, port }) => {
                self.gesture = Gesture::ConnectingDrag {
                    source_node: node_id,
                    source_port: port,
                    current: canvas,
                };
            }
            Some(target) => {
                let node_id = target.node_id();
                if modifiers.extends_selection() {
                    // Toggle membership; no drag from a modifier click.
                    if !self.state.selection.remove(&node_id) {
                        self.state.selection.insert(node_id);
                    }
                    self.gesture = Gesture::Idle;
                    return EventOutcome::none();
                }
                if !self.state.selection.contains(&node_id) {
                    self.state.selection = BTreeSet::from([node_id]);
                }
                let start_positions = self
                    .state
                    .selection
                    .iter()
                    .filter_map(|id| model.node(*id).map(|n| (*id, n.position)))
                    .collect();
                self.gesture = Gesture::Dragging {
                    grab: canvas,
                    start_positions,
                    delta: Vector::new(0.0, 0.0),
                };
            }
            None => {
                if !modifiers.extends_selection() {
                    self.state.selection.clear();
                }
                self.gesture = Gesture::Selecting {
                    origin: canvas,
                    current: canvas,
                    additive: modifiers.extends_selection(),
                };
            }
        }
        EventOutcome::none()
    }

    fn pointer_move(
        &mut self,
        position: Point,
        _modifiers: Modifiers,
        model: &GraphModel,
        index: &GridIndex,
    ) -> EventOutcome {
        let canvas = self.state.viewport.to_canvas(position);
        match &mut self.gesture {
            Gesture::Idle | Gesture::Hovering { .. } => {
                let hit = hit_test(model, index, &self.state.viewport, position);
                self.state.hovered = hit.clone();
                self.gesture = match hit {
                    Some(target) => Gesture::Hovering { target },
                    None => Gesture::Idle,
                };
            }
            Gesture::Dragging { grab, delta, .. } => {
                *delta = Vector::new(canvas.x - grab.x, canvas.y - grab.y);
            }
            Gesture::Selecting { current, .. } => {
                *current = canvas;
            }
            Gesture::ConnectingDrag { current, .. } => {
                *current = canvas;
                self.state.hovered = hit_test(model, index, &self.state.viewport, position);
            }
            Gesture::Panning { last } => {
                let delta = Vector::new(position.x - last.x, position.y - last.y);
                self.state.viewport.pan_by(delta);
                *last = position;
            }
        }
        EventOutcome::none()
    }

    fn pointer_up(
        &mut self,
        position: Point,
        model: &mut GraphModel,
        index: &mut GridIndex,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::none();
        match std::mem::take(&mut self.gesture) {
            Gesture::Dragging {
                start_positions,
                delta,
                ..
            } => {
                if delta.dx.abs() > DRAG_DEAD_ZONE || delta.dy.abs() > DRAG_DEAD_ZONE {
                    let moves: Vec<OperationPayload> = start_positions
                        .iter()
                        .map(|(node_id, start)| OperationPayload::UpdateNode {
                            node_id: *node_id,
                            patch: NodePatch::move_to(start.translated(delta)),
                        })
                        .collect();
                    let payload = singleton_or_batch(moves);
                    self.commit(payload, model, index, &mut outcome);
                }
            }
            Gesture::Selecting {
                origin,
                current,
                additive,
            } => {
                let band = flowloom_core::Rect::from_corners(origin, current);
                if !additive {
                    self.state.selection.clear();
                }
                for entity in index.query(&band) {
                    if let EntityId::Node(node_id) = entity {
                        if model.node(node_id).is_some() {
                            self.state.selection.insert(node_id);
                        }
                    }
                }
            }
            Gesture::ConnectingDrag {
                source_node,
                source_port,
                ..
            } => {
                // Releasing anywhere but an input port aborts silently.
                if let Some(HitTarget::InputPort { node_id, port }) =
                    hit_test(model, index, &self.state.viewport, position)
                {
                    let connection = Connection::new(source_node, source_port, node_id, port);
                    self.commit(
                        OperationPayload::InsertConnection { connection },
                        model,
                        index,
                        &mut outcome,
                    );
                }
            }
            Gesture::Idle | Gesture::Hovering { .. } | Gesture::Panning { .. } => {}
        }
        outcome
    }

    fn key_down(
        &mut self,
        key: Key,
        modifiers: Modifiers,
        model: &mut GraphModel,
        index: &mut GridIndex,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::none();
        match key {
            Key::Escape => {
                // Cancelled gestures leave the model untouched.
                self.gesture = Gesture::Idle;
            }
            Key::Delete => {
                let deletes: Vec<OperationPayload> = self
                    .state
                    .selection
                    .iter()
                    .map(|node_id| OperationPayload::DeleteNode { node_id: *node_id })
                    .collect();
                if !deletes.is_empty() {
                    let payload = singleton_or_batch(deletes);
                    self.commit(payload, model, index, &mut outcome);
                    self.state.selection.clear();
                }
            }
            Key::ArrowLeft | Key::ArrowRight | Key::ArrowUp | Key::ArrowDown => {
                let step = if modifiers.shift {
                    NUDGE_STEP * 10.0
                } else {
                    NUDGE_STEP
                };
                let nudge = match key {
                    Key::ArrowLeft => Vector::new(-step, 0.0),
                    Key::ArrowRight => Vector::new(step, 0.0),
                    Key::ArrowUp => Vector::new(0.0, -step),
                    _ => Vector::new(0.0, step),
                };
                let moves: Vec<OperationPayload> = self
                    .state
                    .selection
                    .iter()
                    .filter_map(|node_id| {
                        model.node(*node_id).map(|node| OperationPayload::UpdateNode {
                            node_id: *node_id,
                            patch: NodePatch::move_to(node.position.translated(nudge)),
                        })
                    })
                    .collect();
                if !moves.is_empty() {
                    let payload = singleton_or_batch(moves);
                    self.commit(payload, model, index, &mut outcome);
                }
            }
            Key::Undo => {
                if let Some(operation) = self.undo(model, index) {
                    outcome.operations.push(operation);
                }
            }
            Key::Redo => {
                if let Some(operation) = self.redo(model, index) {
                    outcome.operations.push(operation);
                }
            }
        }
        outcome
    }

    /// Wraps a payload into an operation, applies it, and records the
    /// inverse on success.
    fn commit(
        &mut self,
        payload: OperationPayload,
        model: &mut GraphModel,
        index: &mut GridIndex,
        outcome: &mut EventOutcome,
    ) {
        let inverse = inverse_of(model, &payload);
        let operation = self.next_operation(payload);
        match model.apply(&operation) {
            ApplyOutcome::Applied(change) => {
                sync_index(index, model, &change.events);
                if let Some(inverse) = inverse {
                    self.history.record(inverse);
                }
                tracing::debug!(
                    op = operation.payload.kind(),
                    revision = change.revision,
                    "local operation applied"
                );
                outcome.operations.push(operation);
                outcome.changes.push(change);
            }
            ApplyOutcome::Rejected(reason) => {
                tracing::debug!(
                    op = operation.payload.kind(),
                    %reason,
                    "local operation rejected"
                );
                outcome.rejections.push(reason);
            }
            ApplyOutcome::AlreadyApplied => {}
        }
    }

    fn next_operation(&mut self, payload: OperationPayload) -> Operation {
        self.seq += 1;
        Operation::new(self.client, self.clock.tick(), self.seq, payload)
    }
}

fn singleton_or_batch(mut payloads: Vec<OperationPayload>) -> OperationPayload {
    if payloads.len() == 1 {
        payloads.remove(0)
    } else {
        OperationPayload::Batch {
            operations: payloads,
        }
    }
}

/// Finds what lies under a screen position: ports first, then the topmost
/// node body.
#[must_use]
pub fn hit_test(
    model: &GraphModel,
    index: &GridIndex,
    viewport: &Viewport,
    screen_pos: Point,
) -> Option<HitTarget> {
    let canvas = viewport.to_canvas(screen_pos);
    let radius = PORT_HIT_RADIUS_PX / viewport.zoom;
    let probe = flowloom_core::Rect::new(
        canvas.x - radius,
        canvas.y - radius,
        radius * 2.0,
        radius * 2.0,
    );

    let mut best_node: Option<&flowloom_graph::Node> = None;
    for entity in index.query(&probe) {
        let EntityId::Node(node_id) = entity else {
            continue;
        };
        let Some(node) = model.node(node_id) else {
            continue;
        };
        let Some(def) = model.registry().get(&node.type_id) else {
            continue;
        };
        let bounds = node.bounds();
        for port in &def.outputs {
            if let Some(anchor) = def.output_anchor(&bounds, &port.name) {
                if anchor.distance_to(canvas) <= radius {
                    return Some(HitTarget::OutputPort {
                        node_id,
                        port: port.name.clone(),
                    });
                }
            }
        }
        for port in &def.inputs {
            if let Some(anchor) = def.input_anchor(&bounds, &port.name) {
                if anchor.distance_to(canvas) <= radius {
                    return Some(HitTarget::InputPort {
                        node_id,
                        port: port.name.clone(),
                    });
                }
            }
        }
        if bounds.contains(canvas) {
            let better = match best_node {
                Some(current) => {
                    (node.z_order, node.id) > (current.z_order, current.id)
                }
                None => true,
            };
            if better {
                best_node = Some(node);
            }
        }
    }
    best_node.map(|node| HitTarget::Node { node_id: node.id })
}

/// Computes the payload that undoes `payload` against the current model
/// state. Must run before the payload is applied.
fn inverse_of(model: &GraphModel, payload: &OperationPayload) -> Option<OperationPayload> {
    match payload {
        OperationPayload::InsertNode { node } => Some(OperationPayload::DeleteNode {
            node_id: node.id,
        }),
        OperationPayload::UpdateNode { node_id, patch } => {
            let node = model.node(*node_id)?;
            let mut prior = NodePatch::default();
            if patch.position.is_some() {
                prior.position = Some(node.position);
            }
            if patch.size.is_some() {
                prior.size = Some(node.size);
            }
            if patch.z_order.is_some() {
                prior.z_order = Some(node.z_order);
            }
            if patch.validation.is_some() {
                prior.validation = Some(node.validation.clone());
            }
            for key in patch.properties.keys() {
                prior
                    .properties
                    .insert(key.clone(), node.property(key).cloned());
            }
            Some(OperationPayload::UpdateNode {
                node_id: *node_id,
                patch: prior,
            })
        }
        OperationPayload::DeleteNode { node_id } => {
            let node = model.node(*node_id)?.clone();
            let mut operations = vec![OperationPayload::InsertNode { node }];
            for connection in model.connections() {
                if connection.references(*node_id) && !connection.detached {
                    let mut restored = connection.clone();
                    restored.detached = false;
                    operations.push(OperationPayload::InsertConnection {
                        connection: restored,
                    });
                }
            }
            Some(singleton_or_batch(operations))
        }
        OperationPayload::InsertConnection { connection } => {
            Some(OperationPayload::DeleteConnection {
                connection_id: connection.id,
            })
        }
        OperationPayload::UpdateConnection {
            connection_id,
            patch,
        } => {
            let connection = model.connection(*connection_id)?;
            let mut prior = ConnectionPatch::default();
            if patch.label.is_some() {
                prior.label = Some(connection.label.clone());
            }
            if patch.condition.is_some() {
                prior.condition = Some(connection.condition.clone());
            }
            Some(OperationPayload::UpdateConnection {
                connection_id: *connection_id,
                patch: prior,
            })
        }
        OperationPayload::DeleteConnection { connection_id } => {
            let connection = model.connection(*connection_id)?.clone();
            Some(OperationPayload::InsertConnection { connection })
        }
        OperationPayload::Batch { operations } => {
            // Inverses run in reverse order so dependencies unwind.
            let mut inverses = Vec::with_capacity(operations.len());
            for operation in operations.iter().rev() {
                inverses.push(inverse_of(model, operation)?);
            }
            Some(OperationPayload::Batch {
                operations: inverses,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowloom_core::{DocumentId, Size};
    use flowloom_graph::{
        InputPort, Node, NodeTypeDefinition, NodeTypeRegistry, OutputPort, PortSchema,
        PropertyValue,
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

    struct Rig {
        controller: InteractionController,
        model: GraphModel,
        index: GridIndex,
    }

    impl Rig {
        fn new() -> Self {
            let viewport = Viewport::new(Size::new(800.0, 600.0));
            Self {
                controller: InteractionController::new(ClientId::new(), viewport),
                model: GraphModel::new(DocumentId::new(), "doc", registry()),
                index: GridIndex::new(),
            }
        }

        fn seed_node(&mut self, x: f64, y: f64) -> NodeId {
            let node = Node::new("step", Point::new(x, y), Size::new(100.0, 50.0));
            let id = node.id;
            let mut outcome = EventOutcome::none();
            self.controller.commit(
                OperationPayload::InsertNode { node },
                &mut self.model,
                &mut self.index,
                &mut outcome,
            );
            assert_eq!(outcome.operations.len(), 1);
            id
        }

        fn handle(&mut self, event: InputEvent) -> EventOutcome {
            self.controller
                .handle(&event, &mut self.model, &mut self.index)
        }

        fn press(&mut self, x: f64, y: f64) -> EventOutcome {
            self.handle(InputEvent::PointerDown {
                position: Point::new(x, y),
                button: PointerButton::Primary,
                modifiers: Modifiers::default(),
            })
        }

        fn drag(&mut self, x: f64, y: f64) -> EventOutcome {
            self.handle(InputEvent::PointerMove {
                position: Point::new(x, y),
                modifiers: Modifiers::default(),
            })
        }

        fn release(&mut self, x: f64, y: f64) -> EventOutcome {
            self.handle(InputEvent::PointerUp {
                position: Point::new(x, y),
                modifiers: Modifiers::default(),
            })
        }
    }

    #[test]
    fn drag_commits_exactly_one_operation() {
        let mut rig = Rig::new();
        let node_id = rig.seed_node(100.0, 100.0);

        rig.press(150.0, 125.0); // node body
        rig.drag(160.0, 125.0);
        rig.drag(180.0, 125.0);
        rig.drag(200.0, 125.0);
        let outcome = rig.release(200.0, 125.0);

        assert_eq!(outcome.operations.len(), 1, "one operation per drag");
        let node = rig.model.node(node_id).expect("node");
        assert_eq!(node.position, Point::new(150.0, 100.0));
    }

    #[test]
    fn cancelled_drag_commits_nothing() {
        let mut rig = Rig::new();
        let node_id = rig.seed_node(100.0, 100.0);

        rig.press(150.0, 125.0);
        rig.drag(300.0, 125.0);
        let outcome = rig.handle(InputEvent::KeyDown {
            key: Key::Escape,
            modifiers: Modifiers::default(),
        });
        assert!(outcome.operations.is_empty());
        let after = rig.release(300.0, 125.0);
        assert!(after.operations.is_empty());
        assert_eq!(
            rig.model.node(node_id).expect("node").position,
            Point::new(100.0, 100.0)
        );
    }

    #[test]
    fn tiny_drag_is_a_no_op() {
        let mut rig = Rig::new();
        rig.seed_node(100.0, 100.0);
        rig.press(150.0, 125.0);
        rig.drag(150.2, 125.1);
        let outcome = rig.release(150.2, 125.1);
        assert!(outcome.operations.is_empty());
    }

    #[test]
    fn connecting_drag_creates_connection_on_compatible_port() {
        let mut rig = Rig::new();
        let source = rig.seed_node(0.0, 100.0);
        let target = rig.seed_node(300.0, 100.0);

        // Output port of `source` sits on its right edge at mid-height.
        rig.press(100.0, 125.0);
        assert!(matches!(
            rig.controller.gesture(),
            Gesture::ConnectingDrag { .. }
        ));
        rig.drag(200.0, 125.0);
        let outcome = rig.release(300.0, 125.0); // input port of `target`

        assert_eq!(outcome.operations.len(), 1);
        let connection = rig.model.connections().next().expect("connection");
        assert_eq!(connection.source_node, source);
        assert_eq!(connection.target_node, target);
    }

    #[test]
    fn connecting_drag_over_empty_space_aborts_silently() {
        let mut rig = Rig::new();
        rig.seed_node(0.0, 100.0);

        rig.press(100.0, 125.0);
        rig.drag(400.0, 400.0);
        let outcome = rig.release(400.0, 400.0);

        assert!(outcome.operations.is_empty());
        assert!(outcome.rejections.is_empty());
        assert_eq!(rig.model.connection_count(), 0);
    }

    #[test]
    fn rubber_band_selects_contained_nodes() {
        let mut rig = Rig::new();
        let a = rig.seed_node(100.0, 100.0);
        let b = rig.seed_node(250.0, 100.0);
        rig.seed_node(900.0, 900.0);

        rig.press(50.0, 50.0); // empty canvas
        rig.drag(400.0, 200.0);
        rig.release(400.0, 200.0);

        let selection = &rig.controller.ui().selection;
        assert!(selection.contains(&a));
        assert!(selection.contains(&b));
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn modifier_click_toggles_selection() {
        let mut rig = Rig::new();
        let a = rig.seed_node(100.0, 100.0);
        let b = rig.seed_node(300.0, 100.0);

        rig.press(150.0, 125.0);
        rig.release(150.0, 125.0);
        assert!(rig.controller.ui().selection.contains(&a));

        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        rig.handle(InputEvent::PointerDown {
            position: Point::new(350.0, 125.0),
            button: PointerButton::Primary,
            modifiers: shift,
        });
        rig.handle(InputEvent::PointerUp {
            position: Point::new(350.0, 125.0),
            modifiers: shift,
        });
        assert!(rig.controller.ui().selection.contains(&a));
        assert!(rig.controller.ui().selection.contains(&b));

        rig.handle(InputEvent::PointerDown {
            position: Point::new(350.0, 125.0),
            button: PointerButton::Primary,
            modifiers: shift,
        });
        assert!(!rig.controller.ui().selection.contains(&b));
    }

    #[test]
    fn multi_selection_drag_emits_single_batch() {
        let mut rig = Rig::new();
        rig.seed_node(100.0, 100.0);
        rig.seed_node(250.0, 100.0);

        rig.press(50.0, 50.0);
        rig.drag(400.0, 200.0);
        rig.release(400.0, 200.0);
        assert_eq!(rig.controller.ui().selection.len(), 2);

        rig.press(150.0, 125.0);
        rig.drag(150.0, 225.0);
        let outcome = rig.release(150.0, 225.0);

        assert_eq!(outcome.operations.len(), 1);
        assert!(matches!(
            outcome.operations[0].payload,
            OperationPayload::Batch { .. }
        ));
    }

    #[test]
    fn delete_emits_one_cascading_batch() {
        let mut rig = Rig::new();
        let a = rig.seed_node(0.0, 100.0);
        let b = rig.seed_node(300.0, 100.0);
        rig.press(100.0, 125.0);
        rig.release(300.0, 125.0); // connect a → b

        rig.press(50.0, 50.0);
        rig.drag(500.0, 300.0);
        rig.release(500.0, 300.0); // select both

        let outcome = rig.handle(InputEvent::KeyDown {
            key: Key::Delete,
            modifiers: Modifiers::default(),
        });

        assert_eq!(outcome.operations.len(), 1);
        assert_eq!(rig.model.node_count(), 0);
        assert_eq!(rig.model.connection_count(), 0);
        assert!(rig.model.node(a).is_none());
        assert!(rig.model.node(b).is_none());
    }

    #[test]
    fn pan_and_zoom_emit_no_operations() {
        let mut rig = Rig::new();
        rig.seed_node(100.0, 100.0);

        let outcome = rig.handle(InputEvent::PointerDown {
            position: Point::new(400.0, 300.0),
            button: PointerButton::Middle,
            modifiers: Modifiers::default(),
        });
        assert!(outcome.operations.is_empty());
        rig.drag(450.0, 300.0);
        rig.release(450.0, 300.0);
        assert_ne!(rig.controller.ui().viewport.pan, Point::new(0.0, 0.0));

        let before_zoom = rig.controller.ui().viewport.zoom;
        let outcome = rig.handle(InputEvent::Wheel {
            position: Point::new(400.0, 300.0),
            delta: -120.0,
        });
        assert!(outcome.operations.is_empty());
        assert!(rig.controller.ui().viewport.zoom > before_zoom);
    }

    #[test]
    fn undo_restores_position_redo_reapplies() {
        let mut rig = Rig::new();
        let node_id = rig.seed_node(100.0, 100.0);

        rig.press(150.0, 125.0);
        rig.drag(250.0, 125.0);
        rig.release(250.0, 125.0);
        assert_eq!(
            rig.model.node(node_id).expect("node").position,
            Point::new(200.0, 100.0)
        );

        let op = rig
            .controller
            .undo(&mut rig.model, &mut rig.index)
            .expect("undo");
        assert!(matches!(op.payload, OperationPayload::UpdateNode { .. }));
        assert_eq!(
            rig.model.node(node_id).expect("node").position,
            Point::new(100.0, 100.0)
        );

        rig.controller
            .redo(&mut rig.model, &mut rig.index)
            .expect("redo");
        assert_eq!(
            rig.model.node(node_id).expect("node").position,
            Point::new(200.0, 100.0)
        );
    }

    #[test]
    fn undo_of_delete_restores_node_and_connections() {
        let mut rig = Rig::new();
        let a = rig.seed_node(0.0, 100.0);
        let b = rig.seed_node(300.0, 100.0);
        rig.press(100.0, 125.0);
        rig.release(300.0, 125.0); // connect

        rig.press(350.0, 125.0); // select b
        rig.release(350.0, 125.0);
        rig.handle(InputEvent::KeyDown {
            key: Key::Delete,
            modifiers: Modifiers::default(),
        });
        assert_eq!(rig.model.connection_count(), 0);

        rig.controller
            .undo(&mut rig.model, &mut rig.index)
            .expect("undo");
        assert!(rig.model.node(b).is_some());
        assert_eq!(rig.model.connection_count(), 1);
        let connection = rig.model.connections().next().expect("connection");
        assert_eq!(connection.source_node, a);
    }

    #[test]
    fn remote_operations_are_not_undoable() {
        let mut rig = Rig::new();
        rig.seed_node(100.0, 100.0);

        // A remote insert arrives through the model directly.
        let remote_client = ClientId::new();
        let mut remote_clock = LamportClock::new(remote_client);
        let remote = Operation::new(
            remote_client,
            remote_clock.tick(),
            1,
            OperationPayload::InsertNode {
                node: Node::new("step", Point::new(500.0, 500.0), Size::new(100.0, 50.0)),
            },
        );
        assert!(rig.model.apply(&remote).is_applied());
        rig.controller.observe_remote(&remote);

        // Undo unwinds the local insert, not the remote one.
        rig.controller
            .undo(&mut rig.model, &mut rig.index)
            .expect("undo local");
        assert_eq!(rig.model.node_count(), 1);
        assert!(
            rig.controller.undo(&mut rig.model, &mut rig.index).is_none(),
            "no further local history"
        );
        assert_eq!(rig.model.node_count(), 1, "remote node survives");
    }

    #[test]
    fn nudge_moves_selection_in_one_operation() {
        let mut rig = Rig::new();
        let node_id = rig.seed_node(100.0, 100.0);
        rig.press(150.0, 125.0);
        rig.release(150.0, 125.0);

        let outcome = rig.handle(InputEvent::KeyDown {
            key: Key::ArrowRight,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::default()
            },
        });
        assert_eq!(outcome.operations.len(), 1);
        assert_eq!(
            rig.model.node(node_id).expect("node").position,
            Point::new(110.0, 100.0)
        );
    }

    #[test]
    fn hover_tracks_targets() {
        let mut rig = Rig::new();
        rig.seed_node(100.0, 100.0);

        rig.drag(150.0, 125.0);
        assert!(matches!(
            rig.controller.gesture(),
            Gesture::Hovering {
                target: HitTarget::Node { .. }
            }
        ));

        rig.drag(100.0, 125.0); // left edge, input port
        assert!(matches!(
            rig.controller.ui().hovered,
            Some(HitTarget::InputPort { .. })
        ));

        rig.drag(700.0, 500.0);
        assert!(matches!(rig.controller.gesture(), Gesture::Idle));
    }

    #[test]
    fn rejected_operation_surfaces_reason() {
        let mut rig = Rig::new();
        let a = rig.seed_node(0.0, 100.0);
        let b = rig.seed_node(300.0, 100.0);

        rig.press(100.0, 125.0);
        rig.release(300.0, 125.0);
        let outcome = {
            rig.press(100.0, 125.0);
            rig.release(300.0, 125.0) // same port pair again
        };
        assert!(outcome.operations.is_empty());
        assert!(matches!(
            outcome.rejections.as_slice(),
            [RejectionReason::DuplicatePortBinding { .. }]
        ));
        let _ = (a, b);
    }

    #[test]
    fn property_update_inverse_restores_prior_value() {
        let mut rig = Rig::new();
        let node_id = rig.seed_node(100.0, 100.0);

        let mut outcome = EventOutcome::none();
        rig.controller.commit(
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::set_property("label", PropertyValue::String("Fetch".into())),
            },
            &mut rig.model,
            &mut rig.index,
            &mut outcome,
        );
        rig.controller.commit(
            OperationPayload::UpdateNode {
                node_id,
                patch: NodePatch::set_property("label", PropertyValue::String("Parse".into())),
            },
            &mut rig.model,
            &mut rig.index,
            &mut outcome,
        );

        rig.controller
            .undo(&mut rig.model, &mut rig.index)
            .expect("undo");
        assert_eq!(
            rig.model.node(node_id).expect("node").property("label"),
            Some(&PropertyValue::String("Fetch".into()))
        );
    }
}
