//! The canvas facade.

use flowloom_collab::{CollabSession, SessionEvent, SyncError, WireMessage};
use flowloom_core::{ClientId, DocumentId, NodeId, Size, Vector};
use flowloom_graph::{
    AppliedChange, DocumentSnapshot, GraphError, GraphModel, NodeTypeRegistry,
};
use flowloom_interact::{sync::rebuild_index, sync_index};
use flowloom_interact::{EventOutcome, InputEvent, InteractionController};
use flowloom_render::{export_svg, Frame, FrameBuilder, RenderOptions};
use flowloom_spatial::GridIndex;
use std::collections::HashSet;

type ChangeCallback = Box<dyn FnMut(&AppliedChange) + Send>;

/// Construction options for a canvas.
#[derive(Debug, Clone)]
pub struct CanvasOptions {
    /// Screen size in pixels.
    pub screen: Size,
    /// Render tuning.
    pub render: RenderOptions,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            screen: Size::new(1280.0, 800.0),
            render: RenderOptions::default(),
        }
    }
}

/// The embeddable canvas engine: one document, one local client.
pub struct Canvas {
    model: GraphModel,
    index: GridIndex,
    controller: InteractionController,
    builder: FrameBuilder,
    session: CollabSession,
    screen: Size,
    listeners: Vec<ChangeCallback>,
    disposed: bool,
}

impl Canvas {
    /// Creates a canvas over an empty document.
    ///
    /// The registry comes from the host; node types are never defined by
    /// the engine itself.
    #[must_use]
    pub fn new(registry: NodeTypeRegistry, options: CanvasOptions) -> Self {
        let client = ClientId::new();
        let viewport = flowloom_core::Viewport::new(options.screen);
        Self {
            model: GraphModel::new(DocumentId::new(), "untitled", registry),
            index: GridIndex::new(),
            controller: InteractionController::new(client, viewport),
            builder: FrameBuilder::new(options.render),
            session: CollabSession::new(client),
            screen: options.screen,
            listeners: Vec::new(),
            disposed: false,
        }
    }

    /// The local client id, as sent on the wire.
    #[must_use]
    pub fn client(&self) -> ClientId {
        self.session.client()
    }

    /// The document model, read-only.
    #[must_use]
    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    /// The collaboration session, read-only.
    #[must_use]
    pub fn session(&self) -> &CollabSession {
        &self.session
    }

    /// The interaction controller, read-only (viewport, selection, hover).
    #[must_use]
    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Replaces the document from a persisted record.
    pub fn load_document(&mut self, record: &DocumentSnapshot) -> Result<(), GraphError> {
        let model = GraphModel::restore(record, self.model.registry().clone())?;
        self.model = model;
        rebuild_index(&mut self.index, &self.model);
        self.controller.reset();
        tracing::info!(id = %record.id, revision = record.revision, "document loaded");
        Ok(())
    }

    /// The current document state, for saving.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        self.model.snapshot()
    }

    /// Registers a callback invoked with every applied change, local and
    /// remote.
    pub fn on_change(&mut self, callback: impl FnMut(&AppliedChange) + Send + 'static) {
        self.listeners.push(Box::new(callback));
    }

    /// Feeds one input event through the controller.
    ///
    /// Resulting local operations are queued for the relay; rejections
    /// come back for the host to surface.
    pub fn handle_input(&mut self, event: &InputEvent) -> EventOutcome {
        if self.disposed {
            return EventOutcome::default();
        }
        let outcome = self
            .controller
            .handle(event, &mut self.model, &mut self.index);
        for operation in &outcome.operations {
            self.session.queue_local(operation.clone());
        }
        for change in &outcome.changes {
            for listener in &mut self.listeners {
                listener(change);
            }
        }
        outcome
    }

    /// Undoes the last local operation, if any.
    pub fn undo(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        match self.controller.undo(&mut self.model, &mut self.index) {
            Some(operation) => {
                self.session.queue_local(operation);
                true
            }
            None => false,
        }
    }

    /// Redoes the last undone local operation, if any.
    pub fn redo(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        match self.controller.redo(&mut self.model, &mut self.index) {
            Some(operation) => {
                self.session.queue_local(operation);
                true
            }
            None => false,
        }
    }

    /// Handles one incoming wire message, keeping derived state in step.
    pub fn handle_wire(&mut self, message: WireMessage) -> Result<Vec<SessionEvent>, SyncError> {
        if self.disposed {
            return Ok(Vec::new());
        }
        if let WireMessage::Operation { operation, .. } = &message {
            self.controller.observe_remote(operation);
        }
        let events = self.session.handle_message(message, &mut self.model)?;
        for event in &events {
            match event {
                SessionEvent::RemoteApplied {
                    operation_id,
                    events,
                } => {
                    sync_index(&mut self.index, &self.model, events);
                    self.controller.prune_selection(&self.model);
                    let change = AppliedChange {
                        operation_id: *operation_id,
                        revision: self.model.revision(),
                        events: events.clone(),
                    };
                    for listener in &mut self.listeners {
                        listener(&change);
                    }
                }
                SessionEvent::LocalVoided { events, .. } => {
                    sync_index(&mut self.index, &self.model, events);
                    self.controller.prune_selection(&self.model);
                }
                SessionEvent::Resynced { .. } => {
                    rebuild_index(&mut self.index, &self.model);
                    self.controller.reset();
                }
                SessionEvent::LocalAcked { .. }
                | SessionEvent::RemoteDropped { .. }
                | SessionEvent::PresenceChanged { .. } => {}
            }
        }
        Ok(events)
    }

    /// Drains outgoing wire messages for the transport.
    pub fn take_outgoing(&mut self) -> Vec<WireMessage> {
        self.session.take_outgoing()
    }

    /// Builds the next frame.
    pub fn frame(&mut self) -> Frame {
        let selected: HashSet<NodeId> = self.controller.ui().selection.iter().copied().collect();
        self.builder.build(
            &self.model,
            &self.index,
            &self.controller.ui().viewport,
            &selected,
        )
    }

    /// Returns a frame's buffers to the render pool.
    pub fn recycle(&mut self, frame: Frame) {
        self.builder.recycle(frame);
    }

    /// Renders the current view as a standalone SVG document.
    pub fn export_image(&mut self) -> String {
        let frame = self.frame();
        let svg = export_svg(&frame, self.screen);
        self.builder.recycle(frame);
        svg
    }

    /// The drag displacement to preview, if a drag is in progress.
    #[must_use]
    pub fn drag_preview(&self) -> Option<Vector> {
        self.controller.drag_preview()
    }

    /// Shuts the canvas down: drops listeners and stops accepting input.
    pub fn dispose(&mut self) {
        self.listeners.clear();
        self.session.disconnect();
        self.disposed = true;
    }
}
