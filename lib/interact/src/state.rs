//! Controller-owned UI state.
//!
//! Viewport, selection, and hover live here as an explicit struct, never
//! as ambient globals, so the graph model stays testable in isolation.
//! None of this state crosses the collaboration channel.

use flowloom_core::{NodeId, Point, Vector, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum HitTarget {
    /// A node body.
    Node { node_id: NodeId },
    /// An output port; pressing here starts a connection drag.
    OutputPort { node_id: NodeId, port: String },
    /// An input port; a connection drag may end here.
    InputPort { node_id: NodeId, port: String },
}

impl HitTarget {
    /// The node the target belongs to.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Node { node_id }
            | Self::OutputPort { node_id, .. }
            | Self::InputPort { node_id, .. } => *node_id,
        }
    }
}

/// The active gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    /// No pointer activity.
    #[default]
    Idle,
    /// Pointer over an entity, no button down.
    Hovering { target: HitTarget },
    /// Moving the selected nodes. Positions are previewed, not committed;
    /// exactly one operation is emitted on release.
    Dragging {
        /// Canvas-space grab point.
        grab: Point,
        /// Selected nodes and their positions at gesture start.
        start_positions: Vec<(NodeId, Point)>,
        /// Current canvas-space displacement.
        delta: Vector,
    },
    /// Rubber-band selection.
    Selecting {
        /// Canvas-space press point.
        origin: Point,
        /// Current canvas-space corner.
        current: Point,
        /// Whether the band extends the existing selection.
        additive: bool,
    },
    /// Dragging a new connection out of an output port.
    ConnectingDrag {
        source_node: NodeId,
        source_port: String,
        /// Current canvas-space pointer position.
        current: Point,
    },
    /// Moving the viewport.
    Panning {
        /// Last screen-space pointer position.
        last: Point,
    },
}

/// UI state owned by the interaction controller.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// The local viewport; pan/zoom never becomes an operation.
    pub viewport: Viewport,
    /// Selected nodes, ordered for deterministic batch emission.
    pub selection: BTreeSet<NodeId>,
    /// Current hover target, mirrored from the gesture for renderers.
    pub hovered: Option<HitTarget>,
}

impl UiState {
    /// Creates UI state for a screen size.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            selection: BTreeSet::new(),
            hovered: None,
        }
    }
}
