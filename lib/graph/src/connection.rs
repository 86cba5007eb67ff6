//! Connection types.
//!
//! Connections are directed edges from a source node's output port to a
//! target node's input port. Routing waypoints are computed by the router
//! at render time and are never stored here; topology alone is
//! authoritative.

use flowloom_core::{ConnectionId, NodeId};
use serde::{Deserialize, Serialize};

/// A directed edge between two node ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique identifier, immutable for the connection's lifetime.
    pub id: ConnectionId,
    /// The node the connection starts from.
    pub source_node: NodeId,
    /// The output port name on the source node.
    pub source_port: String,
    /// The node the connection ends at.
    pub target_node: NodeId,
    /// The input port name on the target node.
    pub target_port: String,
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional condition expression attached by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Set when an endpoint node vanished during concurrent editing.
    /// Detached connections are kept (flagged, not silently dropped) until
    /// a settled delete cascades them away.
    #[serde(default)]
    pub detached: bool,
}

impl Connection {
    /// Creates a connection between two ports.
    #[must_use]
    pub fn new(
        source_node: NodeId,
        source_port: impl Into<String>,
        target_node: NodeId,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            source_node,
            source_port: source_port.into(),
            target_node,
            target_port: target_port.into(),
            label: None,
            condition: None,
            detached: false,
        }
    }

    /// Returns true if the connection starts and ends on the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source_node == self.target_node
    }

    /// Returns true if the connection references the given node.
    #[must_use]
    pub fn references(&self, node_id: NodeId) -> bool {
        self.source_node == node_id || self.target_node == node_id
    }

    /// Returns true if `other` binds the same (source port, target port) pair.
    #[must_use]
    pub fn same_binding(&self, other: &Connection) -> bool {
        self.source_node == other.source_node
            && self.source_port == other.source_port
            && self.target_node == other.target_node
            && self.target_port == other.target_port
    }
}

/// A per-field patch applied by an `UpdateConnection` operation.
///
/// The outer `Option` distinguishes "leave unchanged" from "set to None".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Option<String>>,
}

impl ConnectionPatch {
    /// A patch that sets the label.
    #[must_use]
    pub fn set_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(Some(label.into())),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.condition.is_none()
    }

    /// Applies the patch to a connection in place.
    pub fn apply_to(&self, connection: &mut Connection) {
        if let Some(label) = &self.label {
            connection.label = label.clone();
        }
        if let Some(condition) = &self.condition {
            connection.condition = condition.clone();
        }
    }

    /// Removes from `self` every field that `other` also sets.
    pub fn remove_overlap_with(&mut self, other: &ConnectionPatch) {
        if other.label.is_some() {
            self.label = None;
        }
        if other.condition.is_some() {
            self.condition = None;
        }
    }
}
