//! Document snapshots.
//!
//! A snapshot is the serializable, order-normalized view of a document:
//! the unit of persistence and of collaborative resync. Snapshots
//! round-trip losslessly through `GraphModel::snapshot`/`restore`, and
//! structural equality of snapshots is how convergence is checked.

use crate::connection::Connection;
use crate::node::Node;
use flowloom_core::DocumentId;
use serde::{Deserialize, Serialize};

/// A complete, serializable document state.
///
/// Nodes and connections are sorted by id so two convergent models always
/// produce byte-identical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Document id.
    pub id: DocumentId,
    /// Display name.
    pub name: String,
    /// Revision counter at the time of the snapshot.
    pub revision: u64,
    /// All nodes, sorted by id.
    pub nodes: Vec<Node>,
    /// All connections (including detached ones), sorted by id.
    pub connections: Vec<Connection>,
}

impl DocumentSnapshot {
    /// Creates an empty snapshot for a new document.
    #[must_use]
    pub fn empty(id: DocumentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            revision: 0,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Normalizes entity ordering. Called by producers before handing the
    /// snapshot out; restore does not depend on it.
    pub fn normalize(&mut self) {
        self.nodes.sort_by_key(|n| n.id);
        self.connections.sort_by_key(|c| c.id);
    }
}
