//! Presence: who is in the document and where.
//!
//! Presence is advisory and non-authoritative. It is never transformed,
//! never persisted, and losing a presence message is harmless; the next
//! one replaces it wholesale.

use flowloom_core::{ClientId, NodeId, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One participant's cursor and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceState {
    /// The participant.
    pub client: ClientId,
    /// Display name, host-supplied.
    pub name: String,
    /// Canvas-space cursor position, if the pointer is over the canvas.
    pub cursor: Option<Point>,
    /// Currently selected nodes.
    pub selection: Vec<NodeId>,
}

/// Last known presence per participant.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    participants: HashMap<ClientId, PresenceState>,
}

impl PresenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a participant's presence.
    pub fn update(&mut self, state: PresenceState) {
        self.participants.insert(state.client, state);
    }

    /// Removes a participant, e.g. on disconnect.
    pub fn remove(&mut self, client: ClientId) -> Option<PresenceState> {
        self.participants.remove(&client)
    }

    /// Looks up one participant.
    #[must_use]
    pub fn get(&self, client: ClientId) -> Option<&PresenceState> {
        self.participants.get(&client)
    }

    /// Iterates all participants in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &PresenceState> {
        self.participants.values()
    }

    /// Number of tracked participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true when nobody is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
