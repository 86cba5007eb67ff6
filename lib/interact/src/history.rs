//! Undo/redo history.
//!
//! The history stores *inverse payloads* for locally originated
//! operations: undoing replays the inverse as a fresh operation through
//! the normal apply path, so undo edits propagate to collaborators like
//! any other edit. Remote operations never enter the history; this client
//! can only undo its own work.

use flowloom_graph::OperationPayload;

const DEFAULT_LIMIT: usize = 200;

/// Stack of inverse payloads for local operations.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<OperationPayload>,
    redo: Vec<OperationPayload>,
    limit: usize,
}

impl History {
    /// Creates an empty history with the default depth limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Records the inverse of a freshly committed local operation.
    ///
    /// New edits invalidate the redo stack.
    pub fn record(&mut self, inverse: OperationPayload) {
        self.undo.push(inverse);
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
        self.redo.clear();
    }

    /// Pops the most recent inverse for undoing.
    pub fn pop_undo(&mut self) -> Option<OperationPayload> {
        self.undo.pop()
    }

    /// Pops the most recent inverse for redoing.
    pub fn pop_redo(&mut self) -> Option<OperationPayload> {
        self.redo.pop()
    }

    /// Pushes onto the redo stack after an undo was applied.
    pub fn push_redo(&mut self, inverse: OperationPayload) {
        self.redo.push(inverse);
    }

    /// Pushes onto the undo stack after a redo was applied, without
    /// clearing redo.
    pub fn push_undo(&mut self, inverse: OperationPayload) {
        self.undo.push(inverse);
    }

    /// Whether an undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drops entries invalidated by a remote change, e.g. after a resync.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
