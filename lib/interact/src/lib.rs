//! Interaction controller for the flowloom canvas.
//!
//! Translates synthetic input events into graph operations and viewport
//! changes via a gesture state machine:
//!
//! `Idle → Hovering → {Dragging, Selecting, ConnectingDrag, Panning} → Idle`
//!
//! Events are plain values, so the whole state machine is unit-testable
//! without pointer hardware. Drags commit exactly one operation on
//! release; cancelled gestures commit nothing. Undo/redo covers local
//! operations only.

pub mod controller;
pub mod history;
pub mod input;
pub mod state;
pub mod sync;

pub use controller::{EventOutcome, InteractionController};
pub use history::History;
pub use input::{InputEvent, Key, Modifiers, PointerButton};
pub use state::{Gesture, HitTarget, UiState};
pub use sync::sync_index;
