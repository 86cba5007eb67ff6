//! Synthetic input events.
//!
//! The host translates real pointer and keyboard activity into these
//! values; the controller never touches platform event types. Positions
//! are screen-space pixels.

use flowloom_core::Point;
use serde::{Deserialize, Serialize};

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    /// Shift: additive selection, larger nudge steps.
    pub shift: bool,
    /// Platform primary modifier (Ctrl or Cmd): toggle selection.
    pub primary: bool,
    /// Alt.
    pub alt: bool,
    /// Space held: pan tool.
    pub space: bool,
}

impl Modifiers {
    /// True when any selection-extending modifier is held.
    #[must_use]
    pub fn extends_selection(&self) -> bool {
        self.shift || self.primary
    }
}

/// Logical keys the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Undo,
    Redo,
}

/// One input event, in screen-space coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        position: Point,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerMove {
        position: Point,
        modifiers: Modifiers,
    },
    PointerUp {
        position: Point,
        modifiers: Modifiers,
    },
    /// Scroll wheel; positive delta zooms out.
    Wheel { position: Point, delta: f64 },
    KeyDown { key: Key, modifiers: Modifiers },
}
