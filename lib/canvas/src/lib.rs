//! Host embedding facade.
//!
//! [`Canvas`] wires the graph model, spatial index, interaction
//! controller, render pipeline, and collaboration session into one object
//! the host mounts. The host supplies the node-type registry (palette and
//! property panels stay external), feeds input events and wire messages
//! in, and takes frames and outgoing wire messages out.

mod canvas;

pub use canvas::{Canvas, CanvasOptions};

pub use flowloom_collab::{SessionEvent, WireMessage};
pub use flowloom_graph::AppliedChange;
pub use flowloom_interact::{EventOutcome, InputEvent};
pub use flowloom_render::Frame;
