//! Spatial index for the flowloom canvas.
//!
//! Maintains a bounding-box lookup over nodes and connections for
//! hit-testing, render culling, and router obstacle queries. The index is
//! a derived cache: it is rebuilt incrementally from graph change events
//! and is never a source of truth.

pub mod grid;

pub use grid::{EntityId, GridIndex};
