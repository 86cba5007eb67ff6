//! Core domain types and utilities for the flowloom canvas engine.
//!
//! This crate provides the foundational types shared by every other
//! flowloom crate: strongly-typed entity identifiers and the canvas-space
//! geometry primitives (points, sizes, rectangles, viewport camera).

pub mod geometry;
pub mod id;

pub use geometry::{Point, Rect, Size, Vector, Viewport, ZOOM_MAX, ZOOM_MIN};
pub use id::{ClientId, ConnectionId, DocumentId, NodeId, OperationId, ParseIdError};
