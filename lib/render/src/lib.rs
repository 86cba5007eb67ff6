//! Render pipeline for the flowloom canvas.
//!
//! The render engine is framework-agnostic: each frame it produces a
//! *display list* of draw primitives for the visible portion of the
//! document, which the embedding host rasterises (or exports as SVG).
//!
//! The pipeline per frame:
//! 1. cull through the spatial index, with a margin around the viewport;
//! 2. apply level-of-detail rules to small on-screen nodes;
//! 3. reuse pooled primitive buffers instead of fresh allocations;
//! 4. batch the display list by visual style, then z-order.
//!
//! If a frame runs over its time budget the next frame degrades by
//! dropping decorations (grid, shadows), never by dropping entities.

pub mod frame;
pub mod pool;
pub mod primitive;
pub mod svg;

pub use frame::{Frame, FrameBuilder, FrameStats, RenderOptions};
pub use pool::PrimitivePool;
pub use primitive::{DisplayItem, Shape, StyleClass};
pub use svg::export_svg;
