//! Primitive buffer pooling.
//!
//! Frames are produced every few milliseconds; allocating fresh vectors
//! for items and polyline points each time creates steady allocator
//! churn. The pool keeps the backing buffers of recycled frames and hands
//! them back cleared, with capacity intact.

use crate::primitive::DisplayItem;
use flowloom_core::Point;

/// Reusable buffers for frame construction.
#[derive(Debug, Default)]
pub struct PrimitivePool {
    items: Vec<Vec<DisplayItem>>,
    points: Vec<Vec<Point>>,
    reused: u64,
    allocated: u64,
}

impl PrimitivePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a cleared display-item buffer, reusing capacity if possible.
    pub fn take_items(&mut self) -> Vec<DisplayItem> {
        match self.items.pop() {
            Some(mut buffer) => {
                buffer.clear();
                self.reused += 1;
                buffer
            }
            None => {
                self.allocated += 1;
                Vec::new()
            }
        }
    }

    /// Takes a cleared point buffer for a polyline.
    pub fn take_points(&mut self) -> Vec<Point> {
        match self.points.pop() {
            Some(mut buffer) => {
                buffer.clear();
                self.reused += 1;
                buffer
            }
            None => {
                self.allocated += 1;
                Vec::new()
            }
        }
    }

    /// Returns an item buffer to the pool.
    pub fn recycle_items(&mut self, buffer: Vec<DisplayItem>) {
        self.items.push(buffer);
    }

    /// Returns a point buffer to the pool.
    pub fn recycle_points(&mut self, buffer: Vec<Point>) {
        self.points.push(buffer);
    }

    /// Buffers served from the pool since creation.
    #[must_use]
    pub fn reuse_count(&self) -> u64 {
        self.reused
    }

    /// Buffers that had to be freshly allocated.
    #[must_use]
    pub fn allocation_count(&self) -> u64 {
        self.allocated
    }
}
