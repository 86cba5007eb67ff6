//! Canvas-space geometry primitives.
//!
//! All coordinates are in canvas space (document coordinates), not screen
//! space. The [`Viewport`] owns the mapping between the two: screen
//! position = (canvas position - pan) * zoom.
//!
//! Geometry constructors validate their inputs: node positions must be
//! finite and sizes strictly positive. Invalid geometry is rejected at the
//! edges of the system so the interior can rely on it.

use serde::{Deserialize, Serialize};

/// Lower bound for viewport zoom.
pub const ZOOM_MIN: f64 = 0.1;
/// Upper bound for viewport zoom.
pub const ZOOM_MAX: f64 = 5.0;

/// A point in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite (no NaN or infinity).
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns the point translated by a vector.
    #[must_use]
    pub fn translated(&self, v: Vector) -> Self {
        Self::new(self.x + v.dx, self.y + v.dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A displacement between two points in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
}

impl Vector {
    /// Creates a new vector.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// The vector from `from` to `to`.
    #[must_use]
    pub fn between(from: Point, to: Point) -> Self {
        Self::new(to.x - from.x, to.y - from.y)
    }

    /// Returns true if both components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }
}

/// A width/height pair. Valid sizes are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Returns true if both dimensions are finite and strictly positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// An axis-aligned rectangle in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner x.
    pub x: f64,
    /// Top-left corner y.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from a position and size.
    #[must_use]
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Creates the smallest rectangle covering two corner points.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Right edge x coordinate.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y coordinate.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the rectangle.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns true if the point lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Returns true if the point lies strictly inside the rectangle.
    #[must_use]
    pub fn contains_interior(&self, p: Point) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }

    /// Returns true if the two rectangles overlap (shared edges count).
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Returns true if `other` lies entirely within this rectangle.
    #[must_use]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    /// Returns the rectangle grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    /// Returns the union of two rectangles.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }
}

/// Camera state for the local client's view of the canvas.
///
/// The viewport is owned exclusively by the local client and never crosses
/// the collaboration channel; each participant has an independent view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Canvas-space coordinate shown at the top-left of the screen.
    pub pan: Point,
    /// Zoom scalar, clamped to [`ZOOM_MIN`]..=[`ZOOM_MAX`].
    pub zoom: f64,
    /// Screen size in pixels.
    pub screen: Size,
}

impl Viewport {
    /// Creates a viewport at the origin with zoom 1.0.
    #[must_use]
    pub fn new(screen: Size) -> Self {
        Self {
            pan: Point::default(),
            zoom: 1.0,
            screen,
        }
    }

    /// The canvas-space rectangle currently visible on screen.
    #[must_use]
    pub fn visible_bounds(&self) -> Rect {
        Rect::new(
            self.pan.x,
            self.pan.y,
            self.screen.width / self.zoom,
            self.screen.height / self.zoom,
        )
    }

    /// Converts a screen-space position to canvas space.
    #[must_use]
    pub fn to_canvas(&self, screen_pos: Point) -> Point {
        Point::new(
            self.pan.x + screen_pos.x / self.zoom,
            self.pan.y + screen_pos.y / self.zoom,
        )
    }

    /// Converts a canvas-space position to screen space.
    #[must_use]
    pub fn to_screen(&self, canvas_pos: Point) -> Point {
        Point::new(
            (canvas_pos.x - self.pan.x) * self.zoom,
            (canvas_pos.y - self.pan.y) * self.zoom,
        )
    }

    /// Pans the viewport by a screen-space delta.
    pub fn pan_by(&mut self, screen_delta: Vector) {
        self.pan.x -= screen_delta.dx / self.zoom;
        self.pan.y -= screen_delta.dy / self.zoom;
    }

    /// Sets the zoom level, clamped to the valid range, keeping the given
    /// screen-space anchor point fixed over the same canvas position.
    pub fn zoom_to(&mut self, zoom: f64, screen_anchor: Point) {
        let anchor_canvas = self.to_canvas(screen_anchor);
        self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        // Re-pan so the anchor stays put on screen.
        self.pan.x = anchor_canvas.x - screen_anchor.x / self.zoom;
        self.pan.y = anchor_canvas.y - screen_anchor.y / self.zoom;
    }
}
