//! Routed path types.

use flowloom_core::Point;
use serde::{Deserialize, Serialize};

/// Which edge of a node a port sits on. Output ports usually face right,
/// input ports left; the layout is the host's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Unit direction pointing away from the node.
    #[must_use]
    pub fn direction(&self) -> (f64, f64) {
        match self {
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
            Self::Top => (0.0, -1.0),
            Self::Bottom => (0.0, 1.0),
        }
    }
}

/// A port position on the boundary of a node, facing a side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortAnchor {
    /// Canvas-space position of the port.
    pub position: Point,
    /// The node edge the port faces away from.
    pub side: Side,
}

impl PortAnchor {
    /// Creates an anchor.
    #[must_use]
    pub const fn new(position: Point, side: Side) -> Self {
        Self { position, side }
    }

    /// The stub point: the anchor pushed `length` away from the node.
    #[must_use]
    pub fn stub(&self, length: f64) -> Point {
        let (dx, dy) = self.side.direction();
        Point::new(self.position.x + dx * length, self.position.y + dy * length)
    }
}

/// One axis-aligned segment of a routed path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub from: Point,
    pub to: Point,
}

impl PathSegment {
    /// Returns true if the segment is horizontal.
    #[must_use]
    pub fn is_horizontal(&self) -> bool {
        (self.from.y - self.to.y).abs() < f64::EPSILON
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.from.distance_to(self.to)
    }
}

/// An orthogonal polyline from source port to target port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPath {
    /// Waypoints including both endpoints; consecutive points differ on
    /// exactly one axis.
    pub waypoints: Vec<Point>,
    /// Radius used to round corners when drawing. Presentational only.
    pub corner_radius: f64,
}

impl RoutedPath {
    /// Builds a path from waypoints, collapsing collinear runs.
    #[must_use]
    pub fn new(waypoints: Vec<Point>, corner_radius: f64) -> Self {
        Self {
            waypoints: simplify(waypoints),
            corner_radius,
        }
    }

    /// Iterates the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = PathSegment> + '_ {
        self.waypoints
            .windows(2)
            .map(|pair| PathSegment {
                from: pair[0],
                to: pair[1],
            })
    }

    /// Number of direction changes along the path.
    #[must_use]
    pub fn bend_count(&self) -> usize {
        let segments: Vec<PathSegment> = self.segments().collect();
        segments
            .windows(2)
            .filter(|pair| pair[0].is_horizontal() != pair[1].is_horizontal())
            .count()
    }

    /// Total path length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }
}

/// Drops duplicate and collinear intermediate waypoints.
fn simplify(waypoints: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(waypoints.len());
    for point in waypoints {
        if let Some(last) = out.last() {
            if (last.x - point.x).abs() < f64::EPSILON && (last.y - point.y).abs() < f64::EPSILON {
                continue;
            }
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let collinear_x =
                (a.x - b.x).abs() < f64::EPSILON && (b.x - point.x).abs() < f64::EPSILON;
            let collinear_y =
                (a.y - b.y).abs() < f64::EPSILON && (b.y - point.y).abs() < f64::EPSILON;
            if collinear_x || collinear_y {
                out.pop();
            }
        }
        out.push(point);
    }
    out
}
