//! Display-list primitives.
//!
//! A frame is a flat list of [`DisplayItem`]s in draw order. Items carry a
//! style class rather than raw colors; the host's theme maps classes to
//! concrete paint. Sorting by style class first batches draw calls with
//! the same visual state together.

use flowloom_core::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Visual style bucket for batching. Declaration order is draw order:
/// background first, overlays last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StyleClass {
    /// Background grid lines. Decoration; dropped when degraded.
    GridLine,
    /// Drop shadow under node bodies. Decoration; dropped when degraded.
    NodeShadow,
    /// Connection polylines.
    Connection,
    /// Detached connections, drawn differently so the user sees the flag.
    ConnectionDetached,
    /// Node body rectangles.
    NodeBody,
    /// Node bodies with validation errors.
    NodeBodyInvalid,
    /// Port dots on node edges.
    Port,
    /// Node labels.
    NodeLabel,
    /// Selection and hover outlines.
    SelectionOutline,
}

impl StyleClass {
    /// Returns true for decoration-only styles that budget degradation
    /// may skip.
    #[must_use]
    pub fn is_decoration(&self) -> bool {
        matches!(self, Self::GridLine | Self::NodeShadow)
    }
}

/// Geometry of one display item, in screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        rect: Rect,
        corner_radius: f64,
    },
    Line {
        from: Point,
        to: Point,
    },
    Polyline {
        points: Vec<Point>,
        corner_radius: f64,
    },
    Circle {
        center: Point,
        radius: f64,
    },
    Text {
        origin: Point,
        content: String,
        font_size: f64,
    },
}

/// One drawable primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    /// Style bucket; primary sort key for batching.
    pub style: StyleClass,
    /// Stacking order within a style bucket.
    pub z_order: i32,
    /// Screen-space geometry.
    pub shape: Shape,
}

impl DisplayItem {
    /// Creates a display item.
    #[must_use]
    pub fn new(style: StyleClass, z_order: i32, shape: Shape) -> Self {
        Self {
            style,
            z_order,
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_order_matches_draw_order() {
        assert!(StyleClass::GridLine < StyleClass::Connection);
        assert!(StyleClass::Connection < StyleClass::NodeBody);
        assert!(StyleClass::NodeBody < StyleClass::SelectionOutline);
    }

    #[test]
    fn decorations_identified() {
        assert!(StyleClass::GridLine.is_decoration());
        assert!(StyleClass::NodeShadow.is_decoration());
        assert!(!StyleClass::NodeBody.is_decoration());
        assert!(!StyleClass::Connection.is_decoration());
    }

    #[test]
    fn display_item_serde_roundtrip() {
        let item = DisplayItem::new(
            StyleClass::NodeLabel,
            3,
            Shape::Text {
                origin: Point::new(10.0, 20.0),
                content: "Fetch".into(),
                font_size: 12.0,
            },
        );
        let json = serde_json::to_string(&item).expect("serialize");
        let parsed: DisplayItem = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(item, parsed);
    }
}
