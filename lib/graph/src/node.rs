//! Canvas node types.
//!
//! Nodes are the positioned building blocks of a document. Each node has:
//! - A unique ID, immutable for the node's lifetime
//! - A type tag resolved against the host-supplied registry
//! - Canvas-space position and size
//! - A property bag typed as a tagged union
//! - A validation state and z-order

use crate::registry::NodeTypeId;
use flowloom_core::{NodeId, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A typed property value on a node.
///
/// Property bags are tagged unions rather than raw JSON so the core keeps
/// type safety while remaining decoupled from specific node types; the
/// `Json` variant is the escape hatch for host-defined structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Boolean(bool),
    /// One choice out of a host-defined set.
    Select(String),
    Json(JsonValue),
}

/// Validation state of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValidationState {
    /// The node passes all host-side validation.
    #[default]
    Valid,
    /// The node has validation errors, listed for display.
    Invalid {
        /// Human-readable error messages.
        errors: Vec<String>,
    },
}

impl ValidationState {
    /// Returns true if the node is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// A positioned, typed unit on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier, immutable and globally unique within a document.
    pub id: NodeId,
    /// Type tag resolved against the node type registry.
    #[serde(rename = "type")]
    pub type_id: NodeTypeId,
    /// Top-left position in canvas space. Always finite.
    pub position: Point,
    /// Node size. Always strictly positive.
    pub size: Size,
    /// Type-specific properties, ordered by key.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Current validation state.
    #[serde(default)]
    pub validation: ValidationState,
    /// Stacking order; higher values draw on top.
    #[serde(default)]
    pub z_order: i32,
}

impl Node {
    /// Creates a node at a position with the given type and size.
    #[must_use]
    pub fn new(type_id: impl Into<NodeTypeId>, position: Point, size: Size) -> Self {
        Self {
            id: NodeId::new(),
            type_id: type_id.into(),
            position,
            size,
            properties: BTreeMap::new(),
            validation: ValidationState::Valid,
            z_order: 0,
        }
    }

    /// Returns true if position is finite and size strictly positive.
    #[must_use]
    pub fn has_valid_geometry(&self) -> bool {
        self.position.is_finite() && self.size.is_valid()
    }

    /// The node's bounding rectangle in canvas space.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Sets a property value.
    pub fn set_property(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.insert(key.into(), value);
    }

    /// Returns a property value by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// A per-field patch applied to a node by an `UpdateNode` operation.
///
/// Fields left as `None` are untouched, which is what allows concurrent
/// updates to unrelated fields to merge instead of overwriting each other.
/// Property entries are patched per key; a `None` entry value removes the
/// key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Option<PropertyValue>>,
}

impl NodePatch {
    /// A patch that moves the node.
    #[must_use]
    pub fn move_to(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// A patch that resizes the node.
    #[must_use]
    pub fn resize_to(size: Size) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    /// A patch that sets one property.
    #[must_use]
    pub fn set_property(key: impl Into<String>, value: PropertyValue) -> Self {
        let mut patch = Self::default();
        patch.properties.insert(key.into(), Some(value));
        patch
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.size.is_none()
            && self.z_order.is_none()
            && self.validation.is_none()
            && self.properties.is_empty()
    }

    /// Applies the patch to a node in place.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(size) = self.size {
            node.size = size;
        }
        if let Some(z_order) = self.z_order {
            node.z_order = z_order;
        }
        if let Some(validation) = &self.validation {
            node.validation = validation.clone();
        }
        for (key, value) in &self.properties {
            match value {
                Some(v) => {
                    node.properties.insert(key.clone(), v.clone());
                }
                None => {
                    node.properties.remove(key);
                }
            }
        }
    }

    /// Removes from `self` every field that `other` also sets.
    ///
    /// This is the core of the per-field last-writer-wins merge: when a
    /// concurrent patch carries a later logical timestamp, the earlier
    /// patch yields exactly the overlapping fields and keeps the rest.
    pub fn remove_overlap_with(&mut self, other: &NodePatch) {
        if other.position.is_some() {
            self.position = None;
        }
        if other.size.is_some() {
            self.size = None;
        }
        if other.z_order.is_some() {
            self.z_order = None;
        }
        if other.validation.is_some() {
            self.validation = None;
        }
        self.properties.retain(|key, _| !other.properties.contains_key(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> Node {
        let mut node = Node::new("transform", Point::new(10.0, 20.0), Size::new(160.0, 64.0));
        node.set_property("label", PropertyValue::String("Step 1".into()));
        node
    }

    #[test]
    fn node_geometry_validity() {
        let node = sample_node();
        assert!(node.has_valid_geometry());

        let mut bad = sample_node();
        bad.size = Size::new(0.0, 10.0);
        assert!(!bad.has_valid_geometry());

        let mut nan = sample_node();
        nan.position = Point::new(f64::NAN, 0.0);
        assert!(!nan.has_valid_geometry());
    }

    #[test]
    fn node_bounds() {
        let node = sample_node();
        let bounds = node.bounds();
        assert_eq!(bounds.x, 10.0);
        assert_eq!(bounds.right(), 170.0);
        assert_eq!(bounds.bottom(), 84.0);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut node = sample_node();
        let patch = NodePatch::move_to(Point::new(100.0, 100.0));
        patch.apply_to(&mut node);

        assert_eq!(node.position, Point::new(100.0, 100.0));
        assert_eq!(node.size, Size::new(160.0, 64.0));
        assert_eq!(
            node.property("label"),
            Some(&PropertyValue::String("Step 1".into()))
        );
    }

    #[test]
    fn patch_property_set_and_remove() {
        let mut node = sample_node();

        let mut patch = NodePatch::set_property("label", PropertyValue::String("Renamed".into()));
        patch.properties.insert("stale".into(), None);
        node.set_property("stale", PropertyValue::Boolean(true));
        patch.apply_to(&mut node);

        assert_eq!(
            node.property("label"),
            Some(&PropertyValue::String("Renamed".into()))
        );
        assert!(node.property("stale").is_none());
    }

    #[test]
    fn remove_overlap_keeps_disjoint_fields() {
        let mut mine = NodePatch::move_to(Point::new(1.0, 1.0));
        mine.properties
            .insert("label".into(), Some(PropertyValue::String("A".into())));

        let theirs = NodePatch::set_property("label", PropertyValue::String("B".into()));
        mine.remove_overlap_with(&theirs);

        assert!(mine.position.is_some(), "position not contested");
        assert!(mine.properties.is_empty(), "label contested, later writer wins");
    }

    #[test]
    fn node_serde_roundtrip() {
        let node = sample_node();
        let json = serde_json::to_string(&node).expect("serialize");
        let parsed: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(node, parsed);
    }
}
