//! Host-supplied node type definitions.
//!
//! The canvas core does not hard-code node types. The embedding host
//! registers a [`NodeTypeDefinition`] per type (ports, default size and
//! properties, palette metadata) and the graph model validates nodes and
//! connections against the registry.

use crate::node::PropertyValue;
use crate::port::{InputPort, OutputPort};
use flowloom_core::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// String-keyed identifier for a node type (e.g. `"http_request"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeTypeId(String);

impl NodeTypeId {
    /// Creates a node type id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeTypeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Definition of a node type, supplied by the embedding host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDefinition {
    /// The type tag nodes of this type carry.
    pub id: NodeTypeId,
    /// Human-readable label shown in the palette and on nodes.
    pub label: String,
    /// Icon name, resolved by the host's asset pipeline.
    pub icon: String,
    /// Size given to freshly created nodes of this type.
    pub default_size: Size,
    /// Property values given to freshly created nodes of this type.
    pub default_properties: BTreeMap<String, PropertyValue>,
    /// Input ports, in display order.
    pub inputs: Vec<InputPort>,
    /// Output ports, in display order.
    pub outputs: Vec<OutputPort>,
    /// Whether a connection may loop from this node back to itself.
    #[serde(default)]
    pub allow_self_loops: bool,
}

impl NodeTypeDefinition {
    /// Creates a definition with no ports and a default size.
    #[must_use]
    pub fn new(id: impl Into<NodeTypeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: String::new(),
            default_size: Size::new(160.0, 64.0),
            default_properties: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            allow_self_loops: false,
        }
    }

    /// Adds an input port.
    #[must_use]
    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    /// Adds an output port.
    #[must_use]
    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    /// Permits self-loop connections on nodes of this type.
    #[must_use]
    pub fn with_self_loops(mut self) -> Self {
        self.allow_self_loops = true;
        self
    }

    /// Looks up an input port by name.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Looks up an output port by name.
    #[must_use]
    pub fn output_port(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Canvas-space position of a named input port on a node with the
    /// given bounds. Inputs sit on the left edge, evenly spaced.
    #[must_use]
    pub fn input_anchor(&self, bounds: &Rect, name: &str) -> Option<Point> {
        let index = self.inputs.iter().position(|p| p.name == name)?;
        Some(Point::new(
            bounds.x,
            edge_offset(bounds, index, self.inputs.len()),
        ))
    }

    /// Canvas-space position of a named output port on a node with the
    /// given bounds. Outputs sit on the right edge, evenly spaced.
    #[must_use]
    pub fn output_anchor(&self, bounds: &Rect, name: &str) -> Option<Point> {
        let index = self.outputs.iter().position(|p| p.name == name)?;
        Some(Point::new(
            bounds.right(),
            edge_offset(bounds, index, self.outputs.len()),
        ))
    }
}

/// Vertical position of port `index` out of `count` on a node edge.
fn edge_offset(bounds: &Rect, index: usize, count: usize) -> f64 {
    bounds.y + bounds.height * (index + 1) as f64 / (count + 1) as f64
}

/// The set of node types known to a document.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: HashMap<NodeTypeId, NodeTypeDefinition>,
}

impl NodeTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node type, replacing any previous definition.
    pub fn register(&mut self, definition: NodeTypeDefinition) {
        self.types.insert(definition.id.clone(), definition);
    }

    /// Looks up a node type definition.
    #[must_use]
    pub fn get(&self, id: &NodeTypeId) -> Option<&NodeTypeDefinition> {
        self.types.get(id)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, id: &NodeTypeId) -> bool {
        self.types.contains_key(id)
    }

    /// Iterates over all registered definitions.
    pub fn iter(&self) -> impl Iterator<Item = &NodeTypeDefinition> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortSchema;

    #[test]
    fn registry_lookup() {
        let mut registry = NodeTypeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("transform", "Transform")
                .with_input(InputPort::new("input", PortSchema::any()))
                .with_output(OutputPort::new("output", PortSchema::any())),
        );

        let def = registry.get(&NodeTypeId::new("transform")).expect("registered");
        assert_eq!(def.label, "Transform");
        assert!(def.input_port("input").is_some());
        assert!(def.input_port("missing").is_none());
        assert!(!registry.contains(&NodeTypeId::new("unknown")));
    }

    #[test]
    fn port_anchors_spread_along_edges() {
        let def = NodeTypeDefinition::new("merge", "Merge")
            .with_input(InputPort::new("left", PortSchema::any()))
            .with_input(InputPort::new("right", PortSchema::any()))
            .with_output(OutputPort::new("output", PortSchema::any()));
        let bounds = Rect::new(0.0, 0.0, 120.0, 90.0);

        let left = def.input_anchor(&bounds, "left").expect("anchor");
        let right = def.input_anchor(&bounds, "right").expect("anchor");
        assert_eq!(left, Point::new(0.0, 30.0));
        assert_eq!(right, Point::new(0.0, 60.0));

        let output = def.output_anchor(&bounds, "output").expect("anchor");
        assert_eq!(output, Point::new(120.0, 45.0));

        assert!(def.input_anchor(&bounds, "missing").is_none());
    }

    #[test]
    fn self_loops_default_off() {
        let def = NodeTypeDefinition::new("loop", "Loop");
        assert!(!def.allow_self_loops);
        assert!(def.with_self_loops().allow_self_loops);
    }
}
