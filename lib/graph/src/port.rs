//! Port system for canvas nodes.
//!
//! Ports are named connection points on nodes. Each port has a schema that
//! defines the data type it accepts (input) or produces (output).
//! Connections between ports are valid if their schemas are compatible.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A JSON-Schema-flavoured definition of the data type for a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSchema {
    /// The schema definition.
    #[serde(flatten)]
    pub schema: JsonValue,
}

impl PortSchema {
    /// Creates a schema that accepts any value.
    #[must_use]
    pub fn any() -> Self {
        Self {
            schema: serde_json::json!({}),
        }
    }

    /// Creates a schema for a string type.
    #[must_use]
    pub fn string() -> Self {
        Self {
            schema: serde_json::json!({ "type": "string" }),
        }
    }

    /// Creates a schema for a number type.
    #[must_use]
    pub fn number() -> Self {
        Self {
            schema: serde_json::json!({ "type": "number" }),
        }
    }

    /// Creates a schema for a boolean type.
    #[must_use]
    pub fn boolean() -> Self {
        Self {
            schema: serde_json::json!({ "type": "boolean" }),
        }
    }

    /// Creates a schema for an object type.
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema: serde_json::json!({ "type": "object" }),
        }
    }

    /// Creates a schema from a raw JSON value.
    #[must_use]
    pub fn from_json(schema: JsonValue) -> Self {
        Self { schema }
    }

    /// Checks if a value of this schema may flow into a port of `other`.
    ///
    /// The empty schema (any) is compatible with everything; otherwise a
    /// simple type-tag equality check. Complex schemas are assumed
    /// compatible; full JSON Schema subsumption is out of scope here.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        if self.schema == serde_json::json!({}) || other.schema == serde_json::json!({}) {
            return true;
        }

        if let (Some(self_type), Some(other_type)) =
            (self.schema.get("type"), other.schema.get("type"))
        {
            return self_type == other_type;
        }

        true
    }
}

/// An input port on a node: receives data from one incoming connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    /// Port name, unique among the node's inputs.
    pub name: String,
    /// The data type this port accepts.
    pub schema: PortSchema,
}

impl InputPort {
    /// Creates an input port.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: PortSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// An output port on a node: feeds any number of outgoing connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    /// Port name, unique among the node's outputs.
    pub name: String,
    /// The data type this port produces.
    pub schema: PortSchema,
}

impl OutputPort {
    /// Creates an output port.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: PortSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}
