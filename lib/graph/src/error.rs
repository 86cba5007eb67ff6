//! Error and rejection types for the graph model.
//!
//! Two distinct families:
//! - [`RejectionReason`]: an operation failed validation. This is expected
//!   program flow, returned as a value from `GraphModel::apply`, surfaced
//!   to the user as a non-fatal notification. It is never raised.
//! - [`GraphError`]: a genuine failure (corrupt snapshot, restore of
//!   inconsistent data), propagated as `Err`.

use flowloom_core::{ConnectionId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an operation was rejected by the graph model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Referenced node does not exist.
    NodeNotFound { node_id: NodeId },
    /// Referenced connection does not exist.
    ConnectionNotFound { connection_id: ConnectionId },
    /// Node type is not in the registry.
    UnknownNodeType { type_id: String },
    /// Named port does not exist on the node.
    PortNotFound { node_id: NodeId, port_name: String },
    /// Source and target port schemas are incompatible.
    IncompatiblePorts {
        source_node: NodeId,
        source_port: String,
        target_node: NodeId,
        target_port: String,
    },
    /// Self-loop on a node type that does not permit them.
    SelfLoop { node_id: NodeId },
    /// A connection already binds this (source port, target port) pair.
    DuplicatePortBinding { existing: ConnectionId },
    /// Node geometry is non-finite or non-positive.
    InvalidGeometry { node_id: NodeId },
    /// A node with this id already exists.
    DuplicateNode { node_id: NodeId },
    /// A connection with this id already exists.
    DuplicateConnection { connection_id: ConnectionId },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::ConnectionNotFound { connection_id } => {
                write!(f, "connection not found: {connection_id}")
            }
            Self::UnknownNodeType { type_id } => {
                write!(f, "unknown node type: {type_id}")
            }
            Self::PortNotFound { node_id, port_name } => {
                write!(f, "port '{port_name}' not found on node {node_id}")
            }
            Self::IncompatiblePorts {
                source_node,
                source_port,
                target_node,
                target_port,
            } => {
                write!(
                    f,
                    "incompatible ports: {source_node}:{source_port} -> {target_node}:{target_port}"
                )
            }
            Self::SelfLoop { node_id } => {
                write!(f, "self-loop not permitted on node {node_id}")
            }
            Self::DuplicatePortBinding { existing } => {
                write!(f, "port pair already bound by connection {existing}")
            }
            Self::InvalidGeometry { node_id } => {
                write!(f, "invalid geometry for node {node_id}")
            }
            Self::DuplicateNode { node_id } => {
                write!(f, "node already exists: {node_id}")
            }
            Self::DuplicateConnection { connection_id } => {
                write!(f, "connection already exists: {connection_id}")
            }
        }
    }
}

impl std::error::Error for RejectionReason {}

/// Failures of the graph model itself, as opposed to operation rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A snapshot contained two entities with the same id.
    DuplicateIdInSnapshot { id: String },
    /// A snapshot node had invalid geometry.
    InvalidSnapshotGeometry { node_id: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIdInSnapshot { id } => {
                write!(f, "snapshot contains duplicate id: {id}")
            }
            Self::InvalidSnapshotGeometry { node_id } => {
                write!(f, "snapshot node {node_id} has invalid geometry")
            }
        }
    }
}

impl std::error::Error for GraphError {}
