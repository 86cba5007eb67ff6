//! Graph model for the flowloom canvas engine.
//!
//! This crate is the single source of truth for document state:
//!
//! - **Nodes and connections**: positioned, typed entities with ports
//! - **Node type registry**: host-supplied definitions (ports, defaults)
//! - **Operations**: atomic, serializable mutations with logical timestamps
//! - **Graph model**: the sole mutation entry point (`GraphModel::apply`),
//!   with validation, idempotent replay, cascade delete, and change events
//!
//! All mutations flow through [`GraphModel::apply`]; no other component may
//! mutate nodes or connections directly. Rejections are returned as typed
//! values, never raised as errors.

pub mod connection;
pub mod document;
pub mod error;
pub mod event;
pub mod model;
pub mod node;
pub mod operation;
pub mod port;
pub mod registry;

pub use connection::{Connection, ConnectionPatch};
pub use document::DocumentSnapshot;
pub use error::{GraphError, RejectionReason};
pub use event::ChangeEvent;
pub use model::{AppliedChange, ApplyOutcome, EntityRef, GraphModel};
pub use node::{Node, NodePatch, PropertyValue, ValidationState};
pub use operation::{LamportClock, LogicalTimestamp, Operation, OperationPayload};
pub use port::{InputPort, OutputPort, PortSchema};
pub use registry::{NodeTypeDefinition, NodeTypeId, NodeTypeRegistry};
