//! Spatial-index maintenance from change events.
//!
//! The index is a derived cache: every applied operation yields change
//! events, and this is the single place that folds them back into the
//! index. Connection bounds are the union of their endpoint bounds, so a
//! node move refreshes the bounds of every connection touching it.

use flowloom_core::Rect;
use flowloom_graph::{ChangeEvent, GraphModel};
use flowloom_spatial::{EntityId, GridIndex};

/// Applies a batch of change events to the index.
pub fn sync_index(index: &mut GridIndex, model: &GraphModel, events: &[ChangeEvent]) {
    for event in events {
        match event {
            ChangeEvent::NodeInserted { node_id } | ChangeEvent::NodeUpdated { node_id } => {
                if let Some(node) = model.node(*node_id) {
                    index.update(EntityId::Node(*node_id), node.bounds());
                }
                // A moved node drags its connections' bounds with it.
                for connection in model.connections() {
                    if connection.references(*node_id) {
                        if let Some(bounds) = connection_bounds(model, connection.id) {
                            index.update(EntityId::Connection(connection.id), bounds);
                        }
                    }
                }
            }
            ChangeEvent::NodeRemoved { node_id } => {
                index.remove(EntityId::Node(*node_id));
            }
            ChangeEvent::ConnectionInserted { connection_id }
            | ChangeEvent::ConnectionUpdated { connection_id }
            | ChangeEvent::ConnectionDetached { connection_id } => {
                match connection_bounds(model, *connection_id) {
                    Some(bounds) => index.update(EntityId::Connection(*connection_id), bounds),
                    None => {
                        index.remove(EntityId::Connection(*connection_id));
                    }
                }
            }
            ChangeEvent::ConnectionRemoved { connection_id } => {
                index.remove(EntityId::Connection(*connection_id));
            }
        }
    }
}

/// Rebuilds the index from scratch, used after snapshot restore.
pub fn rebuild_index(index: &mut GridIndex, model: &GraphModel) {
    *index = GridIndex::with_cell_size(index.cell_size());
    for node in model.nodes() {
        index.insert(EntityId::Node(node.id), node.bounds());
    }
    for connection in model.connections() {
        if let Some(bounds) = connection_bounds(model, connection.id) {
            index.insert(EntityId::Connection(connection.id), bounds);
        }
    }
}

fn connection_bounds(
    model: &GraphModel,
    connection_id: flowloom_core::ConnectionId,
) -> Option<Rect> {
    let connection = model.connection(connection_id)?;
    let source = model.node(connection.source_node)?;
    let target = model.node(connection.target_node)?;
    Some(source.bounds().union(&target.bounds()))
}
