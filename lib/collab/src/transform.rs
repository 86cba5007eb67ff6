//! Type-specific transform rules.
//!
//! A remote operation is transformed against the locally pending (sent
//! but unacknowledged) operations before it is applied. The rules resolve
//! exactly the conflicts the data model permits; everything else commutes
//! naturally because entities carry globally unique ids.

use crate::error::{ConflictVoid, VoidReason};
use flowloom_core::NodeId;
use flowloom_graph::{Operation, OperationPayload};

/// A locally applied operation awaiting relay acknowledgment.
#[derive(Debug, Clone)]
pub struct PendingLocal {
    /// The operation as sent.
    pub operation: Operation,
    /// Document revision when it was created.
    pub revision_ref: u64,
}

/// The outcome of transforming one remote operation.
#[derive(Debug, Default)]
pub struct TransformResult {
    /// The remote operation to apply, if it survived. A per-field merge
    /// can also empty it entirely, in which case it is dropped silently.
    pub remote: Option<Operation>,
    /// Why the remote operation was voided, when it was.
    pub remote_void: Option<VoidReason>,
    /// Local pending operations that lost and were removed.
    pub voided_local: Vec<ConflictVoid>,
    /// Local-only rollback payloads to apply before the remote operation.
    /// These never go on the wire; the other clients reject the losing
    /// operation on their own.
    pub repairs: Vec<OperationPayload>,
}

/// Transforms `remote` against the pending queue, mutating the queue.
///
/// Rules, in precedence order:
/// 1. a pending delete voids any remote operation depending on the
///    deleted node;
/// 2. a remote delete voids any pending operation depending on the
///    deleted node (the cascade rolls the optimistic state back);
/// 3. a remote connection on a port pair a pending connection also claims
///    wins: the channel is ordered, so had ours committed first its ack
///    would have arrived before this broadcast and emptied the queue;
/// 4. concurrent updates to one entity merge per field, later logical
///    timestamp winning each contested field.
pub fn transform_remote(mut remote: Operation, pending: &mut Vec<PendingLocal>) -> TransformResult {
    let mut result = TransformResult::default();

    // Rule 1: local deletes win over the incoming operation.
    let pending_deletes: Vec<NodeId> = pending
        .iter()
        .flat_map(|p| deleted_nodes(&p.operation.payload))
        .collect();
    if let Some(node_id) = pending_deletes
        .iter()
        .find(|n| remote.payload.references_node(**n))
    {
        result.remote_void = Some(VoidReason::NodeDeleted { node_id: *node_id });
        return result;
    }

    // Rule 2: a remote delete voids dependent pending operations.
    let remote_deletes = deleted_nodes(&remote.payload);
    if !remote_deletes.is_empty() {
        pending.retain(|p| {
            let doomed = remote_deletes
                .iter()
                .find(|n| p.operation.payload.references_node(**n));
            match doomed {
                Some(node_id) => {
                    result.voided_local.push(ConflictVoid {
                        operation_id: p.operation.id,
                        reason: VoidReason::NodeDeleted { node_id: *node_id },
                    });
                    false
                }
                None => true,
            }
        });
    }

    // Rule 3: port-pair first-wins in server order.
    if let OperationPayload::InsertConnection { connection } = &remote.payload {
        pending.retain(|p| {
            if let OperationPayload::InsertConnection { connection: local } = &p.operation.payload {
                if local.same_binding(connection) {
                    result.voided_local.push(ConflictVoid {
                        operation_id: p.operation.id,
                        reason: VoidReason::ConnectionSuperseded {
                            connection_id: local.id,
                        },
                    });
                    result.repairs.push(OperationPayload::DeleteConnection {
                        connection_id: local.id,
                    });
                    return false;
                }
            }
            true
        });
    }

    // Rule 4: per-field last-writer-wins.
    match &mut remote.payload {
        OperationPayload::UpdateNode { node_id, patch } => {
            for p in pending.iter_mut() {
                if let OperationPayload::UpdateNode {
                    node_id: local_node,
                    patch: local_patch,
                } = &mut p.operation.payload
                {
                    if local_node == node_id {
                        if p.operation.timestamp > remote.timestamp {
                            patch.remove_overlap_with(local_patch);
                        } else {
                            local_patch.remove_overlap_with(patch);
                        }
                    }
                }
            }
            if patch.is_empty() {
                // Every contested field lost; nothing left to apply.
                return result;
            }
        }
        OperationPayload::UpdateConnection {
            connection_id,
            patch,
        } => {
            for p in pending.iter_mut() {
                if let OperationPayload::UpdateConnection {
                    connection_id: local_conn,
                    patch: local_patch,
                } = &mut p.operation.payload
                {
                    if local_conn == connection_id {
                        if p.operation.timestamp > remote.timestamp {
                            patch.remove_overlap_with(local_patch);
                        } else {
                            local_patch.remove_overlap_with(patch);
                        }
                    }
                }
            }
            if patch.is_empty() {
                return result;
            }
        }
        _ => {}
    }

    result.remote = Some(remote);
    result
}

/// Node ids a payload deletes, batches included.
fn deleted_nodes(payload: &OperationPayload) -> Vec<NodeId> {
    match payload {
        OperationPayload::DeleteNode { node_id } => vec![*node_id],
        OperationPayload::Batch { operations } => {
            operations.iter().flat_map(deleted_nodes).collect()
        }
        _ => Vec::new(),
    }
}
