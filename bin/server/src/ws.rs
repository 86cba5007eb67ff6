//! WebSocket endpoint.

use crate::room::RoomManager;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use flowloom_collab::WireMessage;
use flowloom_core::DocumentId;
use futures::{SinkExt as _, StreamExt as _};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared application state.
pub struct AppState {
    /// Live rooms.
    pub rooms: RoomManager,
}

/// `GET /ws/{document_id}`: upgrades and attaches the connection to the
/// document's room.
pub async fn ws_handler(
    Path(document_id): Path<DocumentId>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, document_id, state))
}

async fn handle_socket(socket: WebSocket, document_id: DocumentId, state: Arc<AppState>) {
    let room = state.rooms.room(document_id).await;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireMessage>();
    let member = room.join(outbound_tx).await;
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = outbound_rx.recv() => {
                let Some(message) = queued else { break };
                let encoded = match message.encode() {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        tracing::error!(%err, "failed to encode outbound message");
                        continue;
                    }
                };
                if sink.send(Message::Text(encoded.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(raw))) => {
                        match WireMessage::decode(raw.as_str()) {
                            Ok(message) => room.handle(member, message).await,
                            Err(err) => {
                                tracing::warn!(%err, "dropping malformed message");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary: ignored
                    Some(Err(err)) => {
                        tracing::debug!(%err, "websocket read failed");
                        break;
                    }
                }
            }
        }
    }

    room.leave(member).await;
    state.rooms.retire_if_empty(document_id).await;
}
