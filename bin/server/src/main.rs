//! Relay server for collaborative documents.
//!
//! The relay is deliberately simple: it assigns a total order to
//! operations per document, acknowledges them to their senders, and fans
//! them out to everyone else. It never inspects or transforms operation
//! contents. All conflict resolution happens on the clients.

mod config;
mod room;
mod ws;

use crate::config::ServerConfig;
use crate::room::RoomManager;
use crate::ws::{ws_handler, AppState};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(listen_addr = %config.listen_addr, "starting relay");

    let state = Arc::new(AppState {
        rooms: RoomManager::new(config.room),
    });
    let app = Router::new()
        .route("/ws/{document_id}", get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    tracing::info!("shutting down");
}
