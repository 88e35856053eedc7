//! Router construction split out from `main` so integration tests can spin
//! up the same app the binary serves, against an ephemeral port.

pub mod config;
pub mod connection;
pub mod handshake;
pub mod listing;
pub mod result_sink;
pub mod room_actor;
pub mod state;

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::StreamExt;
use tower_http::cors::CorsLayer;

use crate::config::reload_config;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/reload", get(reload_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Fallback cleanup for rooms whose actor task panicked or otherwise exited
/// without deregistering itself; normal teardown happens in
/// `connection::handle_connection` instead.
pub async fn cleanup_dead_rooms(state: &Arc<AppState>) {
    let mut rooms = state.rooms.lock().await;
    rooms.retain(|room_id, room| {
        let is_alive = !room.command_tx.is_closed();
        if !is_alive {
            tracing::info!(room_id, "removing dead room");
        }
        is_alive
    });
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn rooms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(listing::list_rooms(&state).await)
}

/// Re-reads `ServerConfig.json` without restarting the process, the same
/// operational affordance as the teacher's game-list reload.
async fn reload_handler(State(state): State<Arc<AppState>>) -> String {
    match reload_config(&state).await {
        Ok(config) => format!(
            "Reloaded: stage_length={} countdown_start={}",
            config.stage_length, config.countdown_start
        ),
        Err(e) => format!("Config reload failed: {e}"),
    }
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// Handshake, then hand off to the send/receive tasks until the connection
/// closes.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = stream.split();

    let Some(handshake_result) = handshake::init_and_connect(&mut sender, &mut receiver, state.clone()).await else {
        return;
    };

    connection::handle_connection(sender, receiver, handshake_result, state).await;
}
