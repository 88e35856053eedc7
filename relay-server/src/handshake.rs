//! The join handshake: read the client's [`JoinRequest`], matchmake it into
//! a room, and hand back a [`HandshakeResponse`].
//!
//! Follows the teacher's `hand_shake.rs` shape — read the first binary
//! frame, decode it, reject with a closing message on anything malformed —
//! adapted from "open or join a named room" to simple two-player
//! matchmaking, since this server always plays exactly one game.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{HandshakeResponse, JoinRequest};
use rand::Rng;
use tokio::sync::oneshot;

use crate::room_actor::{spawn_room, RoomCommand};
use crate::result_sink::ResultSinkHandle;
use crate::state::{AppState, RoomHandle};

/// The outcome of a successful handshake: enough to run the per-connection
/// send/receive tasks.
pub struct HandshakeResult {
    pub session_id: String,
    pub room: RoomHandle,
}

/// Transport- and matchmaking-level failures surfaced as a closing message
/// rather than a protocol error code — the connection never reached a room
/// that could report one of those.
#[derive(Debug, thiserror::Error)]
enum MatchmakeError {
    #[error("the room closed before matchmaking finished")]
    RoomClosed,
    #[error("{0}")]
    Rejected(#[from] battle_core::RoomError),
}

async fn send_closing_message(sender: &mut SplitSink<WebSocket, Message>, reason: &str) {
    let response = protocol::ServerMessage::Error { code: "HANDSHAKE_FAILED".to_string(), message: reason.to_string() };
    if let Ok(bytes) = postcard::to_allocvec(&response) {
        let _ = sender.send(Message::Binary(bytes.into())).await;
    }
    let _ = sender.send(Message::Close(None)).await;
}

fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: u64 = rng.gen();
    format!("session-{suffix:016x}")
}

/// Reads the join request, matchmakes the connection into a room, and sends
/// back the handshake response. Returns `None` if the handshake failed —
/// the caller should simply drop the connection in that case.
pub async fn init_and_connect(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    state: Arc<AppState>,
) -> Option<HandshakeResult> {
    let raw = loop {
        match receiver.next().await {
            None => {
                tracing::warn!("connection closed before handshake completed");
                return None;
            }
            Some(Err(err)) => {
                tracing::error!(?err, "transport error during handshake");
                return None;
            }
            Some(Ok(Message::Binary(data))) => break data,
            Some(Ok(_)) => continue,
        }
    };

    let join_request: JoinRequest = match postcard::from_bytes(&raw) {
        Ok(req) => req,
        Err(err) => {
            tracing::error!(?err, "failed to parse join request");
            send_closing_message(sender, "Failed to parse join request.").await;
            return None;
        }
    };

    let session_id = generate_session_id();
    let room = match matchmake(&state, &session_id, join_request).await {
        Ok(room) => room,
        Err(reason) => {
            send_closing_message(sender, &reason.to_string()).await;
            return None;
        }
    };

    let response = HandshakeResponse { session_id: session_id.clone() };
    let Ok(bytes) = postcard::to_allocvec(&response) else {
        send_closing_message(sender, "Failed to encode handshake response.").await;
        return None;
    };
    if sender.send(Message::Binary(bytes.into())).await.is_err() {
        return None;
    }

    Some(HandshakeResult { session_id, room })
}

/// Joins the currently open room if one exists and has space, else opens a
/// fresh one and marks it as waiting for a second player.
async fn matchmake(state: &Arc<AppState>, session_id: &str, request: JoinRequest) -> Result<RoomHandle, MatchmakeError> {
    let mut waiting = state.waiting_room.lock().await;

    let room_handle = if let Some(room_id) = waiting.clone() {
        let rooms = state.rooms.lock().await;
        rooms.get(&room_id).cloned()
    } else {
        None
    };

    let room_handle = match room_handle {
        Some(handle) => handle,
        None => {
            let room_id = state.fresh_room_id();
            let config = state.config.read().await.clone();
            let spawned = spawn_room(state.catalog.clone(), config, ResultSinkHandle::logging());
            let handle = RoomHandle {
                room_id: room_id.clone(),
                command_tx: spawned.command_tx,
                broadcast_tx: spawned.broadcast_tx,
                snapshot: spawned.snapshot,
            };
            state.rooms.lock().await.insert(room_id.clone(), handle.clone());
            *waiting = Some(room_id);
            handle
        }
    };
    drop(waiting);

    let (reply_tx, reply_rx) = oneshot::channel();
    room_handle
        .command_tx
        .send(RoomCommand::Join {
            session_id: session_id.to_string(),
            external_player_id: request.external_player_id,
            display_name: request.display_name,
            deck: request.deck,
            reply: reply_tx,
        })
        .await
        .map_err(|_| MatchmakeError::RoomClosed)?;

    match reply_rx.await {
        Ok(Ok(())) => {
            let snapshot = room_handle.snapshot.read().await;
            if snapshot.player_count >= battle_core::room::MAX_PLAYERS {
                drop(snapshot);
                let mut waiting = state.waiting_room.lock().await;
                if waiting.as_deref() == Some(room_handle.room_id.as_str()) {
                    *waiting = None;
                }
            }
            Ok(room_handle)
        }
        Ok(Err(err)) => Err(MatchmakeError::Rejected(err)),
        Err(_) => Err(MatchmakeError::RoomClosed),
    }
}
