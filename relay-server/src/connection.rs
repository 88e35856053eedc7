//! Per-connection send/receive tasks, spawned once the handshake settles.
//!
//! Shaped like the teacher's `processing_module`: a send task draining the
//! room's broadcast channel and a receive task decoding client frames, run
//! concurrently with `tokio::select!` so either side finishing tears down
//! the other.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::ClientMessage;
use tokio::sync::broadcast::error::RecvError;

use crate::handshake::HandshakeResult;
use crate::room_actor::RoomCommand;
use crate::state::AppState;

/// Runs both halves of a connection until one side closes, then cleans up
/// the room's membership for this session.
pub async fn handle_connection(
    sender: SplitSink<WebSocket, Message>,
    receiver: SplitStream<WebSocket>,
    handshake: HandshakeResult,
    state: Arc<AppState>,
) {
    let session_id = handshake.session_id.clone();
    let room = handshake.room;

    let broadcast_rx = room.broadcast_tx.subscribe();
    let send_session = session_id.clone();
    let mut send_task = tokio::spawn(async move { send_loop(sender, broadcast_rx, send_session).await });

    let command_tx = room.command_tx.clone();
    let recv_session = session_id.clone();
    let mut receive_task = tokio::spawn(async move { receive_loop(receiver, command_tx, recv_session).await });

    tokio::select! {
        _ = &mut send_task => { receive_task.abort(); }
        _ = &mut receive_task => { send_task.abort(); }
    }

    let _ = room.command_tx.send(RoomCommand::Leave { session_id: session_id.clone() }).await;

    let snapshot = room.snapshot.read().await;
    if snapshot.player_count == 0 {
        drop(snapshot);
        state.rooms.lock().await.remove(&room.room_id);
        tracing::info!(room_id = %room.room_id, "removed empty room");
    }
}

async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut broadcast_rx: tokio::sync::broadcast::Receiver<crate::state::Envelope>,
    session_id: String,
) {
    loop {
        match broadcast_rx.recv().await {
            Ok(envelope) => {
                if let Some(target) = &envelope.target {
                    if target != &session_id {
                        continue;
                    }
                }
                let Ok(bytes) = postcard::to_allocvec(&envelope.message) else {
                    tracing::error!("failed to encode outgoing message");
                    continue;
                };
                if sender.send(Message::Binary(bytes.into())).await.is_err() {
                    return;
                }
            }
            Err(RecvError::Closed) => return,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped_messages = skipped, "client lagging on room broadcast");
            }
        }
    }
}

async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    command_tx: tokio::sync::mpsc::Sender<RoomCommand>,
    session_id: String,
) {
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Binary(bytes)) => {
                let message: ClientMessage = match postcard::from_bytes(&bytes) {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::warn!(?err, "failed to decode client message");
                        continue;
                    }
                };
                if command_tx
                    .send(RoomCommand::Client { session_id: session_id.clone(), message })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
