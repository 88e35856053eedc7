//! One tokio task per room, owning a [`battle_core::Room`] exclusively.
//!
//! Mirrors the teacher's per-room channel pair (`to_host_sender` /
//! `host_to_client_broadcaster`) but instead of forwarding opaque bytes to a
//! host process, this task *is* the host: it drives the simulation directly
//! and fans out the resulting [`protocol::ServerMessage`]s.

use std::sync::Arc;
use std::time::Instant;

use battle_core::{MatchResult, Room, RoomError, RoomEvent, UnitCatalog};
use protocol::ClientMessage;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use crate::config::ServerConfig;
use crate::result_sink::ResultSinkHandle;
use crate::state::{Envelope, RoomSnapshot};

const TICK_HZ: u64 = 20;
const COUNTDOWN_HZ: u64 = 1;

/// A command sent into a room's actor task.
pub enum RoomCommand {
    Join {
        session_id: String,
        external_player_id: String,
        display_name: String,
        deck: Vec<String>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Client {
        session_id: String,
        message: ClientMessage,
    },
    Leave {
        session_id: String,
    },
}

pub struct SpawnedRoom {
    pub command_tx: mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<Envelope>,
    pub snapshot: Arc<RwLock<RoomSnapshot>>,
}

/// Spawns the actor task for a brand new room and returns the handles the
/// rest of the server uses to talk to it.
pub fn spawn_room(catalog: Arc<UnitCatalog>, config: ServerConfig, result_sink: ResultSinkHandle) -> SpawnedRoom {
    let (command_tx, command_rx) = mpsc::channel(protocol::CHANNEL_BUFFER_SIZE);
    let (broadcast_tx, _) = broadcast::channel(protocol::CHANNEL_BUFFER_SIZE);
    let snapshot = Arc::new(RwLock::new(RoomSnapshot::default()));

    let task_broadcast = broadcast_tx.clone();
    let task_snapshot = snapshot.clone();
    let room = Room::with_config(catalog, config.stage_length, config.countdown_start);
    tokio::spawn(async move {
        run_room(room, command_rx, task_broadcast, task_snapshot, result_sink).await;
    });

    SpawnedRoom { command_tx, broadcast_tx, snapshot }
}

async fn run_room(
    mut room: Room,
    mut command_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<Envelope>,
    snapshot: Arc<RwLock<RoomSnapshot>>,
    result_sink: ResultSinkHandle,
) {
    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(1000 / TICK_HZ));
    let mut countdown_interval = tokio::time::interval(std::time::Duration::from_secs(1) / COUNTDOWN_HZ as u32);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                let events = apply_command(&mut room, command);
                dispatch(&broadcast_tx, &result_sink, events).await;
                update_snapshot(&room, &snapshot).await;
            }
            _ = tick_interval.tick() => {
                let now = Instant::now();
                let delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                last_tick = now;
                let events = room.tick(delta_ms);
                let finished = room.phase == protocol::Phase::Finished;
                dispatch(&broadcast_tx, &result_sink, events).await;
                update_snapshot(&room, &snapshot).await;
                if finished && room.player_count() == 0 {
                    break;
                }
            }
            _ = countdown_interval.tick() => {
                let events = room.countdown_tick();
                dispatch(&broadcast_tx, &result_sink, events).await;
                update_snapshot(&room, &snapshot).await;
            }
        }

        if broadcast_tx.receiver_count() == 0 && room.player_count() == 0 && room.phase != protocol::Phase::Waiting {
            break;
        }
    }
}

fn apply_command(room: &mut Room, command: RoomCommand) -> Vec<RoomEvent> {
    match command {
        RoomCommand::Join { session_id, external_player_id, display_name, deck, reply } => {
            match room.join(session_id, external_player_id, display_name, deck) {
                Ok(events) => {
                    let _ = reply.send(Ok(()));
                    events
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                    Vec::new()
                }
            }
        }
        RoomCommand::Client { session_id, message } => match message {
            ClientMessage::Ready => room.ready(&session_id),
            ClientMessage::Summon { unit_id } => match room.summon(&session_id, &unit_id) {
                Ok(events) => events,
                Err(err) => vec![RoomEvent::ToClient(
                    session_id,
                    protocol::ServerMessage::Error { code: err.code().to_string(), message: err.to_string() },
                )],
            },
            ClientMessage::UpgradeCost => match room.upgrade_cost(&session_id) {
                Ok(events) => events,
                Err(err) => vec![RoomEvent::ToClient(
                    session_id,
                    protocol::ServerMessage::Error { code: err.code().to_string(), message: err.to_string() },
                )],
            },
        },
        RoomCommand::Leave { session_id } => room.leave(&session_id),
    }
}

async fn dispatch(broadcast_tx: &broadcast::Sender<Envelope>, result_sink: &ResultSinkHandle, events: Vec<RoomEvent>) {
    for event in events {
        match event {
            RoomEvent::Broadcast(message) => {
                let _ = broadcast_tx.send(Envelope { target: None, message });
            }
            RoomEvent::ToClient(session_id, message) => {
                let _ = broadcast_tx.send(Envelope { target: Some(session_id), message });
            }
            RoomEvent::ResultReady(result) => {
                record_result(result_sink, result).await;
            }
        }
    }
}

async fn record_result(result_sink: &ResultSinkHandle, result: MatchResult) {
    result_sink.record(result).await;
}

async fn update_snapshot(room: &Room, snapshot: &Arc<RwLock<RoomSnapshot>>) {
    let mut guard = snapshot.write().await;
    guard.player_count = room.player_count();
    guard.phase = Some(room.phase);
    guard.host_display_name = room.host_display_name().map(str::to_string);
    guard.host_deck_preview = room.host_deck_preview();
}
