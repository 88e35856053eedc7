//! Process-wide state: the registry of live rooms and the embedded unit
//! catalog they all share read-only, plus matchmaking of new joiners into
//! an open room.
//!
//! Shaped the same way as the teacher's `AppState` (a `Mutex`-guarded
//! `HashMap` of rooms) except rooms here run real simulation tasks instead
//! of forwarding bytes to a host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use battle_core::UnitCatalog;
use protocol::ServerMessage;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

use crate::config::ServerConfig;
use crate::room_actor::RoomCommand;

/// One in-process delivery target: `None` means every subscriber, `Some(id)`
/// restricts delivery to that session — used for targeted error replies
/// without giving every room a per-client unicast channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub target: Option<String>,
    pub message: ServerMessage,
}

/// Everything the rest of the server needs to talk to one running room.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    pub command_tx: mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<Envelope>,
    pub snapshot: Arc<RwLock<RoomSnapshot>>,
}

/// A cheap, frequently-updated read model for the `/rooms` listing —
/// avoids round-tripping into the room actor just to list it.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub player_count: usize,
    pub phase: Option<protocol::Phase>,
    pub host_display_name: Option<String>,
    pub host_deck_preview: Vec<String>,
}

pub struct AppState {
    pub catalog: Arc<UnitCatalog>,
    pub rooms: Mutex<HashMap<String, RoomHandle>>,
    /// The room currently accepting a second player, if any.
    pub waiting_room: Mutex<Option<String>>,
    pub config: RwLock<ServerConfig>,
    next_room_id: AtomicU64,
}

impl AppState {
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        AppState {
            catalog,
            rooms: Mutex::new(HashMap::new()),
            waiting_room: Mutex::new(None),
            config: RwLock::new(ServerConfig::default()),
            next_room_id: AtomicU64::new(1),
        }
    }

    pub fn fresh_room_id(&self) -> String {
        format!("room-{}", self.next_room_id.fetch_add(1, Ordering::Relaxed))
    }
}
