//! Wire types for the castle-rush battle server.
//!
//! Every message that crosses the websocket boundary is defined here and
//! serialized with `postcard` on both sides, keeping client and server
//! message layouts in lock step. Unlike a pure relay, this server is
//! authoritative and interprets every message itself, so payloads are
//! carried as typed enums end to end instead of opaque tagged bytes.

use serde::{Deserialize, Serialize};

/// The buffer size for the internal per-room broadcast/command channels.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The first message a client must send after the websocket upgrade.
/// Carries the join options described in the room orchestrator's contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JoinRequest {
    /// Opaque id used for result persistence. Empty if the caller has none.
    #[serde(default)]
    pub external_player_id: String,
    /// Display name shown to the opponent. Empty is allowed.
    #[serde(default)]
    pub display_name: String,
    /// Requested deck. Unknown ids are dropped and the list is capped at 7
    /// by the room on join; this struct carries the raw, unvalidated request.
    #[serde(default)]
    pub deck: Vec<String>,
}

/// Sent by the server right after a successful join, before any other
/// traffic. Lets the client learn its own session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub session_id: String,
}

/// Commands a client may send once joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    Ready,
    Summon { unit_id: String },
    UpgradeCost,
}

/// A player's side on the lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Player1,
    Player2,
}

/// The room lifecycle phase. Monotonically advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

/// A unit's combat state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Spawn,
    Walk,
    AttackWindup,
    AttackCooldown,
    Hitstun,
    Die,
}

/// Replicated per-player view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub session_id: String,
    pub external_player_id: String,
    pub display_name: String,
    pub side: Side,
    pub cost: u32,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
    pub ready: bool,
    pub deck: Vec<String>,
}

/// Replicated unit view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitView {
    pub instance_id: String,
    pub definition_id: String,
    pub side: Side,
    pub x: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub state: UnitState,
    pub state_timer_ms: u32,
    pub target_id: Option<String>,
}

/// Per-tick resource/hp sync entry for `players_sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSync {
    pub session_id: String,
    pub cost: u32,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
}

/// Broadcasts and targeted replies the server sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    PlayerJoined(PlayerView),
    AllPlayers {
        players: Vec<PlayerView>,
    },
    UnitSpawned(UnitView),
    UnitsSync {
        units: Vec<UnitView>,
    },
    PlayersSync {
        players: Vec<PlayerSync>,
    },
    PhaseChange {
        phase: Phase,
        winner_id: Option<String>,
        win_reason: Option<String>,
    },
    CountdownUpdate {
        countdown: u8,
    },
    Error {
        code: String,
        message: String,
    },
}
