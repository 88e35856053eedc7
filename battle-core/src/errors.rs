//! Client-facing error taxonomy.
//!
//! Every variant corresponds to one protocol error code. These never unwind
//! across a room boundary — command handlers return `Result<(), RoomError>`
//! and the orchestrator turns a rejection straight into a targeted
//! `ServerMessage::Error`, it is never broadcast and it never changes room
//! state (spec section 7).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    GameNotPlaying,
    InvalidUnit,
    UnitNotInDeck,
    Cooldown,
    InsufficientCost,
    SpawnFailed,
    CannotUpgrade,
}

impl RoomError {
    /// The wire error code, stable across releases.
    pub fn code(self) -> &'static str {
        match self {
            RoomError::GameNotPlaying => "GAME_NOT_PLAYING",
            RoomError::InvalidUnit => "INVALID_UNIT",
            RoomError::UnitNotInDeck => "UNIT_NOT_IN_DECK",
            RoomError::Cooldown => "COOLDOWN",
            RoomError::InsufficientCost => "INSUFFICIENT_COST",
            RoomError::SpawnFailed => "SPAWN_FAILED",
            RoomError::CannotUpgrade => "CANNOT_UPGRADE",
        }
    }
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RoomError::GameNotPlaying => "The room is not currently playing.",
            RoomError::InvalidUnit => "Unknown unit id.",
            RoomError::UnitNotInDeck => "That unit is not in your deck.",
            RoomError::Cooldown => "That unit is still on cooldown.",
            RoomError::InsufficientCost => "Not enough resource to summon that unit.",
            RoomError::SpawnFailed => "Failed to spawn the unit.",
            RoomError::CannotUpgrade => "Cannot upgrade cost level right now.",
        };
        f.write_str(message)
    }
}

impl std::error::Error for RoomError {}
