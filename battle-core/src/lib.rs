//! Pure game-simulation library for the castle-rush battle server.
//!
//! Nothing in this crate touches a socket or a clock wall-time source: every
//! entry point takes an explicit `Duration`/millisecond delta and returns
//! data, leaving I/O to the relay server that hosts it.

pub mod catalog;
pub mod combat;
pub mod errors;
pub mod resource;
pub mod result;
pub mod room;

pub use catalog::{UnitCatalog, UnitDefinition};
pub use errors::RoomError;
pub use result::{MatchResult, ResultSink};
pub use room::{Player, Room, RoomEvent, Unit};
