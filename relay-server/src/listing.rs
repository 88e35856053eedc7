//! The `/rooms` listing: a snapshot of every live room's matchmaking-
//! relevant metadata, grounded in the teacher's `enlist_handler` — same
//! "walk the registry, format one line per room" shape, JSON instead of
//! plain text since this is consumed by a game client rather than a human
//! watching logs.

use std::sync::Arc;

use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RoomListing {
    pub room_id: String,
    pub player_count: usize,
    pub phase: Option<protocol::Phase>,
    pub host_display_name: Option<String>,
    pub host_deck_preview: Vec<String>,
}

pub async fn list_rooms(state: &Arc<AppState>) -> Vec<RoomListing> {
    let rooms = state.rooms.lock().await;
    let mut listings = Vec::with_capacity(rooms.len());
    for handle in rooms.values() {
        let snapshot = handle.snapshot.read().await;
        listings.push(RoomListing {
            room_id: handle.room_id.clone(),
            player_count: snapshot.player_count,
            phase: snapshot.phase,
            host_display_name: snapshot.host_display_name.clone(),
            host_deck_preview: snapshot.host_deck_preview.clone(),
        });
    }
    listings
}
