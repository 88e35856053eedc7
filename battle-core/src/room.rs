//! Room state and orchestration: membership, readiness, countdown, command
//! validation, and the tick entry points the relay server's room actor
//! drives. The room exclusively owns its players and units; the combat
//! simulator in [`crate::combat`] only ever borrows them for the duration of
//! a call.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{Phase, PlayerSync, PlayerView, ServerMessage, Side, UnitView};

use crate::catalog::UnitCatalog;
use crate::combat;
use crate::errors::RoomError;
use crate::resource;
use crate::result::MatchResult;

pub const STAGE_LENGTH: f64 = 1200.0;
pub const MAX_DECK_SIZE: usize = 7;
pub const MAX_PLAYERS: usize = 2;
pub const DEFAULT_CASTLE_HP: i32 = 5000;

/// A live entity on the lane.
#[derive(Debug, Clone)]
pub struct Unit {
    pub instance_id: String,
    pub definition_id: String,
    pub side: Side,
    pub x: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub state: protocol::UnitState,
    pub state_timer_ms: f64,
    pub target_id: Option<String>,
    pub damage_accumulated: i32,
    pub width: f64,
    pub speed: f64,
    pub attack_damage: i32,
    pub attack_range: f64,
    pub attack_cooldown_ms: u32,
    pub attack_windup_ms: u32,
    pub knockback: f64,
    pub is_boss: bool,
}

impl Unit {
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    pub fn to_view(&self) -> UnitView {
        UnitView {
            instance_id: self.instance_id.clone(),
            definition_id: self.definition_id.clone(),
            side: self.side,
            x: self.x,
            hp: self.hp,
            max_hp: self.max_hp,
            state: self.state,
            state_timer_ms: self.state_timer_ms as u32,
            target_id: self.target_id.clone(),
        }
    }
}

/// A connected session's player state.
#[derive(Debug, Clone)]
pub struct Player {
    pub session_id: String,
    pub external_player_id: String,
    pub display_name: String,
    pub side: Side,
    pub cost: f64,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
    pub ready: bool,
    pub deck: Vec<String>,
    pub spawn_cooldowns: HashMap<String, f64>,
    pub kills: u32,
}

impl Player {
    pub fn new(session_id: String, external_player_id: String, display_name: String, side: Side) -> Self {
        let mut player = Player {
            session_id,
            external_player_id,
            display_name,
            side,
            cost: 0.0,
            max_cost: 0,
            cost_level: 1,
            castle_hp: DEFAULT_CASTLE_HP,
            max_castle_hp: DEFAULT_CASTLE_HP,
            ready: false,
            deck: Vec::new(),
            spawn_cooldowns: HashMap::new(),
            kills: 0,
        };
        resource::initialize(&mut player);
        player
    }

    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            session_id: self.session_id.clone(),
            external_player_id: self.external_player_id.clone(),
            display_name: self.display_name.clone(),
            side: self.side,
            cost: self.cost.floor() as u32,
            max_cost: self.max_cost,
            cost_level: self.cost_level,
            castle_hp: self.castle_hp,
            max_castle_hp: self.max_castle_hp,
            ready: self.ready,
            deck: self.deck.clone(),
        }
    }

    pub fn to_sync(&self) -> PlayerSync {
        PlayerSync {
            session_id: self.session_id.clone(),
            cost: self.cost.floor() as u32,
            max_cost: self.max_cost,
            cost_level: self.cost_level,
            castle_hp: self.castle_hp,
            max_castle_hp: self.max_castle_hp,
        }
    }
}

/// What a command or tick produced. The room never sends network traffic
/// itself — the relay server's room actor drains these after each call and
/// turns them into websocket frames.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Sent to every connected client.
    Broadcast(ServerMessage),
    /// Sent only to the named session — used for per-client errors.
    ToClient(String, ServerMessage),
    /// The match concluded; hand this to the result sink.
    ResultReady(MatchResult),
}

/// A game session: membership, readiness, countdown, and the live battle.
pub struct Room {
    pub phase: Phase,
    pub game_time_ms: f64,
    pub countdown: u8,
    pub stage_length: f64,
    pub(crate) session_order: Vec<String>,
    pub(crate) players: HashMap<String, Player>,
    pub(crate) units: HashMap<String, Unit>,
    pub(crate) unit_order: Vec<String>,
    pub winner_id: Option<String>,
    pub win_reason: Option<String>,
    pub(crate) catalog: Arc<UnitCatalog>,
    pub(crate) next_instance_id: u64,
}

impl Room {
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        Self::with_config(catalog, STAGE_LENGTH, 3)
    }

    /// Like [`Room::new`], but with the lane length and starting countdown
    /// taken from the server's hot-reloadable config instead of the
    /// defaults.
    pub fn with_config(catalog: Arc<UnitCatalog>, stage_length: f64, countdown_start: u8) -> Self {
        Room {
            phase: Phase::Waiting,
            game_time_ms: 0.0,
            countdown: countdown_start,
            stage_length,
            session_order: Vec::new(),
            players: HashMap::new(),
            units: HashMap::new(),
            unit_order: Vec::new(),
            winner_id: None,
            win_reason: None,
            catalog,
            next_instance_id: 0,
        }
    }

    pub fn player_count(&self) -> usize {
        self.session_order.len()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= MAX_PLAYERS
    }

    /// The first joiner's display name, for listing metadata.
    pub fn host_display_name(&self) -> Option<&str> {
        self.session_order
            .first()
            .and_then(|id| self.players.get(id))
            .map(|p| p.display_name.as_str())
    }

    /// First `ceil(len/2)` ids of the first joiner's deck, per the listing
    /// spec — enough to hint at the matchup without revealing the full deck.
    pub fn host_deck_preview(&self) -> Vec<String> {
        let Some(host_id) = self.session_order.first() else {
            return Vec::new();
        };
        let Some(player) = self.players.get(host_id) else {
            return Vec::new();
        };
        let preview_len = player.deck.len().div_ceil(2);
        player.deck[..preview_len].to_vec()
    }

    fn side_for_new_player(&self) -> Side {
        if self.session_order.is_empty() {
            Side::Player1
        } else {
            Side::Player2
        }
    }

    fn opposite(side: Side) -> Side {
        match side {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    pub(crate) fn player_by_side(&self, side: Side) -> Option<&Player> {
        self.players.values().find(|p| p.side == side)
    }

    pub(crate) fn player_by_side_mut(&mut self, side: Side) -> Option<&mut Player> {
        self.players.values_mut().find(|p| p.side == side)
    }

    pub(crate) fn fresh_instance_id(&mut self) -> String {
        self.next_instance_id += 1;
        format!("u{}", self.next_instance_id)
    }

    // ---- Commands -------------------------------------------------------

    /// Validates and admits a new player. Rejections (room full, wrong
    /// phase) are not protocol error codes — they are handshake-level
    /// refusals the caller should turn into a closed connection, mirroring
    /// how an over-capacity or nonexistent room is rejected before the
    /// websocket upgrade settles.
    pub fn join(
        &mut self,
        session_id: String,
        external_player_id: String,
        display_name: String,
        requested_deck: Vec<String>,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if self.is_full() || self.phase != Phase::Waiting {
            return Err(RoomError::GameNotPlaying);
        }

        let side = self.side_for_new_player();
        let deck: Vec<String> = requested_deck
            .into_iter()
            .filter(|id| self.catalog.is_valid(id))
            .take(MAX_DECK_SIZE)
            .collect();

        let mut player = Player::new(session_id.clone(), external_player_id, display_name, side);
        player.deck = deck;

        self.session_order.push(session_id.clone());
        self.players.insert(session_id.clone(), player);

        let mut events = vec![RoomEvent::Broadcast(ServerMessage::PlayerJoined(
            self.players[&session_id].to_view(),
        ))];
        events.push(RoomEvent::Broadcast(ServerMessage::AllPlayers {
            players: self.session_order.iter().map(|id| self.players[id].to_view()).collect(),
        }));
        Ok(events)
    }

    /// Marks a player ready. Repeated calls are idempotent. Starts the
    /// countdown once both seats are filled and ready.
    pub fn ready(&mut self, session_id: &str) -> Vec<RoomEvent> {
        let Some(player) = self.players.get_mut(session_id) else {
            return Vec::new();
        };
        player.ready = true;

        if self.phase == Phase::Waiting
            && self.player_count() == MAX_PLAYERS
            && self.players.values().all(|p| p.ready)
        {
            self.phase = Phase::Countdown;
            self.countdown = 3;
            return vec![RoomEvent::Broadcast(ServerMessage::PhaseChange {
                phase: Phase::Countdown,
                winner_id: None,
                win_reason: None,
            })];
        }
        Vec::new()
    }

    /// Advances the independent 1 Hz countdown timer.
    pub fn countdown_tick(&mut self) -> Vec<RoomEvent> {
        if self.phase != Phase::Countdown {
            return Vec::new();
        }
        if self.countdown == 0 {
            self.phase = Phase::Playing;
            self.game_time_ms = 0.0;
            return vec![RoomEvent::Broadcast(ServerMessage::PhaseChange {
                phase: Phase::Playing,
                winner_id: None,
                win_reason: None,
            })];
        }
        let events = vec![RoomEvent::Broadcast(ServerMessage::CountdownUpdate {
            countdown: self.countdown,
        })];
        self.countdown -= 1;
        events
    }

    /// Validates and applies a summon command.
    pub fn summon(&mut self, session_id: &str, unit_id: &str) -> Result<Vec<RoomEvent>, RoomError> {
        if self.phase != Phase::Playing {
            return Err(RoomError::GameNotPlaying);
        }
        let Some(definition) = self.catalog.lookup(unit_id) else {
            return Err(RoomError::InvalidUnit);
        };
        let definition = definition.clone();

        let player = self.players.get(session_id).ok_or(RoomError::GameNotPlaying)?;
        if !player.deck.iter().any(|id| id == unit_id) {
            return Err(RoomError::UnitNotInDeck);
        }
        if player.spawn_cooldowns.get(unit_id).copied().unwrap_or(0.0) > 0.0 {
            return Err(RoomError::Cooldown);
        }
        if !resource::can_afford(player, definition.cost) {
            return Err(RoomError::InsufficientCost);
        }

        let player = self.players.get_mut(session_id).unwrap();
        resource::spend(player, definition.cost);

        match combat::spawn_unit(self, session_id, unit_id) {
            Ok(instance_id) => {
                let player = self.players.get_mut(session_id).unwrap();
                player
                    .spawn_cooldowns
                    .insert(unit_id.to_string(), definition.effective_spawn_cooldown_ms() as f64);
                let view = self.units[&instance_id].to_view();
                Ok(vec![RoomEvent::Broadcast(ServerMessage::UnitSpawned(view))])
            }
            Err(e) => {
                // Policy decision (spec open question 1): refund on a
                // post-spend spawn failure.
                let player = self.players.get_mut(session_id).unwrap();
                resource::refund(player, definition.cost);
                Err(e)
            }
        }
    }

    pub fn upgrade_cost(&mut self, session_id: &str) -> Result<Vec<RoomEvent>, RoomError> {
        if self.phase != Phase::Playing {
            return Err(RoomError::GameNotPlaying);
        }
        let player = self.players.get_mut(session_id).ok_or(RoomError::GameNotPlaying)?;
        if !resource::upgrade(player) {
            return Err(RoomError::CannotUpgrade);
        }
        Ok(Vec::new())
    }

    /// Handles a disconnect. If the match was in progress, the remaining
    /// player wins immediately; the departing player is always removed.
    pub fn leave(&mut self, session_id: &str) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        if matches!(self.phase, Phase::Countdown | Phase::Playing) {
            if let Some(winner) = self
                .players
                .keys()
                .find(|id| id.as_str() != session_id)
                .cloned()
            {
                self.phase = Phase::Finished;
                self.winner_id = Some(winner.clone());
                self.win_reason = Some("opponent_disconnected".to_string());
                events.push(RoomEvent::Broadcast(ServerMessage::PhaseChange {
                    phase: Phase::Finished,
                    winner_id: Some(winner),
                    win_reason: Some("opponent_disconnected".to_string()),
                }));
                events.push(RoomEvent::ResultReady(self.build_result()));
            }
        }
        self.players.remove(session_id);
        self.session_order.retain(|id| id != session_id);
        events
    }

    /// Advances the simulation by `delta_ms`. Only meaningful in the
    /// `playing` phase; a no-op otherwise.
    pub fn tick(&mut self, delta_ms: f64) -> Vec<RoomEvent> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        self.game_time_ms += delta_ms;

        for player in self.players.values_mut() {
            resource::update(player, delta_ms);
            for remaining in player.spawn_cooldowns.values_mut() {
                *remaining = (*remaining - delta_ms).max(0.0);
            }
        }

        let _combat_events = combat::update(self, delta_ms);

        let mut events = vec![
            RoomEvent::Broadcast(ServerMessage::UnitsSync {
                units: self.unit_order.iter().filter_map(|id| self.units.get(id)).map(Unit::to_view).collect(),
            }),
            RoomEvent::Broadcast(ServerMessage::PlayersSync {
                players: self.session_order.iter().filter_map(|id| self.players.get(id)).map(Player::to_sync).collect(),
            }),
        ];

        if self.phase == Phase::Finished {
            events.push(RoomEvent::Broadcast(ServerMessage::PhaseChange {
                phase: Phase::Finished,
                winner_id: self.winner_id.clone(),
                win_reason: self.win_reason.clone(),
            }));
            events.push(RoomEvent::ResultReady(self.build_result()));
        }

        events
    }

    fn build_result(&self) -> MatchResult {
        let p1 = self.player_by_side(Side::Player1);
        let p2 = self.player_by_side(Side::Player2);
        let winner_num = match (&self.winner_id, p1, p2) {
            (Some(winner), Some(player1), _) if &player1.session_id == winner => 1,
            _ => 2,
        };
        MatchResult {
            player1_id: p1.map(|p| p.external_player_id.clone()).unwrap_or_default(),
            player2_id: p2.map(|p| p.external_player_id.clone()).unwrap_or_default(),
            player1_name: p1.map(|p| p.display_name.clone()).unwrap_or_default(),
            player2_name: p2.map(|p| p.display_name.clone()).unwrap_or_default(),
            player1_deck: p1.map(|p| p.deck.clone()).unwrap_or_default(),
            player2_deck: p2.map(|p| p.deck.clone()).unwrap_or_default(),
            winner_player_num: winner_num,
            player1_castle_hp: p1.map(|p| p.castle_hp).unwrap_or_default(),
            player2_castle_hp: p2.map(|p| p.castle_hp).unwrap_or_default(),
            player1_kills: p1.map(|p| p.kills).unwrap_or_default(),
            player2_kills: p2.map(|p| p.kills).unwrap_or_default(),
            battle_duration: (self.game_time_ms / 1000.0).floor() as u64,
            win_reason: self.win_reason.clone().unwrap_or_default(),
        }
    }
}

#[allow(dead_code)]
pub(crate) fn opposite_side(side: Side) -> Side {
    Room::opposite(side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitCatalog;

    fn test_room() -> Room {
        Room::new(Arc::new(UnitCatalog::default_catalog()))
    }

    fn join(room: &mut Room, session: &str, deck: &[&str]) {
        room.join(
            session.to_string(),
            String::new(),
            session.to_string(),
            deck.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
    }

    #[test]
    fn first_and_second_join_get_opposite_sides() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        assert_eq!(room.players["a"].side, Side::Player1);
        assert_eq!(room.players["b"].side, Side::Player2);
    }

    #[test]
    fn third_join_is_rejected() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        let result = room.join("c".into(), String::new(), "c".into(), vec![]);
        assert_eq!(result.unwrap_err(), RoomError::GameNotPlaying);
    }

    #[test]
    fn deck_is_filtered_and_capped() {
        let mut room = test_room();
        let deck: Vec<String> = vec!["footman", "ghost", "archer", "knight", "catapult", "giant", "dragon", "unitA"]
            .into_iter()
            .map(String::from)
            .collect();
        room.join("a".into(), String::new(), "a".into(), deck).unwrap();
        assert_eq!(room.players["a"].deck.len(), MAX_DECK_SIZE);
        assert!(!room.players["a"].deck.iter().any(|id| id == "ghost"));
    }

    #[test]
    fn ready_is_idempotent_and_starts_countdown_at_two() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        assert!(room.ready("a").is_empty());
        assert!(room.ready("a").is_empty()); // second ready from same player, still no-op
        let events = room.ready("b");
        assert_eq!(room.phase, Phase::Countdown);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn countdown_emits_three_two_one_then_playing() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        room.ready("a");
        room.ready("b");
        assert_eq!(room.phase, Phase::Countdown);

        let mut countdown_updates = Vec::new();
        for _ in 0..3 {
            let events = room.countdown_tick();
            for event in events {
                if let RoomEvent::Broadcast(ServerMessage::CountdownUpdate { countdown }) = event {
                    countdown_updates.push(countdown);
                }
            }
        }
        assert_eq!(countdown_updates, vec![3, 2, 1]);
        assert_eq!(room.phase, Phase::Countdown);

        let events = room.countdown_tick();
        assert_eq!(room.phase, Phase::Playing);
        assert!(events.iter().any(|e| matches!(
            e,
            RoomEvent::Broadcast(ServerMessage::PhaseChange { phase: Phase::Playing, .. })
        )));
    }

    #[test]
    fn disconnect_during_countdown_ends_match_immediately() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        room.ready("a");
        room.ready("b");
        assert_eq!(room.phase, Phase::Countdown);

        let events = room.leave("a");
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.winner_id.as_deref(), Some("b"));
        assert_eq!(room.win_reason.as_deref(), Some("opponent_disconnected"));
        assert!(events.iter().any(|e| matches!(e, RoomEvent::ResultReady(_))));
    }

    #[test]
    fn summon_outside_playing_phase_is_rejected() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        let result = room.summon("a", "footman");
        assert_eq!(result.unwrap_err(), RoomError::GameNotPlaying);
    }

    #[test]
    fn summon_unknown_unit_not_in_deck_then_cooldown() {
        let mut room = test_room();
        join(&mut room, "a", &["footman"]);
        join(&mut room, "b", &["footman"]);
        room.ready("a");
        room.ready("b");
        room.countdown_tick();
        room.countdown_tick();
        room.countdown_tick();
        room.countdown_tick();
        assert_eq!(room.phase, Phase::Playing);

        assert_eq!(room.summon("a", "ghost").unwrap_err(), RoomError::InvalidUnit);
        assert_eq!(room.summon("a", "archer").unwrap_err(), RoomError::UnitNotInDeck);

        let before_cost = room.players["a"].cost;
        assert!(room.summon("a", "footman").is_ok());
        assert!(room.players["a"].cost < before_cost);
        assert_eq!(room.summon("a", "footman").unwrap_err(), RoomError::Cooldown);
    }
}
