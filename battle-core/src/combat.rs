//! The combat simulator: a pure function of `(room, Δt)`.
//!
//! Every entry point here borrows a [`Room`] for the duration of one call and
//! leaves it owning the result — nothing in this module holds a clock, a
//! socket, or any state of its own. The one recurring trick is processing a
//! unit by removing it from `room.units` first: that gives a function
//! mutable access to every *other* unit (for damage, knockback, death) while
//! still holding the acting unit by value, without fighting the borrow
//! checker over two live mutable references into the same map.

use protocol::{Phase, Side, UnitState};

use crate::room::{Room, Unit};

const MIN_SAME_SIDE_GAP: f64 = 30.0;
const SPAWN_TO_WALK_MS: f64 = 300.0;
const HITSTUN_MS: f64 = 200.0;
const DEATH_LINGER_MS: f64 = 500.0;
const KNOCKBACK_THRESHOLD_FRACTION: f64 = 0.15;
const TARGET_SEARCH_PAD: f64 = 20.0;
const SPAWN_INSET: f64 = 50.0;
const CASTLE_X_PLAYER1: f64 = 80.0;
/// Lane-wide lower bound on unit x — no unit, of either side, ever walks,
/// knocks back, or gets jostled past this regardless of castle position.
const LANE_MIN_X: f64 = 80.0;

/// Observability-only record of something combat did this tick; folded into
/// tracing spans by the room actor, never sent over the wire directly.
#[derive(Debug, Clone)]
pub enum CombatEvent {
    UnitDied { instance_id: String, side: Side },
    CastleDamaged { side: Side, amount: i32 },
}

fn castle_x(side: Side, stage_length: f64) -> f64 {
    match side {
        Side::Player1 => CASTLE_X_PLAYER1,
        Side::Player2 => stage_length - CASTLE_X_PLAYER1,
    }
}

fn direction(side: Side) -> f64 {
    match side {
        Side::Player1 => 1.0,
        Side::Player2 => -1.0,
    }
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Player1 => Side::Player2,
        Side::Player2 => Side::Player1,
    }
}

/// Distance between the nearest edges of two bounding extents; negative when
/// they already overlap.
fn edge_distance(ax: f64, a_half_width: f64, bx: f64, b_half_width: f64) -> f64 {
    (ax - bx).abs() - a_half_width - b_half_width
}

/// Spawns a unit for `session_id`'s side from catalog entry `unit_id`.
/// Resource and deck validation is the caller's (`Room::summon`)
/// responsibility; this only places the unit on the lane.
pub fn spawn_unit(room: &mut Room, session_id: &str, unit_id: &str) -> Result<String, crate::errors::RoomError> {
    let definition = room
        .catalog
        .lookup(unit_id)
        .ok_or(crate::errors::RoomError::InvalidUnit)?
        .clone();
    let side = room
        .players
        .get(session_id)
        .ok_or(crate::errors::RoomError::SpawnFailed)?
        .side;

    let spawn_x = castle_x(side, room.stage_length) + direction(side) * SPAWN_INSET;
    let instance_id = room.fresh_instance_id();

    let unit = Unit {
        instance_id: instance_id.clone(),
        definition_id: unit_id.to_string(),
        side,
        x: spawn_x,
        hp: definition.max_hp,
        max_hp: definition.max_hp,
        state: UnitState::Spawn,
        state_timer_ms: 0.0,
        target_id: None,
        damage_accumulated: 0,
        width: definition.width(),
        speed: definition.speed,
        attack_damage: definition.attack_damage,
        attack_range: definition.attack_range,
        attack_cooldown_ms: definition.attack_cooldown_ms,
        attack_windup_ms: definition.attack_windup_ms,
        knockback: definition.knockback,
        is_boss: definition.is_boss,
    };

    room.units.insert(instance_id.clone(), unit);
    room.unit_order.push(instance_id.clone());
    Ok(instance_id)
}

/// Advances the battle by `delta_ms`: per-unit state transitions, same-side
/// collision resolution, target reassignment, cleanup, and win detection.
pub fn update(room: &mut Room, delta_ms: f64) -> Vec<CombatEvent> {
    let mut events = Vec::new();

    step_state_update(room, delta_ms, &mut events);
    step_same_side_collision(room);
    step_targeting(room);
    step_cleanup(room, delta_ms);
    step_win_check(room);

    events
}

fn step_state_update(room: &mut Room, delta_ms: f64, events: &mut Vec<CombatEvent>) {
    let order = room.unit_order.clone();
    for id in order {
        let Some(mut unit) = room.units.remove(&id) else { continue };
        if unit.state != UnitState::Die {
            unit.state_timer_ms += delta_ms;
            dispatch(room, &mut unit, delta_ms, events);
        }
        room.units.insert(id, unit);
    }
}

fn dispatch(room: &mut Room, unit: &mut Unit, delta_ms: f64, events: &mut Vec<CombatEvent>) {
    match unit.state {
        UnitState::Spawn => {
            if unit.state_timer_ms >= SPAWN_TO_WALK_MS {
                unit.state = UnitState::Walk;
                unit.state_timer_ms = 0.0;
            }
        }
        UnitState::Walk => walk(room, unit, delta_ms),
        UnitState::AttackWindup => {
            if unit.state_timer_ms >= unit.attack_windup_ms as f64 {
                resolve_attack(room, unit, events);
                unit.state = UnitState::AttackCooldown;
                unit.state_timer_ms = 0.0;
            }
        }
        UnitState::AttackCooldown => {
            if unit.state_timer_ms >= unit.attack_cooldown_ms as f64 {
                unit.state = UnitState::Walk;
                unit.state_timer_ms = 0.0;
            }
        }
        UnitState::Hitstun => {
            if unit.state_timer_ms >= HITSTUN_MS {
                unit.state = UnitState::Walk;
                unit.state_timer_ms = 0.0;
            }
        }
        UnitState::Die => {}
    }
}

fn walk(room: &mut Room, unit: &mut Unit, delta_ms: f64) {
    if in_attack_range(room, unit) {
        unit.state = UnitState::AttackWindup;
        unit.state_timer_ms = 0.0;
        return;
    }
    if is_blocked(room, unit) {
        return;
    }

    let step = unit.speed * (delta_ms / 1000.0) * direction(unit.side);
    unit.x += step;

    match unit.side {
        Side::Player1 => unit.x = unit.x.min(room.stage_length - MIN_SAME_SIDE_GAP),
        Side::Player2 => unit.x = unit.x.max(LANE_MIN_X),
    }
}

fn in_attack_range(room: &Room, unit: &Unit) -> bool {
    if let Some(target_id) = &unit.target_id {
        if let Some(target) = room.units.get(target_id) {
            if target.state != UnitState::Die {
                let distance = edge_distance(unit.x, unit.half_width(), target.x, target.half_width());
                return distance <= unit.attack_range;
            }
        }
    }
    let enemy_castle = castle_x(opposite(unit.side), room.stage_length);
    (unit.x - enemy_castle).abs() <= unit.attack_range
}

fn is_blocked(room: &Room, unit: &Unit) -> bool {
    room.units.values().any(|other| {
        other.side != unit.side
            && other.state != UnitState::Die
            && is_ahead(unit, other)
            && edge_distance(unit.x, unit.half_width(), other.x, other.half_width())
                < (unit.width + other.width) / 4.0 + 30.0
    })
}

fn is_ahead(unit: &Unit, other: &Unit) -> bool {
    match unit.side {
        Side::Player1 => other.x > unit.x,
        Side::Player2 => other.x < unit.x,
    }
}

fn resolve_attack(room: &mut Room, attacker: &mut Unit, events: &mut Vec<CombatEvent>) {
    let valid_target = attacker
        .target_id
        .as_ref()
        .and_then(|id| room.units.get(id))
        .map(|t| t.state != UnitState::Die)
        .unwrap_or(false);

    if valid_target {
        let target_id = attacker.target_id.clone().unwrap();
        apply_damage_to_unit(room, &target_id, attacker, events);
    } else {
        let enemy_castle = castle_x(opposite(attacker.side), room.stage_length);
        if (attacker.x - enemy_castle).abs() <= attacker.attack_range {
            apply_damage_to_castle(room, opposite(attacker.side), attacker.attack_damage, events);
        }
    }
}

fn apply_damage_to_unit(room: &mut Room, target_id: &str, attacker: &mut Unit, events: &mut Vec<CombatEvent>) {
    let Some(target) = room.units.get_mut(target_id) else { return };
    target.hp -= attacker.attack_damage;
    target.damage_accumulated += attacker.attack_damage;

    if target.hp <= 0 {
        target.hp = 0;
        target.state = UnitState::Die;
        target.state_timer_ms = 0.0;
        events.push(CombatEvent::UnitDied { instance_id: target.instance_id.clone(), side: target.side });
        if let Some(player) = room.player_by_side_mut(attacker.side) {
            player.kills += 1;
        }
        return;
    }

    if !target.is_boss && target.damage_accumulated as f64 >= target.max_hp as f64 * KNOCKBACK_THRESHOLD_FRACTION {
        target.damage_accumulated = 0;
        let push = target.knockback_distance_or(attacker);
        target.x += direction(attacker.side) * push;
        target.x = target.x.clamp(LANE_MIN_X, room.stage_length - MIN_SAME_SIDE_GAP);
        target.state = UnitState::Hitstun;
        target.state_timer_ms = 0.0;
    }
}

impl Unit {
    /// Knockback displacement: the attacker's own `knockback` stat — a zero
    /// stat means that attacker never staggers anyone.
    fn knockback_distance_or(&self, attacker: &Unit) -> f64 {
        let _ = self;
        attacker.knockback
    }
}

fn apply_damage_to_castle(room: &mut Room, side: Side, amount: i32, events: &mut Vec<CombatEvent>) {
    if let Some(player) = room.player_by_side_mut(side) {
        player.castle_hp = (player.castle_hp - amount).max(0);
        events.push(CombatEvent::CastleDamaged { side, amount });
    }
}

fn step_same_side_collision(room: &mut Room) {
    let order = room.unit_order.clone();
    for id in &order {
        let Some(mut unit) = room.units.remove(id) else { continue };
        if unit.state != UnitState::Die {
            resolve_same_side_overlap(room, &mut unit);
        }
        room.units.insert(id.clone(), unit);
    }
}

fn resolve_same_side_overlap(room: &mut Room, unit: &mut Unit) {
    for other in room.units.values() {
        if other.side != unit.side || other.state == UnitState::Die {
            continue;
        }
        let min_distance = (unit.width + other.width) / 2.0 * 0.6 + 30.0;
        let distance = (unit.x - other.x).abs();
        if distance < min_distance {
            let overlap = min_distance - distance;
            let push = overlap / 4.0;
            if is_ahead(unit, other) {
                unit.x -= push * direction(unit.side);
            } else {
                unit.x += push * direction(unit.side);
            }
        }
    }

    let (min_x, max_x) = match unit.side {
        Side::Player1 => (castle_x(Side::Player1, room.stage_length) + MIN_SAME_SIDE_GAP, room.stage_length - MIN_SAME_SIDE_GAP),
        Side::Player2 => (LANE_MIN_X, castle_x(Side::Player2, room.stage_length) - MIN_SAME_SIDE_GAP),
    };
    unit.x = unit.x.clamp(min_x, max_x);
}

fn step_targeting(room: &mut Room) {
    let order = room.unit_order.clone();
    for id in &order {
        let Some(mut unit) = room.units.remove(id) else { continue };
        if unit.state != UnitState::Die {
            reassign_target_if_needed(room, &mut unit);
        }
        room.units.insert(id.clone(), unit);
    }
}

fn reassign_target_if_needed(room: &Room, unit: &mut Unit) {
    let still_valid = unit
        .target_id
        .as_ref()
        .and_then(|id| room.units.get(id))
        .map(|t| t.state != UnitState::Die)
        .unwrap_or(false);
    if still_valid {
        return;
    }

    let search_range = unit.attack_range + TARGET_SEARCH_PAD;
    let mut best_in_front: Option<(&str, f64)> = None;
    let mut best_any: Option<(&str, f64)> = None;

    for candidate_id in &room.unit_order {
        let Some(candidate) = room.units.get(candidate_id) else { continue };
        if candidate.side == unit.side || candidate.state == UnitState::Die {
            continue;
        }
        let distance = edge_distance(unit.x, unit.half_width(), candidate.x, candidate.half_width());
        if distance > search_range {
            continue;
        }
        if is_ahead(unit, candidate) && best_in_front.map(|(_, d)| distance < d).unwrap_or(true) {
            best_in_front = Some((candidate_id, distance));
        }
        if best_any.map(|(_, d)| distance < d).unwrap_or(true) {
            best_any = Some((candidate_id, distance));
        }
    }

    unit.target_id = best_in_front.or(best_any).map(|(id, _)| id.to_string());
}

fn step_cleanup(room: &mut Room, delta_ms: f64) {
    let mut remove = Vec::new();
    for (id, unit) in room.units.iter_mut() {
        if unit.state == UnitState::Die {
            unit.state_timer_ms += delta_ms;
            if unit.state_timer_ms >= DEATH_LINGER_MS {
                remove.push(id.clone());
            }
        }
    }
    for id in &remove {
        room.units.remove(id);
    }
    room.unit_order.retain(|id| !remove.contains(id));
}

fn step_win_check(room: &mut Room) {
    if room.phase != Phase::Playing {
        return;
    }
    let p1_dead = room.player_by_side(Side::Player1).map(|p| p.castle_hp <= 0).unwrap_or(false);
    let p2_dead = room.player_by_side(Side::Player2).map(|p| p.castle_hp <= 0).unwrap_or(false);

    if !p1_dead && !p2_dead {
        return;
    }

    room.phase = Phase::Finished;
    if p1_dead && p2_dead {
        room.winner_id = None;
        room.win_reason = Some("draw".to_string());
    } else if p1_dead {
        room.winner_id = room.player_by_side(Side::Player2).map(|p| p.session_id.clone());
        room.win_reason = Some("castle_destroyed".to_string());
    } else {
        room.winner_id = room.player_by_side(Side::Player1).map(|p| p.session_id.clone());
        room.win_reason = Some("castle_destroyed".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitCatalog;
    use std::sync::Arc;

    fn room_with_combatants() -> Room {
        let mut room = Room::new(Arc::new(UnitCatalog::default_catalog()));
        room.join("a".into(), String::new(), "a".into(), vec!["unitA".into()]).unwrap();
        room.join("b".into(), String::new(), "b".into(), vec!["unitA".into()]).unwrap();
        room.ready("a");
        room.ready("b");
        // drain the 3-2-1-go countdown deterministically
        for _ in 0..4 {
            room.countdown_tick();
        }
        room
    }

    #[test]
    fn spawned_unit_starts_in_spawn_state_inset_from_castle() {
        let mut room = room_with_combatants();
        for player in room.players.values_mut() {
            player.cost = 100_000.0;
        }
        let id = spawn_unit(&mut room, "a", "unitA").unwrap();
        let unit = &room.units[&id];
        assert_eq!(unit.state, UnitState::Spawn);
        assert_eq!(unit.x, CASTLE_X_PLAYER1 + SPAWN_INSET);
    }

    #[test]
    fn unit_walks_toward_enemy_castle() {
        let mut room = room_with_combatants();
        for player in room.players.values_mut() {
            player.cost = 100_000.0;
        }
        let id = spawn_unit(&mut room, "a", "unitA").unwrap();
        room.units.get_mut(&id).unwrap().state = UnitState::Walk;
        let before = room.units[&id].x;
        update(&mut room, 100.0);
        assert!(room.units[&id].x > before);
    }

    #[test]
    fn windup_completing_against_dead_target_deals_zero_damage() {
        let mut room = room_with_combatants();
        for player in room.players.values_mut() {
            player.cost = 100_000.0;
        }
        let attacker_id = spawn_unit(&mut room, "a", "unitA").unwrap();
        let target_id = spawn_unit(&mut room, "b", "unitA").unwrap();

        {
            let attacker = room.units.get_mut(&attacker_id).unwrap();
            attacker.state = UnitState::AttackWindup;
            attacker.state_timer_ms = attacker.attack_windup_ms as f64;
            attacker.target_id = Some(target_id.clone());
        }
        room.units.get_mut(&target_id).unwrap().state = UnitState::Die;

        let mut events = Vec::new();
        step_state_update(&mut room, 0.0, &mut events);
        assert!(!events.iter().any(|e| matches!(e, CombatEvent::CastleDamaged { .. })));
    }

    #[test]
    fn castle_destroyed_finishes_the_room() {
        let mut room = room_with_combatants();
        room.players.get_mut("b").unwrap().castle_hp = 0;
        update(&mut room, 16.0);
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.winner_id.as_deref(), Some("a"));
    }
}
