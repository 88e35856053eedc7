//! Per-player regenerating resource ("cost") and tiered maximum upgrades.
//!
//! All operations are free functions over `&mut Player` rather than methods,
//! matching the way the combat simulator is specified as a pure function of
//! `(state, Δt)`: nothing here owns a clock or a network connection, it just
//! advances numbers forward given a delta.

use crate::room::Player;

/// Maximum resource at each cost level, indexed by `cost_level - 1`.
pub const MAX_LEVELS: [u32; 8] = [1000, 2500, 4500, 7000, 10000, 15000, 25000, 99999];

/// Resource cost to upgrade away from level `cost_level`, indexed by
/// `cost_level - 1`. There is no entry for level 8 — `can_upgrade` rejects it.
pub const UPGRADE_COSTS: [u32; 7] = [500, 1200, 2500, 4500, 8000, 12000, 20000];

/// Regeneration rate in resource/second, indexed by `cost_level - 1`.
pub const REGEN_RATES: [u32; 8] = [100, 150, 250, 400, 600, 900, 1500, 2500];

pub const INITIAL_COST: f64 = 200.0;
pub const MAX_COST_LEVEL: u8 = 8;

/// Sets a freshly joined player to the level-1 starting resource state.
pub fn initialize(player: &mut Player) {
    player.cost = INITIAL_COST;
    player.max_cost = MAX_LEVELS[0];
    player.cost_level = 1;
}

/// Advances resource regeneration by `delta_ms` milliseconds.
pub fn update(player: &mut Player, delta_ms: f64) {
    let rate = REGEN_RATES[(player.cost_level - 1) as usize] as f64;
    let regenerated = player.cost + rate * (delta_ms / 1000.0);
    player.cost = regenerated.min(player.max_cost as f64);
}

/// Whether the player can afford `amount`, flooring the fractional resource
/// to whole units first so no one gets rounded into insufficient funds.
pub fn can_afford(player: &Player, amount: u32) -> bool {
    floored_cost(player) >= amount
}

/// Spends `amount` if affordable. Returns whether the spend succeeded.
pub fn spend(player: &mut Player, amount: u32) -> bool {
    if !can_afford(player, amount) {
        return false;
    }
    player.cost -= amount as f64;
    true
}

/// Refunds `amount` back onto the player's resource, clamped to `max_cost`.
/// Used when a spend is reverted after a post-spend spawn failure.
pub fn refund(player: &mut Player, amount: u32) {
    player.cost = (player.cost + amount as f64).min(player.max_cost as f64);
}

pub fn can_upgrade(player: &Player) -> bool {
    player.cost_level < MAX_COST_LEVEL
        && floored_cost(player) >= UPGRADE_COSTS[(player.cost_level - 1) as usize]
}

/// Upgrades the player's cost level if affordable. Returns whether it did.
pub fn upgrade(player: &mut Player) -> bool {
    if !can_upgrade(player) {
        return false;
    }
    let index = (player.cost_level - 1) as usize;
    player.cost -= UPGRADE_COSTS[index] as f64;
    player.cost_level += 1;
    player.max_cost = MAX_LEVELS[(player.cost_level - 1) as usize];
    true
}

fn floored_cost(player: &Player) -> u32 {
    player.cost.floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Player;
    use protocol::Side;

    fn fresh_player() -> Player {
        // Player::new already calls initialize(); re-running it here is
        // harmless and keeps this helper obviously self-contained.
        let mut player = Player::new("s1".into(), "ext".into(), "name".into(), Side::Player1);
        initialize(&mut player);
        player
    }

    #[test]
    fn initial_state() {
        let player = fresh_player();
        assert_eq!(player.cost, 200.0);
        assert_eq!(player.max_cost, 1000);
        assert_eq!(player.cost_level, 1);
    }

    #[test]
    fn update_zero_delta_is_noop() {
        let mut player = fresh_player();
        let before = player.cost;
        update(&mut player, 0.0);
        assert_eq!(player.cost, before);
    }

    #[test]
    fn update_regenerates_and_clamps_to_max() {
        let mut player = fresh_player();
        update(&mut player, 60_000.0);
        assert_eq!(player.cost, player.max_cost as f64);
    }

    #[test]
    fn spend_requires_affordability() {
        let mut player = fresh_player();
        assert!(!spend(&mut player, 500));
        assert_eq!(player.cost, 200.0);
        assert!(spend(&mut player, 150));
        assert_eq!(player.cost, 50.0);
    }

    #[test]
    fn fractional_cost_floors_before_afford_check() {
        let mut player = fresh_player();
        player.cost = 199.999;
        assert!(!can_afford(&player, 200));
    }

    #[test]
    fn upgrade_progression_level_1_to_2() {
        let mut player = fresh_player();
        update(&mut player, 4_000.0); // +400 at 100/s -> 600
        assert!((player.cost - 600.0).abs() < 1e-9);
        assert!(can_upgrade(&player));
        assert!(upgrade(&mut player));
        assert_eq!(player.cost_level, 2);
        assert_eq!(player.max_cost, 2500);
        assert!((player.cost - 100.0).abs() < 1e-9);
    }

    #[test]
    fn cannot_upgrade_past_level_eight() {
        let mut player = fresh_player();
        player.cost_level = 8;
        player.cost = 1_000_000.0;
        assert!(!can_upgrade(&player));
        assert!(!upgrade(&mut player));
    }

    #[test]
    fn refund_restores_spent_amount() {
        let mut player = fresh_player();
        assert!(spend(&mut player, 150));
        refund(&mut player, 150);
        assert_eq!(player.cost, 200.0);
    }
}
