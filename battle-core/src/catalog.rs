//! Read-only lookup of unit master data.
//!
//! Loaded once at process start from an embedded JSON file and never
//! mutated afterwards — the catalog is shared read-only across every room
//! in the process, the way the teacher's `lobby::AppState.configs` is shared
//! across rooms, except this data never needs a reload because unit master
//! data loading is explicitly out of core scope.

use serde::Deserialize;
use std::collections::HashMap;

/// Default unit width before any per-definition `scale` is applied.
pub const BASE_UNIT_WIDTH: f64 = 60.0;

const EMBEDDED_CATALOG: &str = include_str!("../data/units.json");

/// Immutable catalog entry for one summonable unit.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitDefinition {
    pub id: String,
    pub rarity: String,
    pub cost: u32,
    pub max_hp: i32,
    /// Pixels per second.
    pub speed: f64,
    pub attack_damage: i32,
    /// Pixels.
    pub attack_range: f64,
    pub attack_cooldown_ms: u32,
    pub attack_windup_ms: u32,
    /// Delay before the same player may summon this unit id again.
    #[serde(default)]
    pub spawn_cooldown_ms: Option<u32>,
    /// Pixels of displacement applied on knockback.
    pub knockback: f64,
    #[serde(default)]
    pub is_boss: bool,
    /// Multiplier applied to [`BASE_UNIT_WIDTH`]; defaults to 1.0.
    #[serde(default)]
    pub scale: Option<f64>,
}

impl UnitDefinition {
    /// The spawn cooldown to apply: the definition's own value if set,
    /// otherwise the rarity-derived default.
    pub fn effective_spawn_cooldown_ms(&self) -> u32 {
        self.spawn_cooldown_ms
            .unwrap_or_else(|| default_spawn_cooldown_ms(&self.rarity))
    }

    /// Width of the unit on the lane.
    pub fn width(&self) -> f64 {
        BASE_UNIT_WIDTH * self.scale.unwrap_or(1.0)
    }
}

/// Rarity-derived default spawn cooldown, in milliseconds.
fn default_spawn_cooldown_ms(rarity: &str) -> u32 {
    match rarity {
        "N" => 2000,
        "R" => 4000,
        "SR" => 6000,
        "SSR" => 8000,
        "UR" => 10000,
        _ => 3000,
    }
}

/// Read-only catalog of unit definitions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    definitions: HashMap<String, UnitDefinition>,
}

impl UnitCatalog {
    /// Builds a catalog from an explicit list of definitions. Mostly useful
    /// for tests; production code wants [`UnitCatalog::default_catalog`].
    pub fn from_definitions(definitions: Vec<UnitDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    /// Loads the embedded catalog baked into the binary at compile time.
    pub fn default_catalog() -> Self {
        let definitions: Vec<UnitDefinition> =
            serde_json::from_str(EMBEDDED_CATALOG).expect("embedded unit catalog must parse");
        Self::from_definitions(definitions)
    }

    pub fn lookup(&self, id: &str) -> Option<&UnitDefinition> {
        self.definitions.get(id)
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_loads_and_validates() {
        let catalog = UnitCatalog::default_catalog();
        assert!(!catalog.definitions.is_empty());
        for def in catalog.definitions.values() {
            assert!(catalog.is_valid(&def.id));
        }
        assert!(!catalog.is_valid("ghost"));
    }

    #[test]
    fn rarity_default_spawn_cooldown() {
        assert_eq!(default_spawn_cooldown_ms("N"), 2000);
        assert_eq!(default_spawn_cooldown_ms("UR"), 10000);
        assert_eq!(default_spawn_cooldown_ms("mythic"), 3000);
    }

    #[test]
    fn width_applies_scale() {
        let def = UnitDefinition {
            id: "big".into(),
            rarity: "N".into(),
            cost: 100,
            max_hp: 100,
            speed: 1.0,
            attack_damage: 1,
            attack_range: 1.0,
            attack_cooldown_ms: 1,
            attack_windup_ms: 1,
            spawn_cooldown_ms: None,
            knockback: 0.0,
            is_boss: false,
            scale: Some(2.0),
        };
        assert_eq!(def.width(), 120.0);
    }
}
