//! Per-item projectile stats and per-shot spawn values.
//!
//! This module provides:
//! - Damage types (including heals, which bypass permission checks)
//! - Immutable per-item [`ProjectileStats`]
//! - Per-shot [`ProjectileSpawnStats`]
//! - A RON-loaded registry resolving an ammo item to its stats

use std::collections::HashMap;

use ahash::AHashMap;
use ballista_common::{BallistaError, EntityId, ItemTypeId, ProjectileError};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Damage Types
// ============================================================================

/// Kind of effect a projectile applies on hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    /// Arrows, bolts.
    #[default]
    Piercing,
    /// Sling stones, blunt bolts.
    Blunt,
    /// Burning projectiles.
    Fire,
    /// Healing darts.
    Heal,
}

impl DamageType {
    /// Check if this is a healing effect.
    #[must_use]
    pub fn is_heal(&self) -> bool {
        matches!(self, Self::Heal)
    }
}

// ============================================================================
// Projectile Stats
// ============================================================================

/// Immutable configuration of a projectile item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileStats {
    /// Entity type spawned for this projectile.
    pub entity_type: String,
    /// Base damage amount.
    pub damage: f32,
    /// Damage type.
    pub damage_type: DamageType,
    /// Added to the shot's tier delta.
    pub tier_bonus: i32,
    /// Minimum relative speed for a hit to deal damage.
    pub min_damage_speed: f64,
    /// Knockback strength.
    pub knockback: f32,
    /// Sound played on terrain impact.
    pub impact_sound: Option<String>,
    /// Sound played on creature hit.
    pub hit_sound: Option<String>,
    /// Collision radius.
    pub radius: f64,
    /// How far past the tick segment hits are searched.
    pub penetration_distance: f32,
    /// Durability taken from the projectile stack per hit.
    pub durability_damage: u16,
    /// Probability of surviving a terrain embed.
    pub drop_chance: f32,
    /// Penetration strength the projectile starts with.
    pub penetration_bonus: f32,
    /// Whether the projectile can be picked up.
    pub collectible: bool,
    /// Whether the shooter itself can be hit.
    pub collide_with_shooter: bool,
    /// Hits bypass invulnerability frames.
    pub ignore_invulnerability: bool,
}

impl Default for ProjectileStats {
    fn default() -> Self {
        Self {
            entity_type: "arrow".to_string(),
            damage: 10.0,
            damage_type: DamageType::Piercing,
            tier_bonus: 0,
            min_damage_speed: 5.0,
            knockback: 1.0,
            impact_sound: None,
            hit_sound: None,
            radius: 0.05,
            penetration_distance: 0.5,
            durability_damage: 0,
            drop_chance: 1.0,
            penetration_bonus: 5.0,
            collectible: true,
            collide_with_shooter: false,
            ignore_invulnerability: false,
        }
    }
}

impl ProjectileStats {
    /// Create stats with the given damage.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, damage: f32, damage_type: DamageType) -> Self {
        Self {
            entity_type: entity_type.into(),
            damage,
            damage_type,
            ..Self::default()
        }
    }

    /// Set starting penetration strength.
    #[must_use]
    pub fn with_penetration(mut self, strength: f32) -> Self {
        self.penetration_bonus = strength.max(0.0);
        self
    }

    /// Set the minimum damaging speed.
    #[must_use]
    pub fn with_min_damage_speed(mut self, speed: f64) -> Self {
        self.min_damage_speed = speed;
        self
    }

    /// Set the drop chance.
    #[must_use]
    pub fn with_drop_chance(mut self, chance: f32) -> Self {
        self.drop_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Set the tier bonus.
    #[must_use]
    pub fn with_tier_bonus(mut self, bonus: i32) -> Self {
        self.tier_bonus = bonus;
        self
    }

    /// Set durability damage per hit.
    #[must_use]
    pub fn with_durability_damage(mut self, amount: u16) -> Self {
        self.durability_damage = amount;
        self
    }

    /// Effective tier for a shot with `tier_delta`, never below 1.
    #[must_use]
    pub fn effective_tier(&self, tier_delta: i32) -> i32 {
        tier_delta.saturating_add(self.tier_bonus).max(1)
    }
}

/// Per-shot values supplied by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawnStats {
    /// Entity that produced the shot.
    pub producer: EntityId,
    /// Damage multiplier for this shot.
    pub damage_multiplier: f32,
    /// Tier adjustment for this shot.
    pub tier_delta: i32,
    /// Launch position.
    pub position: DVec3,
    /// Launch velocity.
    pub velocity: DVec3,
}

impl ProjectileSpawnStats {
    /// Create spawn stats with neutral multiplier and tier.
    #[must_use]
    pub fn new(producer: EntityId, position: DVec3, velocity: DVec3) -> Self {
        Self {
            producer,
            damage_multiplier: 1.0,
            tier_delta: 0,
            position,
            velocity,
        }
    }

    /// Set the damage multiplier.
    #[must_use]
    pub fn with_damage_multiplier(mut self, multiplier: f32) -> Self {
        self.damage_multiplier = multiplier;
        self
    }

    /// Set the tier delta.
    #[must_use]
    pub fn with_tier_delta(mut self, delta: i32) -> Self {
        self.tier_delta = delta;
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Projectile stats keyed by ammo item.
#[derive(Debug, Clone, Default)]
pub struct ProjectileStatsRegistry {
    stats: AHashMap<ItemTypeId, ProjectileStats>,
}

impl ProjectileStatsRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a RON map of item id to stats.
    pub fn from_ron(text: &str) -> Result<Self, BallistaError> {
        let parsed: HashMap<ItemTypeId, ProjectileStats> =
            ron::from_str(text).map_err(|e| BallistaError::Config(e.to_string()))?;
        debug!("Loaded projectile stats for {} items", parsed.len());
        Ok(Self {
            stats: parsed.into_iter().collect(),
        })
    }

    /// Register stats for an item (builder).
    #[must_use]
    pub fn with(mut self, item: ItemTypeId, stats: ProjectileStats) -> Self {
        self.insert(item, stats);
        self
    }

    /// Register stats for an item.
    pub fn insert(&mut self, item: ItemTypeId, stats: ProjectileStats) {
        self.stats.insert(item, stats);
    }

    /// Look up stats.
    #[must_use]
    pub fn get(&self, item: ItemTypeId) -> Option<&ProjectileStats> {
        self.stats.get(&item)
    }

    /// Look up stats, failing if the item is not a projectile.
    pub fn require(&self, item: ItemTypeId) -> Result<&ProjectileStats, ProjectileError> {
        self.get(item).ok_or(ProjectileError::MissingStats(item))
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Check if no items are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
