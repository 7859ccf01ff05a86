//! Projectile damage sources, permission checks and pre-damage hooks.

use std::fmt;

use ballista_common::{EntityId, ProjectileId};
use ballista_kernel::item_stack::ItemStack;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::stats::DamageType;

/// Directional description of a projectile hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSource {
    /// Entity credited with the hit.
    pub attacker: EntityId,
    /// Projectile that hit.
    pub projectile: ProjectileId,
    /// Damage type.
    pub damage_type: DamageType,
    /// Effective tier (at least 1).
    pub tier: i32,
    /// Impact point.
    pub position: DVec3,
    /// Direction of travel at impact.
    pub direction: DVec3,
    /// Struck part key.
    pub collider: String,
    /// Knockback strength.
    pub knockback: f32,
    /// Launcher stack.
    pub weapon: Option<ItemStack>,
}

/// Damage about to be applied through a target's damage entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Where the damage came from.
    pub source: DamageSource,
    /// Amount after hooks.
    pub amount: f32,
    /// Bypass the target's invulnerability frames.
    pub ignore_invulnerability: bool,
}

/// Why a hit dealt no damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSkip {
    /// Relative speed below the configured threshold.
    TooSlow,
    /// Target already dead.
    TargetDead,
    /// PvP or creature-attack check failed.
    NotPermitted,
}

/// Result of damage resolution for an accepted hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Damage applied.
    Applied(f32),
    /// No damage.
    Skipped(DamageSkip),
}

// ============================================================================
// Permissions
// ============================================================================

/// Attack privilege checks.
pub trait PermissionService {
    /// Can `attacker` damage the player `target`?
    fn can_pvp(&self, attacker: EntityId, target: EntityId) -> bool;

    /// Can `attacker` damage the creature `target`?
    fn can_attack_creature(&self, attacker: EntityId, target: EntityId) -> bool;
}

/// Permits every attack.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionService for AllowAll {
    fn can_pvp(&self, _attacker: EntityId, _target: EntityId) -> bool {
        true
    }

    fn can_attack_creature(&self, _attacker: EntityId, _target: EntityId) -> bool {
        true
    }
}

/// Forbids player-versus-player damage, permits the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPvp;

impl PermissionService for NoPvp {
    fn can_pvp(&self, _attacker: EntityId, _target: EntityId) -> bool {
        false
    }

    fn can_attack_creature(&self, _attacker: EntityId, _target: EntityId) -> bool {
        true
    }
}

/// Check whether `attacker` may apply `damage_type` to `target`.
///
/// Heals always pass.
pub fn is_permitted(
    permissions: &dyn PermissionService,
    damage_type: DamageType,
    attacker: EntityId,
    attacker_is_player: bool,
    target: EntityId,
    target_is_player: bool,
) -> bool {
    if damage_type.is_heal() {
        return true;
    }
    match (attacker_is_player, target_is_player) {
        (true, true) => permissions.can_pvp(attacker, target),
        (_, false) => permissions.can_attack_creature(attacker, target),
        (false, true) => true,
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Adjusts damage before it is applied.
pub trait DamageModifier {
    /// Modify `damage` in place.
    fn modify(&self, target: EntityId, source: &DamageSource, weapon: Option<&ItemStack>, damage: &mut f32);
}

impl<F> DamageModifier for F
where
    F: Fn(EntityId, &DamageSource, Option<&ItemStack>, &mut f32),
{
    fn modify(&self, target: EntityId, source: &DamageSource, weapon: Option<&ItemStack>, damage: &mut f32) {
        self(target, source, weapon, damage);
    }
}

/// Ordered list of pre-damage modifiers.
#[derive(Default)]
pub struct DamageHooks {
    modifiers: Vec<Box<dyn DamageModifier + Send + Sync>>,
}

impl fmt::Debug for DamageHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DamageHooks")
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

impl DamageHooks {
    /// Create an empty hook list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a modifier; modifiers run in registration order.
    pub fn register(&mut self, modifier: impl DamageModifier + Send + Sync + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    /// Run every modifier over `damage`.
    pub fn apply(&self, target: EntityId, source: &DamageSource, damage: &mut f32) {
        for modifier in &self.modifiers {
            modifier.modify(target, source, source.weapon.as_ref(), damage);
        }
    }

    /// Number of registered modifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    /// Check if no modifiers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}
