//! World seams consumed by the projectile registries.
//!
//! - [`CombatWorld`]: server-side health and damage entry point
//! - [`CreatureQuery`]: client-side creature lookup for narrow-phase scans
//! - [`CreatureWorld`]: in-memory implementation of both

use ahash::AHashMap;
use ballista_common::EntityId;
use ballista_kernel::collision::{Aabb, HitCollider};
use glam::DVec3;
use tracing::trace;

use crate::damage::DamageEvent;

/// Authoritative entity state the server resolves hits against.
pub trait CombatWorld {
    /// Check if the entity still exists (not despawned).
    fn exists(&self, entity: EntityId) -> bool;

    /// Check if the entity is alive.
    fn is_alive(&self, entity: EntityId) -> bool;

    /// Current velocity.
    fn velocity(&self, entity: EntityId) -> Option<DVec3>;

    /// Check if the entity is a player.
    fn is_player(&self, entity: EntityId) -> bool;

    /// Apply damage through the entity's standard damage entry point.
    fn apply_damage(&mut self, target: EntityId, event: &DamageEvent);
}

/// A creature as seen by the narrow-phase scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Creature {
    /// Entity id.
    pub entity: EntityId,
    /// World position.
    pub position: DVec3,
    /// Velocity.
    pub velocity: DVec3,
    /// Bounding box relative to `position`.
    pub bounds: Aabb,
    /// Detailed per-part colliders, if the model exposes them.
    pub parts: Option<Vec<HitCollider>>,
}

impl Creature {
    /// Create a creature with a bounding box only.
    #[must_use]
    pub fn new(entity: EntityId, position: DVec3, half_extents: DVec3) -> Self {
        Self {
            entity,
            position,
            velocity: DVec3::ZERO,
            bounds: Aabb::from_center(DVec3::ZERO, half_extents),
            parts: None,
        }
    }

    /// Set velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Attach detailed hit colliders.
    #[must_use]
    pub fn with_parts(mut self, parts: Vec<HitCollider>) -> Self {
        self.parts = Some(parts);
        self
    }

    /// Bounding box in world space.
    #[must_use]
    pub fn world_bounds(&self) -> Aabb {
        self.bounds.translated(self.position)
    }
}

/// Creature lookup used by the client scan.
pub trait CreatureQuery {
    /// Creatures whose bounds come within `radius` of `point`.
    fn creatures_near(&self, point: DVec3, radius: f64) -> Vec<&Creature>;
}

/// Health bookkeeping for one creature.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatureRecord {
    /// Scan-visible state.
    pub creature: Creature,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Player-controlled.
    pub player: bool,
}

/// In-memory world of creatures.
#[derive(Debug, Default)]
pub struct CreatureWorld {
    records: AHashMap<EntityId, CreatureRecord>,
    damage_log: Vec<(EntityId, DamageEvent)>,
}

impl CreatureWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a creature.
    pub fn insert(&mut self, creature: Creature, health: f32, player: bool) {
        self.records.insert(
            creature.entity,
            CreatureRecord {
                creature,
                health,
                max_health: health,
                player,
            },
        );
    }

    /// Remove a creature.
    pub fn remove(&mut self, entity: EntityId) -> Option<CreatureRecord> {
        self.records.remove(&entity)
    }

    /// Look up a creature.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&CreatureRecord> {
        self.records.get(&entity)
    }

    /// Look up a creature mutably.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut CreatureRecord> {
        self.records.get_mut(&entity)
    }

    /// Move every living creature by its velocity.
    pub fn advance(&mut self, dt: f64) {
        for record in self.records.values_mut().filter(|r| r.health > 0.0) {
            record.creature.position += record.creature.velocity * dt;
        }
    }

    /// Every damage event applied so far, in order.
    #[must_use]
    pub fn damage_log(&self) -> &[(EntityId, DamageEvent)] {
        &self.damage_log
    }

    /// Number of creatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the world is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of creatures with health left.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.records.values().filter(|r| r.health > 0.0).count()
    }
}

impl CombatWorld for CreatureWorld {
    fn exists(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.records.get(&entity).is_some_and(|r| r.health > 0.0)
    }

    fn velocity(&self, entity: EntityId) -> Option<DVec3> {
        self.records.get(&entity).map(|r| r.creature.velocity)
    }

    fn is_player(&self, entity: EntityId) -> bool {
        self.records.get(&entity).is_some_and(|r| r.player)
    }

    fn apply_damage(&mut self, target: EntityId, event: &DamageEvent) {
        let Some(record) = self.records.get_mut(&target) else {
            return;
        };
        if event.source.damage_type.is_heal() {
            record.health = (record.health + event.amount).min(record.max_health);
        } else {
            record.health = (record.health - event.amount).max(0.0);
        }
        trace!("Entity {} health now {:.1}", target, record.health);
        self.damage_log.push((target, event.clone()));
    }
}

impl CreatureQuery for CreatureWorld {
    fn creatures_near(&self, point: DVec3, radius: f64) -> Vec<&Creature> {
        let mut found: Vec<&Creature> = self
            .records
            .values()
            .filter(|r| r.health > 0.0)
            .map(|r| &r.creature)
            .filter(|c| c.world_bounds().expanded(radius).contains(point))
            .collect();
        found.sort_by_key(|c| c.entity);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::DamageSource;
    use crate::stats::DamageType;
    use ballista_common::ProjectileId;

    fn event(damage_type: DamageType, amount: f32) -> DamageEvent {
        DamageEvent {
            source: DamageSource {
                attacker: EntityId::from_raw(1),
                projectile: ProjectileId::from_u128(1),
                damage_type,
                tier: 1,
                position: DVec3::ZERO,
                direction: DVec3::X,
                collider: "body".to_string(),
                knockback: 0.0,
                weapon: None,
            },
            amount,
            ignore_invulnerability: false,
        }
    }

    fn world() -> CreatureWorld {
        let mut world = CreatureWorld::new();
        world.insert(Creature::new(EntityId::from_raw(2), DVec3::new(5.0, 0.0, 0.0), DVec3::splat(0.5)), 20.0, false);
        world.insert(Creature::new(EntityId::from_raw(3), DVec3::new(50.0, 0.0, 0.0), DVec3::splat(0.5)), 20.0, true);
        world
    }

    #[test]
    fn test_damage_and_heal() {
        let mut world = world();
        let target = EntityId::from_raw(2);
        world.apply_damage(target, &event(DamageType::Piercing, 15.0));
        assert!((world.get(target).map_or(0.0, |r| r.health) - 5.0).abs() < f32::EPSILON);

        world.apply_damage(target, &event(DamageType::Heal, 100.0));
        assert!((world.get(target).map_or(0.0, |r| r.health) - 20.0).abs() < f32::EPSILON);

        world.apply_damage(target, &event(DamageType::Blunt, 50.0));
        assert!(!world.is_alive(target));
        assert!(world.exists(target));
        assert_eq!(world.damage_log().len(), 3);
    }

    #[test]
    fn test_creatures_near() {
        let world = world();
        let near = world.creatures_near(DVec3::new(4.0, 0.0, 0.0), 1.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].entity, EntityId::from_raw(2));
        assert!(world.creatures_near(DVec3::new(20.0, 0.0, 0.0), 1.0).is_empty());
    }

    #[test]
    fn test_advance_moves_creatures() {
        let mut world = world();
        let id = EntityId::from_raw(2);
        if let Some(record) = world.get_mut(id) {
            record.creature.velocity = DVec3::new(0.0, 0.0, 2.0);
        }
        world.advance(0.5);
        assert_eq!(world.velocity(id), Some(DVec3::new(0.0, 0.0, 2.0)));
        assert!((world.get(id).map_or(0.0, |r| r.creature.position.z) - 1.0).abs() < 1e-12);
        assert!(world.is_player(EntityId::from_raw(3)));
    }
}
