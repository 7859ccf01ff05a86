//! Projectile entity and per-tick flight physics.
//!
//! A [`ProjectileEntity`] integrates gravity each tick, sweeps its path against
//! [`Terrain`], and on contact either ricochets (grazing, fast impacts) or
//! embeds and becomes stuck. Stuck projectiles can be collected once they have
//! settled.
//!
//! Creature collisions are not resolved here; the owning controller handles
//! them and calls back into the entity to scale velocity, consume penetration
//! strength or embed at an impact point.

use std::collections::BTreeSet;

use ballista_common::{EntityId, ProjectileId};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::collision::dominant_axis;
use crate::item_stack::ItemStack;
use crate::terrain::{BlockPos, Terrain, TerrainContact};

/// Pitch/roll wobble amplitude in radians.
pub const FLUTTER_AMPLITUDE: f64 = 0.03;

// ============================================================================
// Configuration
// ============================================================================

/// Flight tuning shared by every projectile in a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Downward acceleration.
    pub gravity: f64,
    /// Impacts within this many degrees of parallel to the surface may ricochet.
    pub ricochet_angle_band: f64,
    /// Minimum speed for a ricochet.
    pub min_ricochet_speed: f64,
    /// Fraction of the normal velocity component kept (and reversed) on ricochet.
    pub ricochet_normal_factor: f64,
    /// Fraction of the tangential velocity kept on ricochet.
    pub ricochet_speed_factor: f64,
    /// Distance a ricocheting projectile is pushed off the surface.
    pub surface_offset: f64,
    /// Seconds after spawn before the projectile may be collected.
    pub collect_delay: f64,
    /// Speed below which the projectile counts as settled.
    pub collect_speed_threshold: f64,
    /// Seconds after spawn before impacts make a sound.
    pub impact_sound_delay: f64,
    /// Minimum impact speed for a sound.
    pub impact_sound_speed: f64,
    /// Minimum seconds between two impact sounds.
    pub impact_sound_cooldown: f64,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            ricochet_angle_band: 15.0,
            min_ricochet_speed: 10.0,
            ricochet_normal_factor: 0.4,
            ricochet_speed_factor: 0.7,
            surface_offset: 0.01,
            collect_delay: 0.5,
            collect_speed_threshold: 0.01,
            impact_sound_delay: 0.1,
            impact_sound_speed: 2.0,
            impact_sound_cooldown: 0.5,
        }
    }
}

impl FlightConfig {
    /// Override gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }
}

// ============================================================================
// State
// ============================================================================

/// Flight state of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlightState {
    /// Moving under gravity.
    #[default]
    Flying,
    /// Embedded in terrain or a body.
    Stuck,
}

/// Visual orientation in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Heading around +Y.
    pub yaw: f64,
    /// Elevation above the horizontal.
    pub pitch: f64,
    /// Spin around the direction of travel.
    pub roll: f64,
}

/// Orientation following `velocity`, with a small deterministic flutter over `age`.
#[must_use]
pub fn orientation_from_velocity(velocity: DVec3, age: f64) -> Orientation {
    let horizontal = velocity.x.hypot(velocity.z);
    Orientation {
        yaw: velocity.x.atan2(velocity.z),
        pitch: velocity.y.atan2(horizontal) + (age * 5.0).cos() * FLUTTER_AMPLITUDE,
        roll: (age * 7.0).sin() * FLUTTER_AMPLITUDE,
    }
}

/// Something that happened to a projectile during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightEvent {
    /// Bounced off terrain.
    Ricocheted {
        /// Position after the bounce.
        position: DVec3,
        /// Velocity after the bounce.
        velocity: DVec3,
    },
    /// Embedded in terrain.
    Embedded {
        /// Resting position.
        position: DVec3,
        /// Struck block.
        block: BlockPos,
        /// Velocity just before contact.
        impact_velocity: DVec3,
    },
    /// Impact sound should play.
    ImpactSound {
        /// Where.
        position: DVec3,
        /// Impact speed.
        speed: f64,
    },
    /// Broke on impact and was removed.
    Broken {
        /// Where.
        position: DVec3,
    },
}

// ============================================================================
// Entity
// ============================================================================

/// A projectile in flight or embedded in the world.
#[derive(Debug, Clone)]
pub struct ProjectileEntity {
    /// Stable projectile identifier.
    pub id: ProjectileId,
    /// World entity id assigned to the projectile.
    pub entity_id: EntityId,
    /// Stack returned on collection.
    pub projectile_stack: Option<ItemStack>,
    /// Stack of the launcher, if any.
    pub weapon_stack: Option<ItemStack>,
    /// Entity that fired the projectile.
    pub shooter_id: EntityId,
    /// Entity credited for the projectile (usually the shooter).
    pub owner_id: EntityId,
    /// Current position.
    pub position: DVec3,
    /// Current velocity.
    pub velocity: DVec3,
    /// Position at the start of the last tick.
    pub previous_position: DVec3,
    /// Velocity at the start of the last tick.
    pub previous_velocity: DVec3,
    /// Blocked on a horizontal axis during the last contact.
    pub collided_horizontally: bool,
    /// Blocked vertically during the last contact.
    pub collided_vertically: bool,
    /// Whether the projectile can be picked up.
    pub can_be_collected: bool,
    /// Hits bypass the target's invulnerability frames.
    pub ignore_invulnerability: bool,
    /// Collision radius.
    pub radius: f64,
    /// Probability of surviving an embed intact.
    pub drop_chance: f32,
    penetration_strength: f32,
    already_hit: BTreeSet<EntityId>,
    state: FlightState,
    age: f64,
    alive: bool,
    last_impact_sound: Option<f64>,
    orientation: Orientation,
}

impl ProjectileEntity {
    /// Create a flying projectile.
    #[must_use]
    pub fn new(
        id: ProjectileId,
        entity_id: EntityId,
        position: DVec3,
        velocity: DVec3,
        penetration_strength: f32,
    ) -> Self {
        Self {
            id,
            entity_id,
            projectile_stack: None,
            weapon_stack: None,
            shooter_id: EntityId::NULL,
            owner_id: EntityId::NULL,
            position,
            velocity,
            previous_position: position,
            previous_velocity: velocity,
            collided_horizontally: false,
            collided_vertically: false,
            can_be_collected: true,
            ignore_invulnerability: false,
            radius: 0.05,
            drop_chance: 1.0,
            penetration_strength: penetration_strength.max(0.0),
            already_hit: BTreeSet::new(),
            state: FlightState::Flying,
            age: 0.0,
            alive: true,
            last_impact_sound: None,
            orientation: orientation_from_velocity(velocity, 0.0),
        }
    }

    /// Set shooter and owner.
    #[must_use]
    pub fn with_shooter(mut self, shooter: EntityId, owner: EntityId) -> Self {
        self.shooter_id = shooter;
        self.owner_id = owner;
        self
    }

    /// Set carried item stacks.
    #[must_use]
    pub fn with_stacks(mut self, projectile: Option<ItemStack>, weapon: Option<ItemStack>) -> Self {
        self.projectile_stack = projectile;
        self.weapon_stack = weapon;
        self
    }

    /// Set collision radius.
    #[must_use]
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius.max(0.0);
        self
    }

    /// Set the probability of surviving an embed.
    #[must_use]
    pub fn with_drop_chance(mut self, drop_chance: f32) -> Self {
        self.drop_chance = drop_chance.clamp(0.0, 1.0);
        self
    }

    /// Set whether the projectile can be picked up.
    #[must_use]
    pub fn with_collectible(mut self, collectible: bool) -> Self {
        self.can_be_collected = collectible;
        self
    }

    /// Set whether hits bypass invulnerability frames.
    #[must_use]
    pub fn with_ignore_invulnerability(mut self, ignore: bool) -> Self {
        self.ignore_invulnerability = ignore;
        self
    }

    /// Remaining penetration strength.
    #[must_use]
    pub fn penetration_strength(&self) -> f32 {
        self.penetration_strength
    }

    /// Consume penetration strength. Never increases; floors at zero.
    ///
    /// Returns the remaining strength.
    pub fn consume_penetration(&mut self, loss: f32) -> f32 {
        self.penetration_strength = (self.penetration_strength - loss.max(0.0)).max(0.0);
        self.penetration_strength
    }

    /// Record a struck entity. Returns `false` if it was already recorded.
    pub fn mark_hit(&mut self, entity: EntityId) -> bool {
        self.already_hit.insert(entity)
    }

    /// Check if an entity has already been struck.
    #[must_use]
    pub fn has_hit(&self, entity: EntityId) -> bool {
        self.already_hit.contains(&entity)
    }

    /// Entities struck so far, in id order.
    pub fn already_hit(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.already_hit.iter().copied()
    }

    /// Current flight state.
    #[must_use]
    pub fn state(&self) -> FlightState {
        self.state
    }

    /// Check if the projectile is stuck.
    #[must_use]
    pub fn is_stuck(&self) -> bool {
        self.state == FlightState::Stuck
    }

    /// Seconds since spawn.
    #[must_use]
    pub fn age(&self) -> f64 {
        self.age
    }

    /// Check if the projectile still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Current orientation.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Current speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Remove the projectile from the world.
    pub fn destroy(&mut self) {
        self.alive = false;
    }

    /// Scale velocity by `factor`.
    pub fn scale_velocity(&mut self, factor: f64) {
        self.velocity *= factor;
    }

    /// Release a stuck projectile back into flight.
    pub fn release(&mut self) {
        self.state = FlightState::Flying;
        self.collided_horizontally = false;
        self.collided_vertically = false;
    }

    /// Embed at `point`, moving with `velocity` (the velocity of whatever was struck).
    pub fn embed_at(&mut self, point: DVec3, velocity: DVec3) {
        self.position = point;
        self.velocity = velocity;
        self.state = FlightState::Stuck;
        self.collided_horizontally = true;
        self.collided_vertically = true;
    }

    /// Restore a mirrored state received from the server.
    pub fn apply_state(&mut self, position: DVec3, velocity: DVec3, state: FlightState) {
        self.position = position;
        self.velocity = velocity;
        self.state = state;
    }

    /// Check if the projectile may be picked up now.
    #[must_use]
    pub fn can_collect(&self, config: &FlightConfig) -> bool {
        self.alive
            && self.can_be_collected
            && self.age >= config.collect_delay
            && self.speed() < config.collect_speed_threshold
    }

    /// Pick the projectile up, yielding its stack.
    ///
    /// Returns `None` (and leaves the projectile in place) if it cannot be collected.
    pub fn collect(&mut self, config: &FlightConfig) -> Option<ItemStack> {
        if !self.can_collect(config) {
            return None;
        }
        self.alive = false;
        debug!("Projectile {} collected", self.id);
        self.projectile_stack.take()
    }

    /// Advance one tick of `dt` seconds.
    ///
    /// The drop roll on embed draws from `rng`.
    pub fn step(
        &mut self,
        dt: f64,
        config: &FlightConfig,
        terrain: &mut dyn Terrain,
        rng: &mut fastrand::Rng,
    ) -> Vec<FlightEvent> {
        let mut events = Vec::new();
        if !self.alive {
            return events;
        }

        self.age += dt;
        if self.is_stuck() {
            return events;
        }

        self.previous_position = self.position;
        self.previous_velocity = self.velocity;
        self.velocity.y -= config.gravity * dt;

        let target = self.position + self.velocity * dt;
        match terrain.sweep(self.position, target, self.radius) {
            Some(contact) => self.resolve_terrain_contact(&contact, config, terrain, rng, &mut events),
            None => self.position = target,
        }

        if self.speed() > config.collect_speed_threshold {
            self.orientation = orientation_from_velocity(self.velocity, self.age);
        }

        events
    }

    fn resolve_terrain_contact(
        &mut self,
        contact: &TerrainContact,
        config: &FlightConfig,
        terrain: &mut dyn Terrain,
        rng: &mut fastrand::Rng,
        events: &mut Vec<FlightEvent>,
    ) {
        let speed = self.speed();
        self.maybe_impact_sound(contact.position, speed, config, events);

        let angle = self.velocity.angle_between(contact.normal).to_degrees();
        let grazing = (angle - 90.0).abs() <= config.ricochet_angle_band;

        if grazing && speed > config.min_ricochet_speed {
            let axis = dominant_axis(contact.normal);
            let mut velocity = self.velocity * config.ricochet_speed_factor;
            velocity[axis] = -self.velocity[axis] * config.ricochet_normal_factor;

            let mut position = contact.position;
            position[axis] += contact.normal[axis].signum() * config.surface_offset;

            self.position = position;
            self.velocity = velocity;
            self.collided_horizontally = false;
            self.collided_vertically = false;
            trace!("Projectile {} ricocheted at {:.1} degrees", self.id, angle);
            events.push(FlightEvent::Ricocheted { position, velocity });
            return;
        }

        let impact_velocity = self.velocity;
        terrain.on_projectile_collide(contact.block, self.id, impact_velocity);
        self.position = contact.position;
        self.velocity = DVec3::ZERO;
        self.state = FlightState::Stuck;
        self.collided_horizontally = true;
        self.collided_vertically = true;
        events.push(FlightEvent::Embedded {
            position: self.position,
            block: contact.block,
            impact_velocity,
        });

        if rng.f32() >= self.drop_chance {
            self.alive = false;
            debug!("Projectile {} broke on impact", self.id);
            events.push(FlightEvent::Broken {
                position: self.position,
            });
        }
    }

    fn maybe_impact_sound(
        &mut self,
        position: DVec3,
        speed: f64,
        config: &FlightConfig,
        events: &mut Vec<FlightEvent>,
    ) {
        if self.age < config.impact_sound_delay || speed < config.impact_sound_speed {
            return;
        }
        if self
            .last_impact_sound
            .is_some_and(|last| self.age - last < config.impact_sound_cooldown)
        {
            return;
        }
        self.last_impact_sound = Some(self.age);
        events.push(FlightEvent::ImpactSound { position, speed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::BlockTerrain;
    use ballista_common::ItemTypeId;

    const DT: f64 = 0.05;

    fn arrow(position: DVec3, velocity: DVec3) -> ProjectileEntity {
        ProjectileEntity::new(
            ProjectileId::from_u128(1),
            EntityId::from_raw(100),
            position,
            velocity,
            10.0,
        )
        .with_radius(0.1)
        .with_stacks(Some(ItemStack::new(ItemTypeId::new(5), 1)), None)
    }

    fn run_until_stuck(
        projectile: &mut ProjectileEntity,
        terrain: &mut BlockTerrain,
        config: &FlightConfig,
    ) -> Vec<FlightEvent> {
        let mut rng = fastrand::Rng::with_seed(11);
        let mut all = Vec::new();
        for _ in 0..400 {
            all.extend(projectile.step(DT, config, terrain, &mut rng));
            if projectile.is_stuck() || !projectile.is_alive() {
                break;
            }
        }
        all
    }

    #[test]
    fn test_gravity_integration() {
        let mut terrain = BlockTerrain::new();
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::new(0.0, 10.0, 0.0), DVec3::new(5.0, 0.0, 0.0));
        let mut rng = fastrand::Rng::with_seed(0);
        p.step(DT, &config, &mut terrain, &mut rng);

        assert!((p.velocity.y + config.gravity * DT).abs() < 1e-12);
        assert!((p.position.x - 5.0 * DT).abs() < 1e-12);
        assert_eq!(p.previous_position, DVec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_steep_impact_embeds() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::new(0.5, 2.0, 0.5), DVec3::new(1.0, -20.0, 0.0));

        let events = run_until_stuck(&mut p, &mut terrain, &config);

        assert!(p.is_stuck());
        assert_eq!(p.velocity, DVec3::ZERO);
        assert!(p.collided_vertically && p.collided_horizontally);
        assert!(events.iter().any(|e| matches!(e, FlightEvent::Embedded { .. })));
        assert_eq!(terrain.impacts().len(), 1);
    }

    #[test]
    fn test_grazing_fast_impact_ricochets() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default().with_gravity(0.0);
        let mut p = arrow(DVec3::new(0.5, 0.2, 0.5), DVec3::new(40.0, -4.0, 0.0));
        let mut rng = fastrand::Rng::with_seed(0);

        let events = p.step(DT, &config, &mut terrain, &mut rng);

        let Some(FlightEvent::Ricocheted { position, velocity }) = events
            .iter()
            .find(|e| matches!(e, FlightEvent::Ricocheted { .. }))
            .cloned()
        else {
            panic!("expected ricochet, got {events:?}");
        };
        assert!(velocity.y > 0.0);
        assert!((velocity.y - 4.0 * 0.4).abs() < 1e-9);
        assert!((velocity.x - 40.0 * 0.7).abs() < 1e-9);
        assert!(position.y > p.radius);
        assert!(!p.is_stuck());
    }

    #[test]
    fn test_ricochet_lifts_off_surface_along_normal() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default().with_gravity(0.0);
        let mut p = arrow(DVec3::new(0.5, 0.2, 0.5), DVec3::new(40.0, -4.0, 0.0));
        let contact = terrain
            .sweep(p.position, p.position + p.velocity * DT, p.radius)
            .expect("path reaches the ground");
        let mut rng = fastrand::Rng::with_seed(0);

        p.step(DT, &config, &mut terrain, &mut rng);

        assert!((p.position.y - (contact.position.y + config.surface_offset)).abs() < 1e-12);
        assert!((p.position.x - contact.position.x).abs() < 1e-12);
        assert!((p.position.z - contact.position.z).abs() < 1e-12);
        assert!(!p.collided_vertically);
        assert!(terrain.impacts().is_empty());
    }

    #[test]
    fn test_slow_grazing_impact_embeds() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default().with_gravity(0.0);
        let mut p = arrow(DVec3::new(0.5, 0.12, 0.5), DVec3::new(5.0, -0.5, 0.0));

        run_until_stuck(&mut p, &mut terrain, &config);
        assert!(p.is_stuck());
    }

    #[test]
    fn test_zero_drop_chance_breaks() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::new(0.5, 1.0, 0.5), DVec3::new(0.0, -20.0, 0.0)).with_drop_chance(0.0);

        let events = run_until_stuck(&mut p, &mut terrain, &config);
        assert!(!p.is_alive());
        assert!(events.iter().any(|e| matches!(e, FlightEvent::Broken { .. })));
    }

    #[test]
    fn test_drop_roll_happens_once() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::new(0.5, 0.5, 0.5), DVec3::new(0.0, -20.0, 0.0)).with_drop_chance(0.5);
        let mut rng = fastrand::Rng::with_seed(3);
        let mut expected = rng.clone();

        let mut events = p.step(DT, &config, &mut terrain, &mut rng);
        assert!(p.is_stuck());
        for _ in 0..100 {
            events.extend(p.step(DT, &config, &mut terrain, &mut rng));
        }

        let broken = events.iter().filter(|e| matches!(e, FlightEvent::Broken { .. })).count();
        let embedded = events.iter().filter(|e| matches!(e, FlightEvent::Embedded { .. })).count();
        assert!(broken <= 1);
        assert_eq!(embedded, 1);
        expected.f32();
        assert_eq!(rng.u64(..), expected.u64(..));
    }

    #[test]
    fn test_no_impact_sound_right_after_spawn() {
        let config = FlightConfig::default();

        let mut early_terrain = BlockTerrain::new().with_ground_level(0);
        let mut early = arrow(DVec3::new(0.5, 0.5, 0.5), DVec3::new(0.0, -20.0, 0.0));
        let events = run_until_stuck(&mut early, &mut early_terrain, &config);
        assert!(early.age() < config.impact_sound_delay);
        assert!(!events.iter().any(|e| matches!(e, FlightEvent::ImpactSound { .. })));

        let mut late_terrain = BlockTerrain::new().with_ground_level(0);
        let mut late = arrow(DVec3::new(0.5, 3.0, 0.5), DVec3::new(0.0, -20.0, 0.0));
        let events = run_until_stuck(&mut late, &mut late_terrain, &config);
        assert!(late.age() >= config.impact_sound_delay);
        let sounds = events.iter().filter(|e| matches!(e, FlightEvent::ImpactSound { .. })).count();
        assert_eq!(sounds, 1);
    }

    #[test]
    fn test_collect_after_delay() {
        let mut terrain = BlockTerrain::new().with_ground_level(0);
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::new(0.5, 0.5, 0.5), DVec3::new(0.0, -20.0, 0.0));
        let mut rng = fastrand::Rng::with_seed(0);

        p.step(DT, &config, &mut terrain, &mut rng);
        assert!(p.is_stuck());
        assert!(p.collect(&config).is_none());
        assert!(p.is_alive());

        for _ in 0..20 {
            p.step(DT, &config, &mut terrain, &mut rng);
        }
        let stack = p.collect(&config).expect("settled arrow should be collectible");
        assert_eq!(stack.item(), ItemTypeId::new(5));
        assert!(!p.is_alive());
    }

    #[test]
    fn test_impact_sound_rate_limited() {
        let config = FlightConfig::default();
        let mut p = arrow(DVec3::ZERO, DVec3::X * 20.0);
        p.age = 1.0;
        let mut events = Vec::new();

        p.maybe_impact_sound(DVec3::ZERO, 20.0, &config, &mut events);
        p.age = 1.2;
        p.maybe_impact_sound(DVec3::ZERO, 20.0, &config, &mut events);
        p.age = 1.6;
        p.maybe_impact_sound(DVec3::ZERO, 20.0, &config, &mut events);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_penetration_never_increases() {
        let mut p = arrow(DVec3::ZERO, DVec3::X);
        assert!((p.consume_penetration(4.0) - 6.0).abs() < f32::EPSILON);
        assert!((p.consume_penetration(-3.0) - 6.0).abs() < f32::EPSILON);
        assert!(p.consume_penetration(100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_already_hit_set() {
        let mut p = arrow(DVec3::ZERO, DVec3::X);
        assert!(p.mark_hit(EntityId::from_raw(3)));
        assert!(!p.mark_hit(EntityId::from_raw(3)));
        assert!(p.has_hit(EntityId::from_raw(3)));
        assert_eq!(p.already_hit().count(), 1);
    }

    #[test]
    fn test_orientation_follows_velocity() {
        let o = orientation_from_velocity(DVec3::new(0.0, 0.0, 10.0), 0.0);
        assert!(o.yaw.abs() < 1e-12);
        assert!((o.pitch - FLUTTER_AMPLITUDE).abs() < 1e-12);

        let a = orientation_from_velocity(DVec3::new(3.0, 1.0, 2.0), 0.37);
        let b = orientation_from_velocity(DVec3::new(3.0, 1.0, 2.0), 0.37);
        assert_eq!(a, b);
    }
}
