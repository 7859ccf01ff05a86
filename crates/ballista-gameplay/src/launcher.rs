//! Turret and weapon firing glue.
//!
//! Resolves the ammo's stats, solves a firing arc toward a (possibly moving)
//! target, applies dispersion and spawns the projectile on the server.

use ballista_common::{EntityId, ItemTypeId, ProjectileError, ProjectileId};
use ballista_kernel::ballistics::{solve_ballistic_arc, BallisticOutput, TargetData};
use ballista_kernel::dispersion::{apply_dispersion, DispersionData};
use ballista_kernel::item_stack::ItemStack;
use glam::DVec3;
use tracing::{debug, warn};

use crate::server::ServerProjectileRegistry;
use crate::stats::{ProjectileSpawnStats, ProjectileStatsRegistry};
use crate::transport::ServerLink;

/// Result of a fire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A projectile was spawned.
    Fired {
        /// Projectile id.
        projectile: ProjectileId,
        /// Assigned entity id.
        entity: EntityId,
    },
    /// No firing solution this tick.
    NoSolution,
    /// Ammo stack is empty.
    OutOfAmmo,
    /// Ammo item has no projectile stats.
    MissingStats(ItemTypeId),
}

/// A fixed launcher (turret, bow holder).
#[derive(Debug, Clone)]
pub struct Launcher {
    /// Firing entity.
    pub shooter: EntityId,
    /// Launch point.
    pub muzzle: DVec3,
    /// Launch speed.
    pub speed: f64,
    /// Aim error.
    pub dispersion: DispersionData,
    /// Damage multiplier applied to every shot.
    pub damage_multiplier: f32,
    /// Tier adjustment applied to every shot.
    pub tier_delta: i32,
    /// Launcher item, if any.
    pub weapon: Option<ItemStack>,
}

impl Launcher {
    /// Create a launcher without dispersion.
    #[must_use]
    pub fn new(shooter: EntityId, muzzle: DVec3, speed: f64) -> Self {
        Self {
            shooter,
            muzzle,
            speed,
            dispersion: DispersionData::NONE,
            damage_multiplier: 1.0,
            tier_delta: 0,
            weapon: None,
        }
    }

    /// Set aim error.
    #[must_use]
    pub fn with_dispersion(mut self, dispersion: DispersionData) -> Self {
        self.dispersion = dispersion;
        self
    }

    /// Set the launcher item.
    #[must_use]
    pub fn with_weapon(mut self, weapon: ItemStack) -> Self {
        self.weapon = Some(weapon);
        self
    }

    /// Set the damage multiplier.
    #[must_use]
    pub fn with_damage_multiplier(mut self, multiplier: f32) -> Self {
        self.damage_multiplier = multiplier;
        self
    }

    /// Solve toward a target and apply dispersion.
    pub fn aim(&self, target: DVec3, target_velocity: DVec3, gravity: f64, rng: &mut fastrand::Rng) -> BallisticOutput {
        let data = TargetData::new(self.muzzle, target, self.speed, gravity).with_target_velocity(target_velocity);
        let output = solve_ballistic_arc(&data);
        apply_dispersion(&output, &self.dispersion, rng)
    }

    /// Fire one round from `ammo` at a target.
    ///
    /// Only a failed spawn is an error; every other reason not to fire is a
    /// [`FireOutcome`].
    pub fn fire<L: ServerLink>(
        &self,
        target: DVec3,
        target_velocity: DVec3,
        ammo: &mut ItemStack,
        stats: &ProjectileStatsRegistry,
        server: &mut ServerProjectileRegistry<L>,
        rng: &mut fastrand::Rng,
    ) -> Result<FireOutcome, ProjectileError> {
        let item = ammo.item();
        let stats = match stats.require(item) {
            Ok(stats) => stats.clone(),
            Err(e) => {
                warn!("Launcher {} cannot fire: {}", self.shooter, e);
                return Ok(FireOutcome::MissingStats(item));
            },
        };
        if ammo.is_empty() {
            return Ok(FireOutcome::OutOfAmmo);
        }

        let output = self.aim(target, target_velocity, server.flight().gravity, rng);
        if !output.success {
            debug!("Launcher {} has no firing solution", self.shooter);
            return Ok(FireOutcome::NoSolution);
        }

        let Some(round) = ammo.take_one() else {
            return Ok(FireOutcome::OutOfAmmo);
        };
        let projectile = ProjectileId::from_u128(rng.u128(..));
        let spawn = ProjectileSpawnStats::new(self.shooter, self.muzzle, output.velocity)
            .with_damage_multiplier(self.damage_multiplier)
            .with_tier_delta(self.tier_delta);
        let entity = server.spawn(projectile, stats, spawn, Some(round), self.weapon.clone(), self.shooter)?;

        Ok(FireOutcome::Fired { projectile, entity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::stats::{DamageType, ProjectileStats};
    use crate::transport::{loopback_pair, LoopbackServer};
    use ballista_common::SchemaVersion;
    use ballista_kernel::dispersion::DispersionDistribution;
    use ballista_kernel::projectile::FlightConfig;

    const ARROW: ItemTypeId = ItemTypeId::new(7);

    fn server() -> ServerProjectileRegistry<LoopbackServer> {
        let (server, _client) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, 256);
        ServerProjectileRegistry::new(server, FlightConfig::default(), ProtocolConfig::default(), 3)
    }

    fn registry() -> ProjectileStatsRegistry {
        ProjectileStatsRegistry::new().with(ARROW, ProjectileStats::new("arrow", 10.0, DamageType::Piercing))
    }

    #[test]
    fn test_fire_spawns_and_consumes_ammo() {
        let mut server = server();
        let mut rng = fastrand::Rng::with_seed(8);
        let launcher = Launcher::new(EntityId::from_raw(1), DVec3::new(0.0, 1.0, 0.0), 30.0)
            .with_dispersion(DispersionData::symmetric_degrees(1.0, 1.0, DispersionDistribution::Gaussian));
        let mut ammo = ItemStack::new(ARROW, 3);

        let outcome = launcher
            .fire(DVec3::new(20.0, 1.0, 0.0), DVec3::ZERO, &mut ammo, &registry(), &mut server, &mut rng)
            .expect("spawn");
        let FireOutcome::Fired { projectile, .. } = outcome else {
            panic!("expected to fire, got {outcome:?}");
        };
        assert_eq!(ammo.count(), 2);
        let entity = server.get(projectile).expect("registered");
        assert!((entity.speed() - 30.0).abs() < 1e-6);
        assert_eq!(entity.projectile_stack.as_ref().map(ItemStack::count), Some(1));
    }

    #[test]
    fn test_missing_stats_aborts() {
        let mut server = server();
        let mut rng = fastrand::Rng::with_seed(8);
        let launcher = Launcher::new(EntityId::from_raw(1), DVec3::ZERO, 30.0);
        let mut rocks = ItemStack::new(ItemTypeId::new(99), 5);

        let outcome = launcher
            .fire(DVec3::new(10.0, 0.0, 0.0), DVec3::ZERO, &mut rocks, &registry(), &mut server, &mut rng)
            .expect("no spawn error");
        assert_eq!(outcome, FireOutcome::MissingStats(ItemTypeId::new(99)));
        assert_eq!(rocks.count(), 5);
        assert!(server.is_empty());
    }

    #[test]
    fn test_unreachable_target_skips_fire() {
        let mut server = server();
        let mut rng = fastrand::Rng::with_seed(8);
        let launcher = Launcher::new(EntityId::from_raw(1), DVec3::ZERO, 5.0);
        let mut ammo = ItemStack::new(ARROW, 1);

        let outcome = launcher
            .fire(DVec3::new(0.0, 0.0, 0.0), DVec3::ZERO, &mut ammo, &registry(), &mut server, &mut rng)
            .expect("no spawn error");
        assert_eq!(outcome, FireOutcome::NoSolution);
        assert_eq!(ammo.count(), 1);
        assert!(server.is_empty());
    }

    #[test]
    fn test_empty_ammo() {
        let mut server = server();
        let mut rng = fastrand::Rng::with_seed(8);
        let launcher = Launcher::new(EntityId::from_raw(1), DVec3::ZERO, 30.0);
        let mut ammo = ItemStack::new(ARROW, 0);

        let outcome = launcher
            .fire(DVec3::new(10.0, 0.0, 0.0), DVec3::ZERO, &mut ammo, &registry(), &mut server, &mut rng)
            .expect("no spawn error");
        assert_eq!(outcome, FireOutcome::OutOfAmmo);
    }
}
