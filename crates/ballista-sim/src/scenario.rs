//! Turret-versus-creature scenario over a loopback link.
//!
//! Each tick the turret may fire, the server steps every projectile and
//! validates incoming hit reports, and the client scans whatever the server
//! asked about.

use ballista_common::{BallistaResult, EntityId, ItemTypeId, SchemaVersion};
use ballista_gameplay::client::ClientProjectileRegistry;
use ballista_gameplay::damage::AllowAll;
use ballista_gameplay::events::ProjectileEvent;
use ballista_gameplay::launcher::{FireOutcome, Launcher};
use ballista_gameplay::server::ServerProjectileRegistry;
use ballista_gameplay::stats::ProjectileStatsRegistry;
use ballista_gameplay::transport::{loopback_pair, LoopbackClient, LoopbackServer, DEFAULT_LINK_CAPACITY};
use ballista_gameplay::world::{Creature, CreatureWorld};
use ballista_kernel::collision::ColliderTypeRegistry;
use ballista_kernel::item_stack::ItemStack;
use ballista_kernel::terrain::BlockTerrain;
use glam::DVec3;
use tracing::{debug, info};

use crate::config::SimConfig;

/// Turret entity id.
const TURRET: EntityId = EntityId::from_raw(1);

/// First creature entity id.
const CREATURE_BASE: i64 = 100;

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimReport {
    /// Ticks simulated.
    pub ticks: u32,
    /// Projectiles fired.
    pub shots: u32,
    /// Fire attempts without a firing solution.
    pub no_solution: u32,
    /// Hits reported by the client.
    pub hits_reported: usize,
    /// Hits accepted by the server.
    pub hits_accepted: usize,
    /// Terrain ricochets.
    pub ricochets: u32,
    /// Terrain embeds.
    pub terrain_embeds: u32,
    /// Creature embeds.
    pub creature_embeds: u32,
    /// Projectiles broken by the drop roll.
    pub broken: u32,
    /// Creatures killed.
    pub kills: usize,
    /// Projectiles still registered at the end.
    pub remaining: usize,
}

impl SimReport {
    /// Log the totals.
    pub fn log(&self) {
        info!(
            "Simulated {} ticks: {} shots ({} without solution), {}/{} hits accepted",
            self.ticks, self.shots, self.no_solution, self.hits_accepted, self.hits_reported
        );
        info!(
            "Terrain: {} ricochets, {} embeds, {} broken; {} embedded in creatures",
            self.ricochets, self.terrain_embeds, self.broken, self.creature_embeds
        );
        info!("{} creatures killed, {} projectiles remaining", self.kills, self.remaining);
    }

    fn record(&mut self, event: &ProjectileEvent) {
        match event {
            ProjectileEvent::Ricocheted { .. } => self.ricochets += 1,
            ProjectileEvent::Embedded { entity: Some(_), .. } => self.creature_embeds += 1,
            ProjectileEvent::Embedded { block: Some(_), .. } => self.terrain_embeds += 1,
            ProjectileEvent::Broken { .. } => self.broken += 1,
            _ => {},
        }
    }
}

/// Everything a run owns.
pub struct Arena {
    config: SimConfig,
    terrain: BlockTerrain,
    world: CreatureWorld,
    creatures: Vec<EntityId>,
    server: ServerProjectileRegistry<LoopbackServer>,
    client: ClientProjectileRegistry<LoopbackClient>,
    stats: ProjectileStatsRegistry,
    launcher: Launcher,
    ammo: ItemStack,
    rng: fastrand::Rng,
}

impl Arena {
    /// Build the arena described by `config`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let (server_link, client_link) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, DEFAULT_LINK_CAPACITY);
        let server =
            ServerProjectileRegistry::new(server_link, config.flight.clone(), config.protocol.clone(), config.seed);
        let client = ClientProjectileRegistry::new(client_link, config.protocol.clone(), ColliderTypeRegistry::default());

        let mut world = CreatureWorld::new();
        let mut creatures = Vec::with_capacity(config.creatures.len());
        for (i, placed) in (0_i64..).zip(&config.creatures) {
            let entity = EntityId::from_raw(CREATURE_BASE + i);
            let creature = Creature::new(
                entity,
                DVec3::from_array(placed.position),
                DVec3::from_array(placed.half_extents),
            )
            .with_velocity(DVec3::from_array(placed.velocity));
            world.insert(creature, placed.health, false);
            creatures.push(entity);
        }

        let ammo_item = ItemTypeId::new(config.turret.ammo_item);
        let stats = ProjectileStatsRegistry::new().with(ammo_item, config.projectile.clone());
        let launcher = Launcher::new(TURRET, DVec3::from_array(config.turret.position), config.turret.speed)
            .with_dispersion(config.turret.dispersion())
            .with_damage_multiplier(config.turret.damage_multiplier);

        Self {
            terrain: BlockTerrain::new().with_ground_level(config.ground_level),
            world,
            creatures,
            server,
            client,
            stats,
            launcher,
            ammo: ItemStack::new(ammo_item, config.turret.ammo),
            rng: fastrand::Rng::with_seed(config.seed.wrapping_add(1)),
            config,
        }
    }

    /// Creature world, for inspection.
    #[cfg(test)]
    #[must_use]
    pub fn world(&self) -> &CreatureWorld {
        &self.world
    }

    /// Rounds left in the turret.
    #[cfg(test)]
    #[must_use]
    pub fn ammo_left(&self) -> u32 {
        self.ammo.count()
    }

    /// Nearest living creature, lowest id on ties.
    fn pick_target(&self) -> Option<(DVec3, DVec3)> {
        let muzzle = self.launcher.muzzle;
        self.creatures
            .iter()
            .filter_map(|id| self.world.get(*id))
            .filter(|record| record.health > 0.0)
            .map(|record| (record.creature.position, record.creature.velocity))
            .min_by(|a, b| muzzle.distance_squared(a.0).total_cmp(&muzzle.distance_squared(b.0)))
    }

    fn fire(&mut self, report: &mut SimReport) -> BallistaResult<()> {
        let Some((target, velocity)) = self.pick_target() else {
            return Ok(());
        };
        let outcome = self.launcher.fire(
            target,
            velocity,
            &mut self.ammo,
            &self.stats,
            &mut self.server,
            &mut self.rng,
        )?;
        match outcome {
            FireOutcome::Fired { projectile, .. } => {
                debug!("Turret fired {} at {:?}", projectile, target);
                report.shots += 1;
            },
            FireOutcome::NoSolution => report.no_solution += 1,
            FireOutcome::OutOfAmmo | FireOutcome::MissingStats(_) => {},
        }
        Ok(())
    }

    fn expire(&mut self) {
        let lifetime = self.config.projectile_lifetime;
        if lifetime <= 0.0 {
            return;
        }
        let expired: Vec<_> = self
            .server
            .ids()
            .filter(|id| self.server.get(*id).is_some_and(|p| p.age() > lifetime))
            .collect();
        for id in expired {
            self.server.despawn(id);
        }
    }

    /// Run every configured tick.
    pub fn run(&mut self) -> BallistaResult<SimReport> {
        let dt = self.config.dt();
        let interval = self.config.turret.fire_interval_ticks.max(1);
        let mut report = SimReport::default();

        for tick in 0..self.config.ticks {
            self.world.advance(dt);
            if tick % interval == 0 {
                self.fire(&mut report)?;
            }

            let summary = self.server.tick(dt, &mut self.terrain, &mut self.world, &AllowAll);
            report.hits_accepted += summary.accepted;

            let poll = self.client.poll(&self.world);
            report.hits_reported += poll.hits;

            for event in self.server.events().drain() {
                report.record(&event);
            }
            self.expire();
            report.ticks += 1;
        }

        report.kills = self
            .creatures
            .iter()
            .filter(|id| self.world.get(**id).is_some_and(|r| r.health <= 0.0))
            .count();
        report.remaining = self.server.len();
        Ok(report)
    }
}

/// Build an arena from `config` and run it.
pub fn run(config: SimConfig) -> BallistaResult<SimReport> {
    let mut arena = Arena::new(config);
    arena.run()
}
