//! Server-side projectile registry.
//!
//! Owns every live [`ProjectileController`], keyed by projectile id, and the
//! server end of the link. Each tick it:
//! 1. Applies pending collision packets from clients
//! 2. Steps projectile physics against the terrain
//! 3. Removes projectiles that broke, and issues collision check requests
//!
//! Messages for ids no longer registered are ignored.

use std::collections::BTreeMap;

use ballista_common::{BallistaResult, EntityId, ProjectileError, ProjectileId, ProtocolError, SchemaVersion};
use ballista_kernel::item_stack::ItemStack;
use ballista_kernel::projectile::{FlightConfig, FlightEvent, FlightState, ProjectileEntity};
use ballista_kernel::terrain::Terrain;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProtocolConfig;
use crate::controller::{CollisionOutcome, HitContext, ProjectileController};
use crate::damage::{DamageHooks, PermissionService};
use crate::events::{ProjectileEvent, ProjectileEventBus};
use crate::protocol::{ClientMessage, ProjectileCollisionPacket, ProjectileSyncState, ServerMessage};
use crate::stats::{ProjectileSpawnStats, ProjectileStats};
use crate::transport::ServerLink;
use crate::world::CombatWorld;

/// Saved projectile, enough to resume it after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    /// Snapshot layout version.
    pub version: SchemaVersion,
    /// Replicated fields.
    pub state: ProjectileSyncState,
    /// World entity id.
    pub entity_id: EntityId,
    /// Position.
    pub position: DVec3,
    /// Velocity.
    pub velocity: DVec3,
    /// Remaining penetration strength.
    pub penetration_strength: f32,
    /// Shot damage multiplier.
    pub damage_multiplier: f32,
    /// Shot tier adjustment.
    pub tier_delta: i32,
}

/// Counts from one server tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Collision packets received.
    pub packets: usize,
    /// Packets that advanced a packet version.
    pub accepted: usize,
    /// Check requests sent.
    pub requests: usize,
    /// Projectiles removed.
    pub removed: usize,
}

/// Authoritative projectile registry.
#[derive(Debug)]
pub struct ServerProjectileRegistry<L: ServerLink> {
    link: L,
    flight: FlightConfig,
    protocol: ProtocolConfig,
    controllers: BTreeMap<ProjectileId, ProjectileController>,
    next_entity_id: i64,
    rng: fastrand::Rng,
    events: ProjectileEventBus,
    hooks: DamageHooks,
}

fn send_or_warn<L: ServerLink>(link: &L, recipient: EntityId, message: &ServerMessage) {
    if let Err(e) = link.send(recipient, message) {
        warn!("Failed to send projectile message to {}: {}", recipient, e);
    }
}

impl<L: ServerLink> ServerProjectileRegistry<L> {
    /// Create a registry; `seed` drives drop-chance rolls.
    #[must_use]
    pub fn new(link: L, flight: FlightConfig, protocol: ProtocolConfig, seed: u64) -> Self {
        let next_entity_id = protocol.entity_id_base;
        Self {
            link,
            flight,
            protocol,
            controllers: BTreeMap::new(),
            next_entity_id,
            rng: fastrand::Rng::with_seed(seed),
            events: ProjectileEventBus::default(),
            hooks: DamageHooks::new(),
        }
    }

    /// Event bus.
    #[must_use]
    pub fn events(&self) -> &ProjectileEventBus {
        &self.events
    }

    /// Pre-damage hooks.
    pub fn hooks_mut(&mut self) -> &mut DamageHooks {
        &mut self.hooks
    }

    /// Flight tuning.
    #[must_use]
    pub fn flight(&self) -> &FlightConfig {
        &self.flight
    }

    /// Server end of the link.
    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Look up a projectile.
    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&ProjectileEntity> {
        self.controllers.get(&id).map(ProjectileController::entity)
    }

    /// Look up a controller.
    #[must_use]
    pub fn controller(&self, id: ProjectileId) -> Option<&ProjectileController> {
        self.controllers.get(&id)
    }

    /// Registered projectile ids, in order.
    pub fn ids(&self) -> impl Iterator<Item = ProjectileId> + '_ {
        self.controllers.keys().copied()
    }

    /// Number of live projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Check if no projectiles are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId::from_raw(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Create and register a projectile.
    pub fn spawn(
        &mut self,
        id: ProjectileId,
        stats: ProjectileStats,
        spawn: ProjectileSpawnStats,
        projectile_stack: Option<ItemStack>,
        weapon_stack: Option<ItemStack>,
        shooter: EntityId,
    ) -> Result<EntityId, ProjectileError> {
        if self.controllers.contains_key(&id) {
            return Err(ProjectileError::DuplicateId(id));
        }

        let entity_id = self.allocate_entity_id();
        let controller =
            ProjectileController::spawn(id, entity_id, stats, spawn, projectile_stack, weapon_stack, shooter);
        debug!("Spawned projectile {} as {} for {}", id, entity_id, shooter);

        send_or_warn(&self.link, shooter, &ServerMessage::Sync(controller.sync_state()));
        self.events.publish(ProjectileEvent::Spawned {
            projectile: id,
            entity: entity_id,
            position: spawn.position,
        });
        self.controllers.insert(id, controller);
        Ok(entity_id)
    }

    /// Save a projectile.
    #[must_use]
    pub fn snapshot(&self, id: ProjectileId) -> Option<ProjectileSnapshot> {
        let controller = self.controllers.get(&id)?;
        let entity = controller.entity();
        let spawn = controller.spawn_stats();
        Some(ProjectileSnapshot {
            version: SchemaVersion::PROJECTILE_STATE,
            state: controller.sync_state(),
            entity_id: entity.entity_id,
            position: entity.position,
            velocity: entity.velocity,
            penetration_strength: entity.penetration_strength(),
            damage_multiplier: spawn.damage_multiplier,
            tier_delta: spawn.tier_delta,
        })
    }

    /// Resume a saved projectile. Stuck projectiles stay stuck.
    ///
    /// Fails for snapshots written by an incompatible state version and for
    /// ids that are already registered.
    pub fn restore(&mut self, snapshot: &ProjectileSnapshot, stats: ProjectileStats) -> BallistaResult<()> {
        if !snapshot.version.is_compatible_with(&SchemaVersion::PROJECTILE_STATE) {
            return Err(ProtocolError::VersionMismatch {
                expected: SchemaVersion::PROJECTILE_STATE.to_string(),
                actual: snapshot.version.to_string(),
            }
            .into());
        }
        let state = &snapshot.state;
        if self.controllers.contains_key(&state.projectile_id) {
            return Err(ProjectileError::DuplicateId(state.projectile_id).into());
        }

        let mut entity = ProjectileEntity::new(
            state.projectile_id,
            snapshot.entity_id,
            snapshot.position,
            snapshot.velocity,
            snapshot.penetration_strength,
        )
        .with_shooter(state.shooter_id, state.owner_id)
        .with_stacks(state.projectile_stack.clone(), state.weapon_stack.clone())
        .with_radius(stats.radius)
        .with_drop_chance(stats.drop_chance)
        .with_collectible(state.can_be_collected)
        .with_ignore_invulnerability(state.ignore_inv_frames);
        if state.stuck {
            entity.apply_state(snapshot.position, snapshot.velocity, FlightState::Stuck);
        }

        let spawn = ProjectileSpawnStats::new(state.owner_id, snapshot.position, snapshot.velocity)
            .with_damage_multiplier(snapshot.damage_multiplier)
            .with_tier_delta(snapshot.tier_delta);
        send_or_warn(&self.link, state.shooter_id, &ServerMessage::Sync(state.clone()));
        debug!("Restored projectile {} (stuck: {})", state.projectile_id, state.stuck);
        self.controllers
            .insert(state.projectile_id, ProjectileController::from_entity(entity, stats, spawn));
        Ok(())
    }

    /// Validate and apply one collision packet.
    ///
    /// Returns `None` if the projectile is not registered.
    pub fn handle_packet(
        &mut self,
        packet: &ProjectileCollisionPacket,
        world: &mut dyn CombatWorld,
        permissions: &dyn PermissionService,
    ) -> Option<CollisionOutcome> {
        let Some(controller) = self.controllers.get_mut(&packet.id) else {
            debug!("Collision packet for unknown projectile {}", packet.id);
            return None;
        };

        let mut ctx = HitContext {
            world,
            permissions,
            hooks: &self.hooks,
            events: &self.events,
        };
        let outcome = controller.handle_collision(packet, &mut ctx);
        if outcome.is_accepted() {
            send_or_warn(
                &self.link,
                controller.entity().shooter_id,
                &ServerMessage::Sync(controller.sync_state()),
            );
        }
        Some(outcome)
    }

    /// Apply every pending client message. Returns (received, accepted).
    pub fn process_incoming(
        &mut self,
        world: &mut dyn CombatWorld,
        permissions: &dyn PermissionService,
    ) -> (usize, usize) {
        let mut received = 0;
        let mut accepted = 0;
        loop {
            match self.link.try_receive() {
                Ok(Some(ClientMessage::Collision(packet))) => {
                    received += 1;
                    if self
                        .handle_packet(&packet, world, permissions)
                        .is_some_and(|outcome| outcome.is_accepted())
                    {
                        accepted += 1;
                    }
                },
                Ok(None) => break,
                Err(ProtocolError::Disconnected) => {
                    debug!("Client link disconnected");
                    break;
                },
                Err(e) => warn!("Dropping client frame: {}", e),
            }
        }
        (received, accepted)
    }

    /// Run one server tick of `dt` seconds.
    pub fn tick(
        &mut self,
        dt: f64,
        terrain: &mut dyn Terrain,
        world: &mut dyn CombatWorld,
        permissions: &dyn PermissionService,
    ) -> TickSummary {
        let (packets, accepted) = self.process_incoming(world, permissions);

        let mut dead = Vec::new();
        let mut flew = Vec::with_capacity(self.controllers.len());
        for (id, controller) in &mut self.controllers {
            if controller.entity().is_alive() && !controller.entity().is_stuck() {
                flew.push(*id);
            }
            let flight_events = controller.entity_mut().step(dt, &self.flight, terrain, &mut self.rng);
            for event in flight_events {
                match event {
                    FlightEvent::Ricocheted { position, velocity } => {
                        self.events.publish(ProjectileEvent::Ricocheted {
                            projectile: *id,
                            position,
                            velocity,
                        });
                    },
                    FlightEvent::Embedded { position, block, .. } => {
                        debug!("Projectile {} embedded in terrain at {:?}", id, block);
                        send_or_warn(
                            &self.link,
                            controller.entity().shooter_id,
                            &ServerMessage::Sync(controller.sync_state()),
                        );
                        self.events.publish(ProjectileEvent::Embedded {
                            projectile: *id,
                            position,
                            block: Some(block),
                            entity: None,
                        });
                    },
                    FlightEvent::ImpactSound { position, speed } => {
                        self.events.publish(ProjectileEvent::ImpactSound {
                            projectile: *id,
                            position,
                            speed,
                            sound: controller.stats().impact_sound.clone(),
                        });
                    },
                    FlightEvent::Broken { position } => {
                        self.events.publish(ProjectileEvent::Broken {
                            projectile: *id,
                            position,
                        });
                    },
                }
            }
            if !controller.entity().is_alive() {
                dead.push(*id);
            }
        }

        let removed = dead.len();
        for id in dead {
            self.remove(id);
        }

        let mut requests = 0;
        for (id, controller) in &mut self.controllers {
            if let Some(request) = controller.poll_request(&self.protocol, flew.binary_search(id).is_ok()) {
                send_or_warn(
                    &self.link,
                    controller.entity().shooter_id,
                    &ServerMessage::CollisionCheck(request),
                );
                requests += 1;
            }
        }

        TickSummary {
            packets,
            accepted,
            requests,
            removed,
        }
    }

    /// Pick up a projectile, removing it and yielding its stack.
    ///
    /// Returns `None` and leaves the projectile in place if it cannot be collected.
    pub fn collect(&mut self, id: ProjectileId, collector: EntityId) -> Option<ItemStack> {
        let controller = self.controllers.get_mut(&id)?;
        if !controller.entity().can_collect(&self.flight) {
            return None;
        }
        let stack = controller.entity_mut().collect(&self.flight);
        let shooter = controller.entity().shooter_id;
        self.controllers.remove(&id);

        send_or_warn(&self.link, shooter, &ServerMessage::Despawn(id));
        self.events.publish(ProjectileEvent::Collected {
            projectile: id,
            collector,
            stack: stack.clone(),
        });
        stack
    }

    /// Remove a projectile. Returns `false` if it was not registered.
    pub fn despawn(&mut self, id: ProjectileId) -> bool {
        let removed = self.remove(id);
        if removed {
            debug!("Despawned projectile {}", id);
        }
        removed
    }

    fn remove(&mut self, id: ProjectileId) -> bool {
        let Some(controller) = self.controllers.remove(&id) else {
            return false;
        };
        send_or_warn(&self.link, controller.entity().shooter_id, &ServerMessage::Despawn(id));
        self.events.publish(ProjectileEvent::Despawned { projectile: id });
        true
    }
}
