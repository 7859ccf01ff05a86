//! Per-projectile authoritative hit resolution.
//!
//! A [`ProjectileController`] owns one live [`ProjectileEntity`] on the server
//! together with its packet-version counter. Collision packets are accepted
//! only when they echo the current version; each accepted packet advances the
//! version by one, so duplicated, replayed or reordered packets fall through
//! as no-ops.

use ballista_common::{EntityId, ProjectileId};
use ballista_kernel::item_stack::ItemStack;
use ballista_kernel::projectile::ProjectileEntity;
use glam::DVec3;
use tracing::{debug, trace};

use crate::config::ProtocolConfig;
use crate::damage::{is_permitted, DamageEvent, DamageHooks, DamageOutcome, DamageSkip, DamageSource, PermissionService};
use crate::events::{ProjectileEvent, ProjectileEventBus};
use crate::protocol::{ProjectileCollisionCheckRequest, ProjectileCollisionPacket, ProjectileSyncState};
use crate::stats::{ProjectileSpawnStats, ProjectileStats};
use crate::world::CombatWorld;

/// What happened to a collision packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionOutcome {
    /// Version did not match; nothing changed.
    Stale {
        /// Version the controller expected.
        expected: i32,
        /// Version the packet carried.
        actual: i32,
    },
    /// Receiver was already hit by this projectile; nothing changed.
    AlreadyHit(EntityId),
    /// Receiver no longer exists; version advanced, no damage or penetration change.
    TargetMissing,
    /// Hit accepted.
    Accepted {
        /// Damage resolution.
        damage: DamageOutcome,
        /// Penetration strength left.
        remaining_strength: f32,
        /// Projectile embedded in the receiver.
        embedded: bool,
    },
}

impl CollisionOutcome {
    /// Check if the packet advanced the version.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::TargetMissing | Self::Accepted { .. })
    }
}

/// Collaborators needed to resolve a hit.
pub struct HitContext<'a> {
    /// Authoritative entity state.
    pub world: &'a mut dyn CombatWorld,
    /// Attack privilege checks.
    pub permissions: &'a dyn PermissionService,
    /// Pre-damage modifiers.
    pub hooks: &'a DamageHooks,
    /// Event sink.
    pub events: &'a ProjectileEventBus,
}

/// Server-side owner of one projectile.
#[derive(Debug, Clone)]
pub struct ProjectileController {
    entity: ProjectileEntity,
    stats: ProjectileStats,
    spawn: ProjectileSpawnStats,
    packet_version: i32,
    ticks_since_request: u32,
}

impl ProjectileController {
    /// Build the entity for a fresh shot.
    #[must_use]
    pub fn spawn(
        id: ProjectileId,
        entity_id: EntityId,
        stats: ProjectileStats,
        spawn: ProjectileSpawnStats,
        projectile_stack: Option<ItemStack>,
        weapon_stack: Option<ItemStack>,
        shooter: EntityId,
    ) -> Self {
        let owner = if spawn.producer.is_valid() {
            spawn.producer
        } else {
            shooter
        };
        let entity = ProjectileEntity::new(id, entity_id, spawn.position, spawn.velocity, stats.penetration_bonus)
            .with_shooter(shooter, owner)
            .with_stacks(projectile_stack, weapon_stack)
            .with_radius(stats.radius)
            .with_drop_chance(stats.drop_chance)
            .with_collectible(stats.collectible)
            .with_ignore_invulnerability(stats.ignore_invulnerability);
        Self::from_entity(entity, stats, spawn)
    }

    /// Wrap an existing entity (restored from saved state).
    #[must_use]
    pub fn from_entity(entity: ProjectileEntity, stats: ProjectileStats, spawn: ProjectileSpawnStats) -> Self {
        Self {
            entity,
            stats,
            spawn,
            packet_version: 0,
            ticks_since_request: 0,
        }
    }

    /// The projectile.
    #[must_use]
    pub fn entity(&self) -> &ProjectileEntity {
        &self.entity
    }

    /// The projectile, mutably.
    pub fn entity_mut(&mut self) -> &mut ProjectileEntity {
        &mut self.entity
    }

    /// Item stats.
    #[must_use]
    pub fn stats(&self) -> &ProjectileStats {
        &self.stats
    }

    /// Shot values.
    #[must_use]
    pub fn spawn_stats(&self) -> &ProjectileSpawnStats {
        &self.spawn
    }

    /// Version the next collision packet must carry.
    #[must_use]
    pub fn packet_version(&self) -> i32 {
        self.packet_version
    }

    /// Replicated state.
    #[must_use]
    pub fn sync_state(&self) -> ProjectileSyncState {
        ProjectileSyncState {
            shooter_id: self.entity.shooter_id,
            projectile_id: self.entity.id,
            projectile_stack: self.entity.projectile_stack.clone(),
            weapon_stack: self.entity.weapon_stack.clone(),
            owner_id: self.entity.owner_id,
            ignore_inv_frames: self.entity.ignore_invulnerability,
            can_be_collected: self.entity.can_be_collected,
            stuck: self.entity.is_stuck(),
        }
    }

    /// Build a check request from the current state.
    ///
    /// A projectile that stopped in terrain reports the velocity it had
    /// before contact, so the scan direction still follows the segment.
    #[must_use]
    pub fn build_request(&self, config: &ProtocolConfig) -> ProjectileCollisionCheckRequest {
        let entity = &self.entity;
        let velocity = if entity.is_stuck() {
            entity.previous_velocity
        } else {
            entity.velocity
        };
        ProjectileCollisionCheckRequest {
            projectile_id: entity.id,
            projectile_entity_id: entity.entity_id,
            current_position: entity.position.to_array(),
            previous_position: entity.previous_position.to_array(),
            velocity: velocity.to_array(),
            radius: entity.radius as f32,
            penetration_distance: self.stats.penetration_distance + config.penetration_offset,
            penetration_strength: entity.penetration_strength(),
            collide_with_shooter: self.stats.collide_with_shooter,
            ignore_entities: entity.already_hit().collect(),
            packet_version: self.packet_version,
        }
    }

    /// Next check request, honouring the request interval.
    ///
    /// `flew` says whether the projectile was flying when the tick started;
    /// a tick that ended in a terrain embed still gets its segment scanned.
    /// Returns `None` for destroyed projectiles and ones stuck all tick.
    pub fn poll_request(&mut self, config: &ProtocolConfig, flew: bool) -> Option<ProjectileCollisionCheckRequest> {
        if !flew || !self.entity.is_alive() {
            return None;
        }
        self.ticks_since_request += 1;
        if self.ticks_since_request < config.request_interval_ticks.max(1) {
            return None;
        }
        self.ticks_since_request = 0;
        Some(self.build_request(config))
    }

    /// Validate and apply a collision packet.
    pub fn handle_collision(&mut self, packet: &ProjectileCollisionPacket, ctx: &mut HitContext<'_>) -> CollisionOutcome {
        if packet.packet_version != self.packet_version {
            trace!(
                "Dropping stale packet for {}: expected version {}, got {}",
                self.entity.id,
                self.packet_version,
                packet.packet_version
            );
            return CollisionOutcome::Stale {
                expected: self.packet_version,
                actual: packet.packet_version,
            };
        }

        let receiver = packet.receiver_entity;
        if self.entity.has_hit(receiver) {
            trace!("Projectile {} already hit {}", self.entity.id, receiver);
            return CollisionOutcome::AlreadyHit(receiver);
        }

        // A report for the segment that ended in terrain leaves it stuck there.
        let in_terrain = self.entity.is_stuck();
        self.packet_version += 1;
        self.entity.mark_hit(receiver);
        if !in_terrain {
            self.entity.release();
        }

        if !ctx.world.exists(receiver) {
            debug!("Projectile {} hit despawned entity {}", self.entity.id, receiver);
            return CollisionOutcome::TargetMissing;
        }

        let damage = self.resolve_damage(packet, ctx);

        if let Some(stack) = self.entity.projectile_stack.as_mut() {
            if stack.damage(self.stats.durability_damage) {
                self.entity.can_be_collected = false;
            }
        }

        let before = self.entity.penetration_strength();
        let remaining = self.entity.consume_penetration(packet.penetration_strength_loss);
        let embedded = remaining <= 0.0;

        if embedded {
            let velocity = ctx.world.velocity(receiver).unwrap_or_else(|| packet.receiver_velocity());
            self.entity.embed_at(packet.point(), velocity);
            debug!("Projectile {} embedded in {}", self.entity.id, receiver);
            ctx.events.publish(ProjectileEvent::Embedded {
                projectile: self.entity.id,
                position: packet.point(),
                block: None,
                entity: Some(receiver),
            });
        } else {
            if !in_terrain && before > 0.0 {
                self.entity.scale_velocity(f64::from(remaining / before));
            }
            ctx.events.publish(ProjectileEvent::Penetrated {
                projectile: self.entity.id,
                target: receiver,
                remaining_strength: remaining,
            });
        }

        CollisionOutcome::Accepted {
            damage,
            remaining_strength: remaining,
            embedded,
        }
    }

    fn resolve_damage(&self, packet: &ProjectileCollisionPacket, ctx: &mut HitContext<'_>) -> DamageOutcome {
        let receiver = packet.receiver_entity;

        if packet.relative_speed < self.stats.min_damage_speed {
            return DamageOutcome::Skipped(DamageSkip::TooSlow);
        }
        if !ctx.world.is_alive(receiver) {
            return DamageOutcome::Skipped(DamageSkip::TargetDead);
        }

        let attacker = self.entity.owner_id;
        if !is_permitted(
            ctx.permissions,
            self.stats.damage_type,
            attacker,
            ctx.world.is_player(attacker),
            receiver,
            ctx.world.is_player(receiver),
        ) {
            debug!("Projectile {} not permitted to damage {}", self.entity.id, receiver);
            return DamageOutcome::Skipped(DamageSkip::NotPermitted);
        }

        let source = DamageSource {
            attacker,
            projectile: self.entity.id,
            damage_type: self.stats.damage_type,
            tier: self.stats.effective_tier(self.spawn.tier_delta),
            position: packet.point(),
            direction: self.entity.velocity.try_normalize().unwrap_or(DVec3::ZERO),
            collider: packet.collider.clone(),
            knockback: self.stats.knockback,
            weapon: self.entity.weapon_stack.clone(),
        };

        let mut amount = self.stats.damage * self.spawn.damage_multiplier;
        ctx.hooks.apply(receiver, &source, &mut amount);

        let event = DamageEvent {
            source,
            amount,
            ignore_invulnerability: self.entity.ignore_invulnerability,
        };
        ctx.world.apply_damage(receiver, &event);

        ctx.events.publish(ProjectileEvent::Hit {
            projectile: self.entity.id,
            target: receiver,
            damage: amount,
            collider: packet.collider.clone(),
            position: packet.point(),
            sound: self.stats.hit_sound.clone(),
        });

        DamageOutcome::Applied(amount)
    }
}
