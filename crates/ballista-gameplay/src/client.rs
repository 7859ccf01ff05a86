//! Client-side projectile registry and narrow-phase hit scanning.
//!
//! The client mirrors replicated projectile state and answers collision check
//! requests by sweeping the last tick's path through nearby creatures. At most
//! one hit is reported per request.

use std::collections::BTreeMap;

use ballista_common::{ProjectileId, ProtocolError};
use ballista_kernel::collision::{resolve_penetration, sweep_aabb, ColliderTypeRegistry};
use glam::DVec3;
use tracing::{debug, trace, warn};

use crate::config::ProtocolConfig;
use crate::protocol::{
    ClientMessage, ProjectileCollisionCheckRequest, ProjectileCollisionPacket, ProjectileSyncState, ServerMessage,
};
use crate::transport::ClientLink;
use crate::world::{Creature, CreatureQuery};

/// Counts from one client poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Check requests received.
    pub requests: usize,
    /// Collision packets sent.
    pub hits: usize,
}

/// Client projectile registry.
#[derive(Debug)]
pub struct ClientProjectileRegistry<L: ClientLink> {
    link: L,
    protocol: ProtocolConfig,
    colliders: ColliderTypeRegistry,
    mirrors: BTreeMap<ProjectileId, ProjectileSyncState>,
}

impl<L: ClientLink> ClientProjectileRegistry<L> {
    /// Create a registry.
    #[must_use]
    pub fn new(link: L, protocol: ProtocolConfig, colliders: ColliderTypeRegistry) -> Self {
        Self {
            link,
            protocol,
            colliders,
            mirrors: BTreeMap::new(),
        }
    }

    /// Mirror replicated state.
    pub fn track(&mut self, state: ProjectileSyncState) {
        self.mirrors.insert(state.projectile_id, state);
    }

    /// Mirrored state of a projectile.
    #[must_use]
    pub fn mirror(&self, id: ProjectileId) -> Option<&ProjectileSyncState> {
        self.mirrors.get(&id)
    }

    /// Number of mirrored projectiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Check if nothing is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Handle every pending server message.
    pub fn poll(&mut self, creatures: &dyn CreatureQuery) -> PollSummary {
        let mut summary = PollSummary::default();
        loop {
            let message = match self.link.try_receive() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(ProtocolError::Disconnected) => {
                    debug!("Server link disconnected");
                    break;
                },
                Err(e) => {
                    warn!("Dropping server frame: {}", e);
                    continue;
                },
            };

            match message {
                ServerMessage::CollisionCheck(request) => {
                    summary.requests += 1;
                    if let Some(packet) = self.scan(&request, creatures) {
                        match self.link.send(&ClientMessage::Collision(packet)) {
                            Ok(()) => summary.hits += 1,
                            Err(e) => warn!("Failed to report collision: {}", e),
                        }
                    }
                },
                ServerMessage::Sync(state) => self.track(state),
                ServerMessage::Despawn(id) => {
                    self.mirrors.remove(&id);
                },
            }
        }
        summary
    }

    /// Sweep a request's path through nearby creatures.
    ///
    /// Returns the packet for the first creature hit, if any.
    #[must_use]
    pub fn scan(
        &self,
        request: &ProjectileCollisionCheckRequest,
        creatures: &dyn CreatureQuery,
    ) -> Option<ProjectileCollisionPacket> {
        let Some(mirror) = self.mirrors.get(&request.projectile_id) else {
            debug!("Check request for untracked projectile {}", request.projectile_id);
            return None;
        };

        let current = request.current();
        let previous = request.previous();
        let velocity = request.velocity();
        let radius = f64::from(request.radius);
        let extension = velocity.try_normalize().unwrap_or(DVec3::ZERO) * f64::from(request.penetration_distance);
        let sweep_end = current + extension;
        let scan_radius = previous.distance(sweep_end) + radius + self.protocol.scan_padding;

        let mut candidates: Vec<&Creature> = creatures
            .creatures_near(current, scan_radius)
            .into_iter()
            .filter(|c| c.entity != request.projectile_entity_id)
            .filter(|c| request.collide_with_shooter || c.entity != mirror.shooter_id)
            .filter(|c| !request.ignore_entities.contains(&c.entity))
            .collect();
        candidates.sort_by(|a, b| {
            a.position
                .distance_squared(previous)
                .total_cmp(&b.position.distance_squared(previous))
        });

        for creature in candidates {
            let Some((point, collider, loss)) =
                self.narrow_phase(creature, previous, sweep_end, radius, request.penetration_strength)
            else {
                continue;
            };

            trace!(
                "Projectile {} hit {} on '{}' (loss {:.2})",
                request.projectile_id,
                creature.entity,
                collider,
                loss
            );
            return Some(ProjectileCollisionPacket {
                id: request.projectile_id,
                collision_point: point.to_array(),
                after_collision_velocity: creature.velocity.to_array(),
                relative_speed: (creature.velocity - velocity).length(),
                collider,
                receiver_entity: creature.entity,
                packet_version: request.packet_version,
                penetration_strength_loss: loss,
            });
        }
        None
    }

    fn narrow_phase(
        &self,
        creature: &Creature,
        from: DVec3,
        to: DVec3,
        radius: f64,
        strength: f32,
    ) -> Option<(DVec3, String, f32)> {
        match &creature.parts {
            Some(parts) => {
                match resolve_penetration(
                    creature.entity,
                    parts,
                    creature.position,
                    from,
                    to,
                    radius,
                    strength,
                    &self.colliders,
                ) {
                    Ok(result) => result.map(|r| (r.point, r.collider, r.loss)),
                    Err(e) => {
                        warn!("Skipping creature with bad colliders: {}", e);
                        None
                    },
                }
            },
            None => {
                let hit = sweep_aabb(from, to, &creature.world_bounds().expanded(radius))?;
                let loss = self.protocol.default_penetration_cost.min(strength);
                Some((hit.point, self.protocol.bounding_collider.clone(), loss))
            },
        }
    }
}
