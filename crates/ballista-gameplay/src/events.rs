//! Projectile event bus.
//!
//! Sound and visual effect systems subscribe here instead of being called
//! directly by the simulation.

use ballista_common::{EntityId, ProjectileId};
use ballista_kernel::item_stack::ItemStack;
use ballista_kernel::terrain::BlockPos;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Something observable happened to a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectileEvent {
    /// Projectile spawned
    Spawned {
        /// Projectile
        projectile: ProjectileId,
        /// Assigned entity id
        entity: EntityId,
        /// Launch position
        position: DVec3,
    },
    /// Bounced off terrain
    Ricocheted {
        /// Projectile
        projectile: ProjectileId,
        /// Position after the bounce
        position: DVec3,
        /// Velocity after the bounce
        velocity: DVec3,
    },
    /// Embedded in terrain or a body
    Embedded {
        /// Projectile
        projectile: ProjectileId,
        /// Resting position
        position: DVec3,
        /// Struck block, if terrain
        block: Option<BlockPos>,
        /// Struck entity, if a body
        entity: Option<EntityId>,
    },
    /// Terrain impact sound
    ImpactSound {
        /// Projectile
        projectile: ProjectileId,
        /// Where
        position: DVec3,
        /// Impact speed
        speed: f64,
        /// Configured sound
        sound: Option<String>,
    },
    /// Broke on impact
    Broken {
        /// Projectile
        projectile: ProjectileId,
        /// Where
        position: DVec3,
    },
    /// Damage was applied to an entity
    Hit {
        /// Projectile
        projectile: ProjectileId,
        /// Struck entity
        target: EntityId,
        /// Final damage amount
        damage: f32,
        /// Struck part key
        collider: String,
        /// Impact point
        position: DVec3,
        /// Configured sound
        sound: Option<String>,
    },
    /// Passed through an entity and kept flying
    Penetrated {
        /// Projectile
        projectile: ProjectileId,
        /// Struck entity
        target: EntityId,
        /// Strength left afterwards
        remaining_strength: f32,
    },
    /// Picked up
    Collected {
        /// Projectile
        projectile: ProjectileId,
        /// Collecting entity
        collector: EntityId,
        /// Returned stack
        stack: Option<ItemStack>,
    },
    /// Removed from the world
    Despawned {
        /// Projectile
        projectile: ProjectileId,
    },
}

/// Default number of undrained events kept.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Queue of projectile events drained once per tick.
///
/// Publishing never blocks. Once `capacity` events are waiting, newer
/// events are dropped until the queue is drained.
#[derive(Debug)]
pub struct ProjectileEventBus {
    queue: Sender<ProjectileEvent>,
    pending: Receiver<ProjectileEvent>,
}

impl Default for ProjectileEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl ProjectileEventBus {
    /// Create a bus holding at most `capacity` undrained events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (queue, pending) = bounded(capacity);
        Self { queue, pending }
    }

    /// Queue an event.
    ///
    /// Returns `false` if the bus was full and the event was dropped.
    pub fn publish(&self, event: ProjectileEvent) -> bool {
        match self.queue.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!("Event bus full, dropping {:?}", event);
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<ProjectileEvent> {
        self.pending.try_iter().collect()
    }
}
