//! Terrain queries for flying projectiles.
//!
//! The [`Terrain`] trait is the seam between projectile physics and whatever
//! world representation the host uses. [`BlockTerrain`] is a unit-block
//! implementation used by the simulator and tests.

use ahash::AHashSet;

use ballista_common::ProjectileId;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::collision::{sweep_aabb, Aabb};

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a world position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn containing(position: DVec3) -> Self {
        let p = position.floor();
        Self::new(p.x as i32, p.y as i32, p.z as i32)
    }

    /// World-space bounds of the block.
    #[must_use]
    pub fn bounds(self) -> Aabb {
        let min = DVec3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z));
        Aabb::new(min, min + DVec3::ONE)
    }
}

/// Where a swept projectile first touches terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainContact {
    /// Projectile centre at contact.
    pub position: DVec3,
    /// Axis-aligned surface normal.
    pub normal: DVec3,
    /// Block that was struck.
    pub block: BlockPos,
    /// Fraction of the sweep travelled before contact.
    pub t: f64,
}

/// World geometry a projectile can collide with.
pub trait Terrain {
    /// Sweep a sphere of `radius` from `from` to `to` and report the first contact.
    fn sweep(&self, from: DVec3, to: DVec3, radius: f64) -> Option<TerrainContact>;

    /// Notify the struck block of a projectile impact.
    fn on_projectile_collide(&mut self, _block: BlockPos, _projectile: ProjectileId, _velocity: DVec3) {}
}

/// Unit-block terrain with an optional solid ground below `ground_level`.
#[derive(Debug, Clone, Default)]
pub struct BlockTerrain {
    solid: AHashSet<BlockPos>,
    ground_level: Option<i32>,
    impacts: Vec<(BlockPos, ProjectileId)>,
}

impl BlockTerrain {
    /// Create empty terrain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every block with `y < level` solid.
    #[must_use]
    pub fn with_ground_level(mut self, level: i32) -> Self {
        self.ground_level = Some(level);
        self
    }

    /// Add a solid block (builder).
    #[must_use]
    pub fn with_block(mut self, pos: BlockPos) -> Self {
        self.set_solid(pos, true);
        self
    }

    /// Set or clear a solid block.
    pub fn set_solid(&mut self, pos: BlockPos, solid: bool) {
        if solid {
            self.solid.insert(pos);
        } else {
            self.solid.remove(&pos);
        }
    }

    /// Check if a block is solid.
    #[must_use]
    pub fn is_solid(&self, pos: BlockPos) -> bool {
        self.solid.contains(&pos) || self.ground_level.is_some_and(|level| pos.y < level)
    }

    /// Impacts reported through [`Terrain::on_projectile_collide`].
    #[must_use]
    pub fn impacts(&self) -> &[(BlockPos, ProjectileId)] {
        &self.impacts
    }
}

impl Terrain for BlockTerrain {
    fn sweep(&self, from: DVec3, to: DVec3, radius: f64) -> Option<TerrainContact> {
        let lo = BlockPos::containing(from.min(to) - DVec3::splat(radius));
        let hi = BlockPos::containing(from.max(to) + DVec3::splat(radius));

        let mut best: Option<TerrainContact> = None;
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let block = BlockPos::new(x, y, z);
                    if !self.is_solid(block) {
                        continue;
                    }
                    let Some(hit) = sweep_aabb(from, to, &block.bounds().expanded(radius)) else {
                        continue;
                    };
                    if best.map_or(true, |b| hit.t < b.t) {
                        best = Some(TerrainContact {
                            position: hit.point,
                            normal: hit.normal,
                            block,
                            t: hit.t,
                        });
                    }
                }
            }
        }
        best
    }

    fn on_projectile_collide(&mut self, block: BlockPos, projectile: ProjectileId, velocity: DVec3) {
        trace!("Projectile {} struck block {:?} at {:.2} m/s", projectile, block, velocity.length());
        self.impacts.push((block, projectile));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_contact() {
        let terrain = BlockTerrain::new().with_ground_level(0);
        let contact = terrain
            .sweep(DVec3::new(0.5, 1.0, 0.5), DVec3::new(0.5, -1.0, 0.5), 0.1)
            .expect("should hit ground");
        assert_eq!(contact.normal, DVec3::Y);
        assert!((contact.position.y - 0.1).abs() < 1e-9);
        assert_eq!(contact.block.y, -1);
    }

    #[test]
    fn test_wall_contact_picks_nearest() {
        let terrain = BlockTerrain::new()
            .with_block(BlockPos::new(3, 0, 0))
            .with_block(BlockPos::new(5, 0, 0));
        let contact = terrain
            .sweep(DVec3::new(0.0, 0.5, 0.5), DVec3::new(8.0, 0.5, 0.5), 0.0)
            .expect("should hit wall");
        assert_eq!(contact.block, BlockPos::new(3, 0, 0));
        assert_eq!(contact.normal, DVec3::NEG_X);
    }

    #[test]
    fn test_open_air() {
        let terrain = BlockTerrain::new().with_ground_level(-10);
        assert!(terrain
            .sweep(DVec3::new(0.0, 5.0, 0.0), DVec3::new(3.0, 4.0, 0.0), 0.2)
            .is_none());
    }

    #[test]
    fn test_collide_hook_records_impact() {
        let mut terrain = BlockTerrain::new();
        let id = ProjectileId::from_u128(4);
        terrain.on_projectile_collide(BlockPos::new(1, 2, 3), id, DVec3::X);
        assert_eq!(terrain.impacts(), &[(BlockPos::new(1, 2, 3), id)]);
    }

    #[test]
    fn test_block_containing_negative() {
        assert_eq!(BlockPos::containing(DVec3::new(-0.5, 0.0, 1.9)), BlockPos::new(-1, 0, 1));
    }
}
