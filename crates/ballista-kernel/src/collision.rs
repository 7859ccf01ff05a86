//! Swept collision primitives and hit-collider penetration accounting.
//!
//! Provides:
//! - Segment sweeps against axis-aligned boxes and spheres
//! - Named per-part hit colliders with typed penetration resistance
//! - Penetration-loss accounting for a projectile sweeping through a body
//!
//! # Example
//!
//! ```
//! use ballista_kernel::collision::{sweep_aabb, Aabb};
//! use glam::DVec3;
//!
//! let block = Aabb::new(DVec3::new(0.0, 0.0, 0.0), DVec3::new(1.0, 1.0, 1.0));
//! let hit = sweep_aabb(DVec3::new(-1.0, 0.5, 0.5), DVec3::new(2.0, 0.5, 0.5), &block);
//! assert!(hit.is_some());
//! ```

use ahash::AHashMap;

use ballista_common::{EntityId, ProjectileError};
use glam::DVec3;
use serde::{Deserialize, Serialize};

const PARALLEL_EPSILON: f64 = 1e-12;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two corners.
    #[must_use]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a box from its centre and half extents.
    #[must_use]
    pub fn from_center(center: DVec3, half_extents: DVec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Grow the box by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    /// Move the box by `offset`.
    #[must_use]
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Check if a point lies inside or on the box.
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// First contact of a swept segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the segment travelled before contact (0..=1).
    pub t: f64,
    /// Contact point on the segment.
    pub point: DVec3,
    /// Surface normal at the contact.
    pub normal: DVec3,
}

/// Index (0 = x, 1 = y, 2 = z) of the largest absolute component.
#[must_use]
pub fn dominant_axis(v: DVec3) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

fn axis_normal(axis: usize, sign: f64) -> DVec3 {
    let mut normal = DVec3::ZERO;
    normal[axis] = sign;
    normal
}

/// Sweep the segment `from → to` against a box (slab method).
///
/// A segment starting inside the box reports `t = 0` with a normal opposing the
/// dominant direction of travel.
#[must_use]
pub fn sweep_aabb(from: DVec3, to: DVec3, aabb: &Aabb) -> Option<SweepHit> {
    let delta = to - from;
    let mut t_enter = 0.0_f64;
    let mut t_exit = 1.0_f64;
    let mut normal = DVec3::ZERO;

    for axis in 0..3 {
        let origin = from[axis];
        let d = delta[axis];
        let (min, max) = (aabb.min[axis], aabb.max[axis]);

        if d.abs() < PARALLEL_EPSILON {
            if origin < min || origin > max {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let t0 = ((min - origin) * inv).min((max - origin) * inv);
        let t1 = ((min - origin) * inv).max((max - origin) * inv);

        if t0 > t_enter {
            t_enter = t0;
            normal = axis_normal(axis, -d.signum());
        }
        t_exit = t_exit.min(t1);

        if t_enter > t_exit {
            return None;
        }
    }

    if normal == DVec3::ZERO {
        normal = if delta.length_squared() > PARALLEL_EPSILON {
            let axis = dominant_axis(delta);
            axis_normal(axis, -delta[axis].signum())
        } else {
            DVec3::Y
        };
    }

    Some(SweepHit {
        t: t_enter,
        point: from + delta * t_enter,
        normal,
    })
}

/// Sweep the segment `from → to` against a sphere.
#[must_use]
pub fn sweep_sphere(from: DVec3, to: DVec3, center: DVec3, radius: f64) -> Option<SweepHit> {
    let d = to - from;
    let m = from - center;
    let c = m.length_squared() - radius * radius;

    if c <= 0.0 {
        return Some(SweepHit {
            t: 0.0,
            point: from,
            normal: m.try_normalize().unwrap_or(DVec3::Y),
        });
    }

    let a = d.length_squared();
    if a < PARALLEL_EPSILON {
        return None;
    }

    let b = m.dot(d);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / a;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }

    let point = from + d * t;
    Some(SweepHit {
        t,
        point,
        normal: (point - center) / radius,
    })
}

// ============================================================================
// Hit colliders
// ============================================================================

/// Shape of a body part, relative to the owning entity's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitShape {
    /// Sphere part.
    Sphere {
        /// Offset of the centre from the entity position.
        center: DVec3,
        /// Radius.
        radius: f64,
    },
    /// Box part.
    Box(Aabb),
}

impl HitShape {
    /// Sweep a segment against this shape placed at `origin`, inflated by `inflate`.
    #[must_use]
    pub fn sweep(&self, origin: DVec3, from: DVec3, to: DVec3, inflate: f64) -> Option<SweepHit> {
        match self {
            Self::Sphere { center, radius } => {
                sweep_sphere(from, to, origin + *center, radius + inflate)
            },
            Self::Box(aabb) => sweep_aabb(from, to, &aabb.translated(origin).expanded(inflate)),
        }
    }
}

/// A named body part ("head", "torso", ...) of a given collider type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitCollider {
    /// Part key reported back as the collider name.
    pub name: String,
    /// Name of the [`ColliderType`] this part belongs to.
    pub collider_type: String,
    /// Geometry.
    pub shape: HitShape,
}

impl HitCollider {
    /// Create a part.
    #[must_use]
    pub fn new(name: impl Into<String>, collider_type: impl Into<String>, shape: HitShape) -> Self {
        Self {
            name: name.into(),
            collider_type: collider_type.into(),
            shape,
        }
    }
}

/// Material class shared by many parts (flesh, bone, plate, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderType {
    /// Type name.
    pub name: String,
    /// Penetration strength consumed when passing through this type.
    pub penetration_resistance: f32,
    /// Damage multiplier for hits on this type.
    pub damage_multiplier: f32,
    /// Parts of this type stop projectiles outright.
    pub stops_projectiles: bool,
}

impl ColliderType {
    /// Create a collider type.
    #[must_use]
    pub fn new(name: impl Into<String>, penetration_resistance: f32, damage_multiplier: f32) -> Self {
        Self {
            name: name.into(),
            penetration_resistance,
            damage_multiplier,
            stops_projectiles: false,
        }
    }

    /// Mark the type as stopping projectiles.
    #[must_use]
    pub fn stopping(mut self) -> Self {
        self.stops_projectiles = true;
        self
    }
}

/// Collider types keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderTypeRegistry {
    /// Registered types.
    pub types: AHashMap<String, ColliderType>,
}

impl ColliderTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type (builder).
    #[must_use]
    pub fn with_type(mut self, collider_type: ColliderType) -> Self {
        self.insert(collider_type);
        self
    }

    /// Register a type.
    pub fn insert(&mut self, collider_type: ColliderType) {
        self.types.insert(collider_type.name.clone(), collider_type);
    }

    /// Look up a type.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColliderType> {
        self.types.get(name)
    }
}

/// Outcome of sweeping a projectile through a body.
#[derive(Debug, Clone, PartialEq)]
pub struct PenetrationResult {
    /// Impact point.
    pub point: DVec3,
    /// Part key of the chosen impact.
    pub collider: String,
    /// Penetration strength consumed.
    pub loss: f32,
    /// Damage multiplier of the chosen part.
    pub damage_multiplier: f32,
    /// A projectile-stopping part was struck.
    pub hard_stop: bool,
}

/// Sweep `from → to` through the parts of an entity at `origin` and account for
/// penetration loss.
///
/// - Any intersected stopping part is a hard stop: its point is used and the
///   full `strength` is charged.
/// - Otherwise intersections are walked in sweep order; the highest damage
///   multiplier part becomes the impact, and each distinct collider type is
///   charged once, stopping when the next charge would exceed `strength`.
///
/// Returns `Ok(None)` when no part is intersected.
pub fn resolve_penetration(
    entity: EntityId,
    parts: &[HitCollider],
    origin: DVec3,
    from: DVec3,
    to: DVec3,
    inflate: f64,
    strength: f32,
    types: &ColliderTypeRegistry,
) -> Result<Option<PenetrationResult>, ProjectileError> {
    let mut hits = Vec::new();
    for part in parts {
        let Some(hit) = part.shape.sweep(origin, from, to, inflate) else {
            continue;
        };
        let collider_type =
            types
                .get(&part.collider_type)
                .ok_or_else(|| ProjectileError::UnknownColliderType {
                    entity,
                    collider_type: part.collider_type.clone(),
                })?;
        hits.push((hit, part, collider_type));
    }

    if hits.is_empty() {
        return Ok(None);
    }
    hits.sort_by(|a, b| a.0.t.total_cmp(&b.0.t));

    if let Some((hit, part, collider_type)) = hits.iter().find(|(_, _, ty)| ty.stops_projectiles) {
        return Ok(Some(PenetrationResult {
            point: hit.point,
            collider: part.name.clone(),
            loss: strength,
            damage_multiplier: collider_type.damage_multiplier,
            hard_stop: true,
        }));
    }

    let mut chosen = &hits[0];
    let mut seen: Vec<&str> = Vec::new();
    let mut loss = 0.0_f32;

    for entry in &hits {
        let (_, _, collider_type) = entry;
        if collider_type.damage_multiplier > chosen.2.damage_multiplier {
            chosen = entry;
        }
        if seen.contains(&collider_type.name.as_str()) {
            continue;
        }
        seen.push(&collider_type.name);

        if loss + collider_type.penetration_resistance > strength {
            loss = strength;
            break;
        }
        loss += collider_type.penetration_resistance;
    }

    Ok(Some(PenetrationResult {
        point: chosen.0.point,
        collider: chosen.1.name.clone(),
        loss,
        damage_multiplier: chosen.2.damage_multiplier,
        hard_stop: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> ColliderTypeRegistry {
        ColliderTypeRegistry::new()
            .with_type(ColliderType::new("flesh", 2.0, 1.0))
            .with_type(ColliderType::new("bone", 3.0, 1.5))
            .with_type(ColliderType::new("plate", 0.0, 0.5).stopping())
    }

    fn sphere(x: f64, radius: f64) -> HitShape {
        HitShape::Sphere {
            center: DVec3::new(x, 0.0, 0.0),
            radius,
        }
    }

    fn sweep_x(parts: &[HitCollider], strength: f32) -> Option<PenetrationResult> {
        resolve_penetration(
            EntityId::from_raw(1),
            parts,
            DVec3::ZERO,
            DVec3::new(-10.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            0.0,
            strength,
            &types(),
        )
        .expect("known collider types")
    }

    #[test]
    fn test_sweep_aabb_entry_normal() {
        let block = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let hit = sweep_aabb(DVec3::new(0.5, 3.0, 0.5), DVec3::new(0.5, -1.0, 0.5), &block)
            .expect("should hit top face");
        assert!((hit.t - 0.5).abs() < 1e-9);
        assert_eq!(hit.normal, DVec3::Y);
        assert!((hit.point.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sweep_aabb_miss() {
        let block = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert!(sweep_aabb(DVec3::new(-1.0, 2.0, 0.5), DVec3::new(2.0, 2.0, 0.5), &block).is_none());
    }

    #[test]
    fn test_sweep_aabb_segment_too_short() {
        let block = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert!(sweep_aabb(DVec3::new(0.5, 3.0, 0.5), DVec3::new(0.5, 2.0, 0.5), &block).is_none());
    }

    #[test]
    fn test_sweep_sphere() {
        let hit = sweep_sphere(
            DVec3::new(-5.0, 0.0, 0.0),
            DVec3::new(5.0, 0.0, 0.0),
            DVec3::ZERO,
            1.0,
        )
        .expect("should hit");
        assert!((hit.point.x + 1.0).abs() < 1e-9);
        assert!((hit.normal - DVec3::NEG_X).length() < 1e-9);
    }

    #[test]
    fn test_no_parts_hit() {
        let parts = [HitCollider::new("head", "flesh", HitShape::Sphere {
            center: DVec3::new(0.0, 5.0, 0.0),
            radius: 0.5,
        })];
        assert!(sweep_x(&parts, 10.0).is_none());
    }

    #[test]
    fn test_each_collider_type_charged_once() {
        let parts = [
            HitCollider::new("arm", "flesh", sphere(-2.0, 0.5)),
            HitCollider::new("torso", "flesh", sphere(0.0, 0.5)),
            HitCollider::new("spine", "bone", sphere(2.0, 0.5)),
        ];
        let result = sweep_x(&parts, 10.0).expect("hit");
        assert!((result.loss - 5.0).abs() < f32::EPSILON);
        assert_eq!(result.collider, "spine");
        assert!(!result.hard_stop);
    }

    #[test]
    fn test_loss_capped_at_strength() {
        let parts = [
            HitCollider::new("torso", "flesh", sphere(0.0, 0.5)),
            HitCollider::new("spine", "bone", sphere(2.0, 0.5)),
        ];
        let result = sweep_x(&parts, 4.0).expect("hit");
        assert!((result.loss - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stopping_part_is_hard_stop() {
        let parts = [
            HitCollider::new("torso", "flesh", sphere(-2.0, 0.5)),
            HitCollider::new("breastplate", "plate", sphere(2.0, 0.5)),
        ];
        let result = sweep_x(&parts, 7.5).expect("hit");
        assert!(result.hard_stop);
        assert_eq!(result.collider, "breastplate");
        assert!((result.loss - 7.5).abs() < f32::EPSILON);
        assert!((result.point.x - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_registry_replaces_by_name() {
        let mut registry = types();
        registry.insert(ColliderType::new("flesh", 1.0, 2.0));
        assert_eq!(registry.types.len(), 3);
        assert!(registry.get("flesh").is_some_and(|t| (t.damage_multiplier - 2.0).abs() < f32::EPSILON));
        assert!(registry.get("plate").is_some_and(|t| t.stops_projectiles));
        assert!(registry.get("scale").is_none());
    }

    #[test]
    fn test_unknown_collider_type_is_error() {
        let parts = [HitCollider::new("wing", "feather", sphere(0.0, 0.5))];
        let err = resolve_penetration(
            EntityId::from_raw(9),
            &parts,
            DVec3::ZERO,
            DVec3::new(-10.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            0.0,
            1.0,
            &types(),
        );
        assert!(matches!(err, Err(ProjectileError::UnknownColliderType { .. })));
    }

    #[test]
    fn test_dominant_axis() {
        assert_eq!(dominant_axis(DVec3::new(0.1, -3.0, 2.0)), 1);
        assert_eq!(dominant_axis(DVec3::new(-4.0, 1.0, 2.0)), 0);
        assert_eq!(dominant_axis(DVec3::new(0.0, 0.0, -1.0)), 2);
    }
}
