//! Controlled random dispersion of firing solutions.
//!
//! Dispersion rotates the launch direction by a sampled yaw and pitch offset
//! while keeping the launch speed unchanged.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::ballistics::BallisticOutput;

/// Largest accepted yaw/pitch offset (radians). Keeps `tan` finite.
pub const MAX_DISPERSION_ANGLE: f64 = 80.0 * std::f64::consts::PI / 180.0;

/// Above this |y| the aim direction counts as vertical for basis construction.
const NEAR_VERTICAL: f64 = 0.999;

/// Statistical shape used to sample offsets within their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DispersionDistribution {
    /// Every offset equally likely.
    #[default]
    Uniform,
    /// Mean of two uniform draws.
    Triangle,
    /// Mean of three uniform draws.
    Gaussian,
    /// Mean of six uniform draws; tighter around the centre.
    NarrowGaussian,
}

impl DispersionDistribution {
    /// Sample a value in `[0, 1]`.
    pub fn sample_unit(self, rng: &mut fastrand::Rng) -> f64 {
        let draws = match self {
            Self::Uniform => 1,
            Self::Triangle => 2,
            Self::Gaussian => 3,
            Self::NarrowGaussian => 6,
        };
        (0..draws).map(|_| rng.f64()).sum::<f64>() / f64::from(draws)
    }

    /// Sample a value in `[min, max]`.
    pub fn sample(self, rng: &mut fastrand::Rng, min: f64, max: f64) -> f64 {
        min + (max - min) * self.sample_unit(rng)
    }
}

/// Dispersion bounds (radians) and sampling shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionData {
    /// Minimum yaw offset.
    pub yaw_min: f64,
    /// Maximum yaw offset.
    pub yaw_max: f64,
    /// Minimum pitch offset.
    pub pitch_min: f64,
    /// Maximum pitch offset.
    pub pitch_max: f64,
    /// Sampling shape.
    pub distribution: DispersionDistribution,
}

impl Default for DispersionData {
    fn default() -> Self {
        Self::NONE
    }
}

impl DispersionData {
    /// No dispersion at all.
    pub const NONE: Self = Self {
        yaw_min: 0.0,
        yaw_max: 0.0,
        pitch_min: 0.0,
        pitch_max: 0.0,
        distribution: DispersionDistribution::Uniform,
    };

    /// Create dispersion bounds; angles are clamped to [`MAX_DISPERSION_ANGLE`].
    #[must_use]
    pub fn new(
        yaw: (f64, f64),
        pitch: (f64, f64),
        distribution: DispersionDistribution,
    ) -> Self {
        let clamp = |a: f64| a.clamp(-MAX_DISPERSION_ANGLE, MAX_DISPERSION_ANGLE);
        Self {
            yaw_min: clamp(yaw.0.min(yaw.1)),
            yaw_max: clamp(yaw.0.max(yaw.1)),
            pitch_min: clamp(pitch.0.min(pitch.1)),
            pitch_max: clamp(pitch.0.max(pitch.1)),
            distribution,
        }
    }

    /// Symmetric `±yaw`, `±pitch` bounds given in degrees.
    #[must_use]
    pub fn symmetric_degrees(yaw: f64, pitch: f64, distribution: DispersionDistribution) -> Self {
        let yaw = yaw.abs().to_radians();
        let pitch = pitch.abs().to_radians();
        Self::new((-yaw, yaw), (-pitch, pitch), distribution)
    }

    /// Upper bound on the angle between the aimed and the dispersed direction.
    #[must_use]
    pub fn max_deflection(&self) -> f64 {
        let yaw = self.yaw_min.abs().max(self.yaw_max.abs()).tan();
        let pitch = self.pitch_min.abs().max(self.pitch_max.abs()).tan();
        yaw.hypot(pitch).atan()
    }
}

/// Orthonormal (yaw axis, pitch axis) perpendicular to a normalized direction.
///
/// The reference axis switches from +Y to +X for near-vertical directions so the
/// cross product never degenerates.
#[must_use]
pub fn aim_basis(direction: DVec3) -> (DVec3, DVec3) {
    let reference = if direction.y.abs() > NEAR_VERTICAL {
        DVec3::X
    } else {
        DVec3::Y
    };
    let yaw_axis = direction.cross(reference).normalize();
    let pitch_axis = yaw_axis.cross(direction).normalize();
    (yaw_axis, pitch_axis)
}

/// Perturb the direction of a solved velocity, keeping its speed.
///
/// Failed or zero-velocity solutions are returned unchanged.
#[must_use]
pub fn apply_dispersion(
    output: &BallisticOutput,
    data: &DispersionData,
    rng: &mut fastrand::Rng,
) -> BallisticOutput {
    let speed = output.velocity.length();
    if !output.success || speed <= f64::EPSILON {
        return *output;
    }

    let direction = output.velocity / speed;
    let (yaw_axis, pitch_axis) = aim_basis(direction);
    let yaw = data.distribution.sample(rng, data.yaw_min, data.yaw_max);
    let pitch = data.distribution.sample(rng, data.pitch_min, data.pitch_max);

    let deflected = (direction + yaw_axis * yaw.tan() + pitch_axis * pitch.tan()).normalize();

    BallisticOutput {
        velocity: deflected * speed,
        ..*output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballistics::{solve_ballistic_arc, SolveMode, TargetData};
    use proptest::prelude::*;

    fn solved(velocity: DVec3) -> BallisticOutput {
        BallisticOutput {
            success: true,
            velocity,
            mode: SolveMode::Full,
            flight_time: 1.0,
        }
    }

    #[test]
    fn test_no_dispersion_keeps_direction() {
        let output = solved(DVec3::new(3.0, 4.0, 0.0));
        let mut rng = fastrand::Rng::with_seed(7);
        let dispersed = apply_dispersion(&output, &DispersionData::NONE, &mut rng);
        assert!(dispersed.velocity.distance(output.velocity) < 1e-9);
    }

    #[test]
    fn test_failed_output_untouched() {
        let data = DispersionData::symmetric_degrees(5.0, 5.0, DispersionDistribution::Uniform);
        let mut rng = fastrand::Rng::with_seed(1);
        let dispersed = apply_dispersion(&BallisticOutput::FAILED, &data, &mut rng);
        assert_eq!(dispersed, BallisticOutput::FAILED);
    }

    #[test]
    fn test_vertical_direction_has_valid_basis() {
        let (yaw, pitch) = aim_basis(DVec3::Y);
        assert!(yaw.is_finite() && pitch.is_finite());
        assert!(yaw.dot(DVec3::Y).abs() < 1e-9);
        assert!(pitch.dot(DVec3::Y).abs() < 1e-9);
        assert!(yaw.dot(pitch).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_dispersion_is_deterministic() {
        let output = solve_ballistic_arc(&TargetData::new(
            DVec3::ZERO,
            DVec3::new(30.0, 2.0, 5.0),
            25.0,
            9.81,
        ));
        let data = DispersionData::symmetric_degrees(3.0, 2.0, DispersionDistribution::Gaussian);

        let a = apply_dispersion(&output, &data, &mut fastrand::Rng::with_seed(99));
        let b = apply_dispersion(&output, &data, &mut fastrand::Rng::with_seed(99));
        assert_eq!(a, b);
        assert_eq!(a.mode, output.mode);
    }

    #[test]
    fn test_angles_are_clamped() {
        let data = DispersionData::symmetric_degrees(170.0, 0.0, DispersionDistribution::Uniform);
        assert!(data.yaw_max <= MAX_DISPERSION_ANGLE);
        assert!(data.max_deflection().is_finite());
    }

    #[test]
    fn test_distribution_stays_in_unit_range() {
        let mut rng = fastrand::Rng::with_seed(3);
        for distribution in [
            DispersionDistribution::Uniform,
            DispersionDistribution::Triangle,
            DispersionDistribution::Gaussian,
            DispersionDistribution::NarrowGaussian,
        ] {
            for _ in 0..200 {
                let value = distribution.sample_unit(&mut rng);
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_dispersion_preserves_speed_and_bounds_angle(
            vx in -50.0f64..50.0,
            vy in -50.0f64..50.0,
            vz in -50.0f64..50.0,
            yaw in 0.0f64..30.0,
            pitch in 0.0f64..30.0,
            seed in any::<u64>(),
        ) {
            let velocity = DVec3::new(vx, vy, vz);
            prop_assume!(velocity.length() > 0.1);

            let data = DispersionData::symmetric_degrees(yaw, pitch, DispersionDistribution::Triangle);
            let output = solved(velocity);
            let dispersed = apply_dispersion(&output, &data, &mut fastrand::Rng::with_seed(seed));

            prop_assert!((dispersed.speed() - velocity.length()).abs() < 1e-9 * velocity.length().max(1.0));
            let angle = dispersed.velocity.angle_between(velocity);
            prop_assert!(angle <= data.max_deflection() + 1e-6);
        }
    }
}
