//! Ballistic firing solutions.
//!
//! Computes the launch velocity needed to hit a (possibly moving) target under
//! constant gravity. Three regimes are tried in order:
//!
//! - **Full**: closed-form low-angle solution at the requested speed
//! - **Horizontal**: horizontal speed is fixed, the vertical speed is derived
//! - **Vertical**: vertical speed is fixed, the horizontal speed is derived
//!
//! Moving targets are handled by a bounded fixed-point loop that re-aims at the
//! position the target will occupy after the predicted flight time.
//!
//! Gravity is a positive magnitude pulling along -Y.
//!
//! # Example
//!
//! ```
//! use ballista_kernel::ballistics::{solve_ballistic_arc, TargetData};
//! use glam::DVec3;
//!
//! let data = TargetData::new(DVec3::ZERO, DVec3::new(10.0, 0.0, 2.0), 20.0, 9.81);
//! let output = solve_ballistic_arc(&data);
//! assert!(output.success);
//! ```

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Maximum refinement iterations for moving-target interception.
pub const MAX_INTERCEPT_ITERATIONS: usize = 30;

/// Speed multiplier applied after a failed interception iteration.
pub const FAILED_ITERATION_SPEED_GAIN: f64 = 1.1;

/// Aim point movement below which interception is considered converged.
pub const INTERCEPT_TOLERANCE: f64 = 0.01;

const EPSILON: f64 = 1e-6;

/// Regime that produced a firing solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SolveMode {
    /// No particular regime (failed or unspecified).
    #[default]
    Any,
    /// Closed-form solution at the requested speed.
    Full,
    /// Horizontal speed fixed to the requested speed.
    Horizontal,
    /// Vertical speed fixed to the requested speed.
    Vertical,
}

/// Input to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetData {
    /// Launch position.
    pub shooter_position: DVec3,
    /// Target position at the time of firing.
    pub target_position: DVec3,
    /// Target velocity (units per second).
    pub target_velocity: DVec3,
    /// Gravity magnitude (units per second squared).
    pub gravity: f64,
    /// Desired launch speed.
    pub speed: f64,
}

impl TargetData {
    /// Create target data for a stationary target.
    #[must_use]
    pub const fn new(shooter: DVec3, target: DVec3, speed: f64, gravity: f64) -> Self {
        Self {
            shooter_position: shooter,
            target_position: target,
            target_velocity: DVec3::ZERO,
            gravity,
            speed,
        }
    }

    /// Set the target velocity.
    #[must_use]
    pub const fn with_target_velocity(mut self, velocity: DVec3) -> Self {
        self.target_velocity = velocity;
        self
    }
}

/// Result of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallisticOutput {
    /// Whether a solution was found.
    pub success: bool,
    /// Launch velocity (zero on failure).
    pub velocity: DVec3,
    /// Regime that produced the solution.
    pub mode: SolveMode,
    /// Predicted time until the target is reached.
    pub flight_time: f64,
}

impl BallisticOutput {
    /// A failed solve.
    pub const FAILED: Self = Self {
        success: false,
        velocity: DVec3::ZERO,
        mode: SolveMode::Any,
        flight_time: 0.0,
    };

    const fn solved(velocity: DVec3, mode: SolveMode, flight_time: f64) -> Self {
        Self {
            success: true,
            velocity,
            mode,
            flight_time,
        }
    }

    const fn failed(mode: SolveMode) -> Self {
        Self {
            mode,
            ..Self::FAILED
        }
    }

    /// Launch speed of the solution.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Analytic position after `time` seconds when launched from `start`.
    #[must_use]
    pub fn position_at(&self, start: DVec3, gravity: f64, time: f64) -> DVec3 {
        start + self.velocity * time - DVec3::Y * (0.5 * gravity * time * time)
    }
}

/// Splits the displacement into (horizontal direction, horizontal distance, height).
fn split_displacement(start: DVec3, target: DVec3) -> (DVec3, f64, f64) {
    let delta = target - start;
    let flat = DVec3::new(delta.x, 0.0, delta.z);
    let distance = flat.length();
    let direction = if distance > EPSILON {
        flat / distance
    } else {
        DVec3::ZERO
    };
    (direction, distance, delta.y)
}

/// Smallest positive root of `0.5·g·t² − vy·t + h = 0`.
fn vertical_flight_time(vertical_speed: f64, height: f64, gravity: f64) -> Option<f64> {
    if gravity.abs() < EPSILON {
        if vertical_speed.abs() < EPSILON {
            return None;
        }
        let t = height / vertical_speed;
        return (t > EPSILON).then_some(t);
    }

    let discriminant = vertical_speed * vertical_speed - 2.0 * gravity * height;
    if discriminant < 0.0 {
        return None;
    }

    let root = discriminant.sqrt();
    let t1 = (vertical_speed - root) / gravity;
    let t2 = (vertical_speed + root) / gravity;

    [t1.min(t2), t1.max(t2)]
        .into_iter()
        .find(|t| *t > EPSILON)
}

/// Straight up or straight down.
fn solve_pure_vertical(height: f64, speed: f64, gravity: f64, mode: SolveMode) -> BallisticOutput {
    if height.abs() < EPSILON {
        return BallisticOutput::failed(mode);
    }
    let vertical_speed = speed.copysign(height);
    match vertical_flight_time(vertical_speed, height, gravity) {
        Some(t) => BallisticOutput::solved(DVec3::Y * vertical_speed, mode, t),
        None => BallisticOutput::failed(mode),
    }
}

/// Closed-form low-angle solution at exactly `speed`.
///
/// Fails when the discriminant `v⁴ − g(g·d² + 2·h·v²)` is negative.
#[must_use]
pub fn solve_full(start: DVec3, target: DVec3, speed: f64, gravity: f64) -> BallisticOutput {
    if speed <= EPSILON {
        return BallisticOutput::failed(SolveMode::Full);
    }

    let (direction, distance, height) = split_displacement(start, target);
    if distance < EPSILON {
        return solve_pure_vertical(height, speed, gravity, SolveMode::Full);
    }

    if gravity.abs() < EPSILON {
        let delta = target - start;
        let length = delta.length();
        return BallisticOutput::solved(delta / length * speed, SolveMode::Full, length / speed);
    }

    let v2 = speed * speed;
    let discriminant = v2 * v2 - gravity * (gravity * distance * distance + 2.0 * height * v2);
    if discriminant < 0.0 {
        return BallisticOutput::failed(SolveMode::Full);
    }

    let angle = ((v2 - discriminant.sqrt()) / (gravity * distance)).atan();
    let horizontal_speed = speed * angle.cos();
    let vertical_speed = speed * angle.sin();

    BallisticOutput::solved(
        direction * horizontal_speed + DVec3::Y * vertical_speed,
        SolveMode::Full,
        distance / horizontal_speed,
    )
}

/// Fix the horizontal speed to `speed` and derive the vertical launch speed.
///
/// Fails only when there is no horizontal displacement to cover.
#[must_use]
pub fn solve_horizontal(start: DVec3, target: DVec3, speed: f64, gravity: f64) -> BallisticOutput {
    let (direction, distance, height) = split_displacement(start, target);
    if distance < EPSILON || speed <= EPSILON {
        return BallisticOutput::failed(SolveMode::Horizontal);
    }

    let t = distance / speed;
    let vertical_speed = height / t + 0.5 * gravity * t;

    BallisticOutput::solved(
        direction * speed + DVec3::Y * vertical_speed,
        SolveMode::Horizontal,
        t,
    )
}

/// Fix the vertical speed to `speed` (signed towards the target height) and
/// derive the horizontal speed from the resulting flight time.
#[must_use]
pub fn solve_vertical(start: DVec3, target: DVec3, speed: f64, gravity: f64) -> BallisticOutput {
    let (direction, distance, height) = split_displacement(start, target);
    if speed <= EPSILON || (distance < EPSILON && height.abs() < EPSILON) {
        return BallisticOutput::failed(SolveMode::Vertical);
    }

    let vertical_speed = if height >= 0.0 { speed } else { -speed };
    let Some(t) = vertical_flight_time(vertical_speed, height, gravity) else {
        return BallisticOutput::failed(SolveMode::Vertical);
    };

    BallisticOutput::solved(
        direction * (distance / t) + DVec3::Y * vertical_speed,
        SolveMode::Vertical,
        t,
    )
}

/// Solve against a stationary target, falling back to the constrained regimes.
#[must_use]
pub fn solve_stationary(start: DVec3, target: DVec3, speed: f64, gravity: f64) -> BallisticOutput {
    let full = solve_full(start, target, speed, gravity);
    if full.success {
        return full;
    }

    let (_, distance, height) = split_displacement(start, target);
    let order: [fn(DVec3, DVec3, f64, f64) -> BallisticOutput; 2] =
        if height.abs() > 0.5 * distance {
            [solve_vertical, solve_horizontal]
        } else {
            [solve_horizontal, solve_vertical]
        };

    let mut output = BallisticOutput::FAILED;
    for solve in order {
        output = solve(start, target, speed, gravity);
        if output.success {
            break;
        }
    }
    output
}

/// Solve for a possibly moving target.
///
/// Iterates at most [`MAX_INTERCEPT_ITERATIONS`] times. Each successful solve
/// re-aims at the target's predicted position after the flight time; each
/// failed solve raises the trial speed by 10%. Reports failure if the aim point
/// has not settled when the cap is reached. Never panics.
#[must_use]
pub fn solve_ballistic_arc(data: &TargetData) -> BallisticOutput {
    let start = data.shooter_position;
    let mut speed = data.speed;
    let mut aim = data.target_position;

    for _ in 0..MAX_INTERCEPT_ITERATIONS {
        let output = solve_stationary(start, aim, speed, data.gravity);
        if !output.success {
            speed *= FAILED_ITERATION_SPEED_GAIN;
            continue;
        }

        let predicted = data.target_position + data.target_velocity * output.flight_time;
        if predicted.distance(aim) <= INTERCEPT_TOLERANCE {
            return output;
        }
        aim = predicted;
    }

    BallisticOutput::FAILED
}

/// Sample points along a launched arc for debug visualisation.
#[must_use]
pub fn trajectory_points(
    start: DVec3,
    velocity: DVec3,
    gravity: f64,
    time_step: f64,
    max_points: usize,
) -> Vec<DVec3> {
    let output = BallisticOutput::solved(velocity, SolveMode::Any, 0.0);
    (0..max_points)
        .map(|i| output.position_at(start, gravity, time_step * i as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const G: f64 = 9.81;

    fn assert_reaches(output: &BallisticOutput, start: DVec3, target: DVec3, gravity: f64) {
        assert!(output.success);
        assert!(output.flight_time > 0.0);
        let reached = output.position_at(start, gravity, output.flight_time);
        assert!(
            reached.distance(target) < 0.05,
            "reached {reached:?}, wanted {target:?}"
        );
    }

    #[test]
    fn test_reference_shot() {
        let target = DVec3::new(10.0, 0.0, 2.0);
        let output = solve_ballistic_arc(&TargetData::new(DVec3::ZERO, target, 20.0, G));

        assert_eq!(output.mode, SolveMode::Full);
        assert!((output.speed() - 20.0).abs() < 1e-9);
        assert_reaches(&output, DVec3::ZERO, target, G);
    }

    #[test]
    fn test_out_of_range_falls_back_to_horizontal() {
        let target = DVec3::new(1000.0, 0.0, 0.0);
        assert!(!solve_full(DVec3::ZERO, target, 10.0, G).success);

        let output = solve_stationary(DVec3::ZERO, target, 10.0, G);
        assert_eq!(output.mode, SolveMode::Horizontal);
        assert_reaches(&output, DVec3::ZERO, target, G);
    }

    #[test]
    fn test_steep_target_uses_vertical_regime() {
        let gravity = 10.0;
        let speed = 210.0_f64.sqrt();
        let target = DVec3::new(5.0, 10.0, 0.0);

        assert!(!solve_full(DVec3::ZERO, target, speed, gravity).success);
        let output = solve_stationary(DVec3::ZERO, target, speed, gravity);
        assert_eq!(output.mode, SolveMode::Vertical);
        assert_reaches(&output, DVec3::ZERO, target, gravity);
    }

    #[test]
    fn test_unreachable_height_falls_back_to_other_regime() {
        let target = DVec3::new(1.0, 100.0, 0.0);
        let output = solve_stationary(DVec3::ZERO, target, 5.0, G);
        assert_eq!(output.mode, SolveMode::Horizontal);
        assert_reaches(&output, DVec3::ZERO, target, G);
    }

    #[test]
    fn test_pure_vertical_shot() {
        let target = DVec3::new(0.0, 5.0, 0.0);
        let output = solve_ballistic_arc(&TargetData::new(DVec3::ZERO, target, 20.0, G));
        assert!(output.velocity.x.abs() < 1e-12 && output.velocity.z.abs() < 1e-12);
        assert!(output.velocity.y > 0.0);
        assert_reaches(&output, DVec3::ZERO, target, G);
    }

    #[test]
    fn test_coincident_target_fails_without_panicking() {
        let output = solve_ballistic_arc(&TargetData::new(DVec3::ONE, DVec3::ONE, 20.0, G));
        assert!(!output.success);
        assert_eq!(output.velocity, DVec3::ZERO);
    }

    #[test]
    fn test_horizontal_regime_rejects_zero_distance() {
        let output = solve_horizontal(DVec3::ZERO, DVec3::new(0.0, 3.0, 0.0), 10.0, G);
        assert!(!output.success);
    }

    #[test]
    fn test_unreachable_pure_vertical_fails() {
        let target = DVec3::new(0.0, 1.0e6, 0.0);
        let output = solve_ballistic_arc(&TargetData::new(DVec3::ZERO, target, 1.0, G));
        assert!(!output.success);
    }

    #[test]
    fn test_moving_target_interception() {
        let target = DVec3::new(20.0, 0.0, 0.0);
        let velocity = DVec3::new(0.0, 0.0, 2.0);
        let data = TargetData::new(DVec3::ZERO, target, 30.0, G).with_target_velocity(velocity);

        let output = solve_ballistic_arc(&data);
        let intercept = target + velocity * output.flight_time;
        assert_reaches(&output, DVec3::ZERO, intercept, G);
    }

    #[test]
    fn test_target_outrunning_projectile_fails() {
        let data = TargetData::new(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0), 5.0, G)
            .with_target_velocity(DVec3::new(50.0, 0.0, 0.0));
        assert!(!solve_ballistic_arc(&data).success);
    }

    #[test]
    fn test_trajectory_points() {
        let points = trajectory_points(DVec3::ZERO, DVec3::new(10.0, 10.0, 0.0), G, 0.1, 10);
        assert_eq!(points.len(), 10);
        assert_eq!(points[0], DVec3::ZERO);
        assert!(points[9].x > points[8].x);
    }

    proptest! {
        #[test]
        fn prop_reachable_targets_are_hit(
            x in 1.0f64..60.0,
            z in -60.0f64..60.0,
            h in -15.0f64..15.0,
            slack in 1.01f64..2.0,
        ) {
            let target = DVec3::new(x, h, z);
            let distance = x.hypot(z);
            // Minimum launch speed that can reach the target.
            let min_speed = (G * (h + h.hypot(distance))).sqrt();
            let data = TargetData::new(DVec3::ZERO, target, min_speed * slack, G);

            let output = solve_ballistic_arc(&data);
            prop_assert!(output.success);
            let reached = output.position_at(DVec3::ZERO, G, output.flight_time);
            prop_assert!(reached.distance(target) < 0.05);
        }

        #[test]
        fn prop_solver_never_panics(
            x in -100.0f64..100.0,
            y in -100.0f64..100.0,
            speed in 0.0f64..50.0,
        ) {
            let data = TargetData::new(DVec3::ZERO, DVec3::new(x, y, 0.0), speed, G);
            let output = solve_ballistic_arc(&data);
            if !output.success {
                prop_assert_eq!(output.velocity, DVec3::ZERO);
            }
        }
    }
}
