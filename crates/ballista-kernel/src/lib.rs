//! # Ballista Kernel
//!
//! Deterministic projectile math and flight physics.
//!
//! This crate provides the pieces that run identically on client and server:
//! - Ballistic arc solving for stationary and moving targets
//! - Randomized dispersion of firing solutions
//! - Swept collision primitives and penetration accounting
//! - Projectile flight, ricochet and embedding against terrain
//!
//! ## Determinism
//!
//! Nothing in this crate reads a clock or a global random source. Time steps
//! are passed in and every random draw comes from a caller-owned
//! `fastrand::Rng`, so a seeded run reproduces exactly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ballistics;
pub mod collision;
pub mod dispersion;
pub mod item_stack;
pub mod projectile;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ballistics::*;
    pub use crate::collision::*;
    pub use crate::dispersion::*;
    pub use crate::item_stack::*;
    pub use crate::projectile::*;
    pub use crate::terrain::*;
}

pub use prelude::*;
