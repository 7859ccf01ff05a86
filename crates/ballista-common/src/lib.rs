//! # Ballista Common
//!
//! Common types shared by every Ballista crate.
//!
//! This crate provides foundational types used across the projectile stack:
//! - ID types (`EntityId`, `ProjectileId`)
//! - Version information for the wire protocol and saved state
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
