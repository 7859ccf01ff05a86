//! # Ballista Gameplay
//!
//! Projectile gameplay on top of the kernel physics.
//!
//! This crate provides:
//! - Per-item projectile stats and per-shot spawn values
//! - Damage sources, permission checks and damage modifier hooks
//! - The versioned collision packet protocol and loopback transport
//! - Per-projectile controllers that validate client collision reports
//! - Server and client projectile registries
//! - Launchers that aim, disperse and fire
//!
//! The server owns every projectile. Clients only scan the swept path the
//! server asks about and report the first creature hit; each report must echo
//! the projectile's current packet version, so replays and late duplicates
//! are ignored.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod client;
pub mod config;
pub mod controller;
pub mod damage;
pub mod events;
pub mod launcher;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod transport;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::controller::*;
    pub use crate::damage::*;
    pub use crate::events::*;
    pub use crate::launcher::*;
    pub use crate::protocol::*;
    pub use crate::server::*;
    pub use crate::stats::*;
    pub use crate::transport::*;
    pub use crate::world::*;
}

pub use prelude::*;
