//! Error types for Project Ballista.

use thiserror::Error;

use crate::ids::{EntityId, ItemTypeId, ProjectileId};

/// Top-level error type for Ballista operations.
#[derive(Debug, Error)]
pub enum BallistaError {
    /// Projectile registry errors
    #[error("Projectile error: {0}")]
    Projectile(#[from] ProjectileError),

    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Projectile registry and configuration errors.
#[derive(Debug, Error)]
pub enum ProjectileError {
    /// A projectile with the same id is already registered
    #[error("Projectile {0} is already registered")]
    DuplicateId(ProjectileId),

    /// The item has no projectile stats configured
    #[error("No projectile stats configured for {0}")]
    MissingStats(ItemTypeId),

    /// A hit-collider part references a collider type that does not exist
    #[error("Entity {entity} uses unknown collider type '{collider_type}'")]
    UnknownColliderType {
        /// Entity owning the part
        entity: EntityId,
        /// Missing collider type name
        collider_type: String,
    },
}

/// Wire encoding and decoding errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Encoding a frame failed
    #[error("Failed to encode frame: {0}")]
    Encode(String),

    /// Decoding a frame failed
    #[error("Failed to decode frame: {0}")]
    Decode(String),

    /// The peer speaks an incompatible protocol version
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },

    /// The peer endpoint is gone
    #[error("Link disconnected")]
    Disconnected,
}

/// Result type alias for Ballista operations.
pub type BallistaResult<T> = Result<T, BallistaError>;
