//! Tuning for the collision check protocol.

use serde::{Deserialize, Serialize};

/// Protocol and registry tuning shared by server and client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Added to a projectile's penetration distance in check requests.
    pub penetration_offset: f32,
    /// Extra radius the client scans around the projectile.
    pub scan_padding: f64,
    /// Penetration loss charged for bodies without detailed colliders.
    pub default_penetration_cost: f32,
    /// Collider key reported for bounding-volume hits.
    pub bounding_collider: String,
    /// Issue a check request every this many ticks.
    pub request_interval_ticks: u32,
    /// First entity id assigned to spawned projectiles.
    pub entity_id_base: i64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            penetration_offset: 0.1,
            scan_padding: 1.0,
            default_penetration_cost: 5.0,
            bounding_collider: "body".to_string(),
            request_interval_ticks: 1,
            entity_id_base: 1 << 40,
        }
    }
}

impl ProtocolConfig {
    /// Set the request interval (at least one tick).
    #[must_use]
    pub fn with_request_interval(mut self, ticks: u32) -> Self {
        self.request_interval_ticks = ticks.max(1);
        self
    }
}
