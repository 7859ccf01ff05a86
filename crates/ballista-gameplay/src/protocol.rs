//! Wire messages exchanged between the projectile server and its clients.
//!
//! Field names are PascalCase on the wire. Vectors travel as `[f64; 3]`.
//! Frames are bincode-encoded and carry the protocol [`SchemaVersion`] so that
//! incompatible peers are rejected instead of misread.

use ballista_common::{EntityId, ProjectileId, ProtocolError, SchemaVersion};
use ballista_kernel::item_stack::ItemStack;
use glam::DVec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Server → client: scan for a creature hit along the last tick's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectileCollisionCheckRequest {
    /// Projectile id.
    pub projectile_id: ProjectileId,
    /// World entity id of the projectile.
    pub projectile_entity_id: EntityId,
    /// Position at the end of the tick.
    pub current_position: [f64; 3],
    /// Position at the start of the tick.
    pub previous_position: [f64; 3],
    /// Current velocity.
    pub velocity: [f64; 3],
    /// Collision radius.
    pub radius: f32,
    /// Sweep extension past the current position.
    pub penetration_distance: f32,
    /// Remaining penetration strength.
    pub penetration_strength: f32,
    /// Whether the shooter may be hit.
    pub collide_with_shooter: bool,
    /// Entities already hit.
    pub ignore_entities: Vec<EntityId>,
    /// Version the reply must echo.
    pub packet_version: i32,
}

impl ProjectileCollisionCheckRequest {
    /// Current position as a vector.
    #[must_use]
    pub fn current(&self) -> DVec3 {
        DVec3::from_array(self.current_position)
    }

    /// Previous position as a vector.
    #[must_use]
    pub fn previous(&self) -> DVec3 {
        DVec3::from_array(self.previous_position)
    }

    /// Velocity as a vector.
    #[must_use]
    pub fn velocity(&self) -> DVec3 {
        DVec3::from_array(self.velocity)
    }
}

/// Client → server: a creature was hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectileCollisionPacket {
    /// Projectile id.
    pub id: ProjectileId,
    /// Impact point.
    pub collision_point: [f64; 3],
    /// Velocity of the struck creature.
    pub after_collision_velocity: [f64; 3],
    /// Magnitude of creature velocity minus projectile velocity.
    pub relative_speed: f64,
    /// Part key that was struck.
    pub collider: String,
    /// Struck entity.
    pub receiver_entity: EntityId,
    /// Version echoed from the request.
    pub packet_version: i32,
    /// Penetration strength consumed.
    pub penetration_strength_loss: f32,
}

impl ProjectileCollisionPacket {
    /// Impact point as a vector.
    #[must_use]
    pub fn point(&self) -> DVec3 {
        DVec3::from_array(self.collision_point)
    }

    /// Creature velocity as a vector.
    #[must_use]
    pub fn receiver_velocity(&self) -> DVec3 {
        DVec3::from_array(self.after_collision_velocity)
    }
}

/// Replicated projectile fields, enough to resume a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectileSyncState {
    /// Shooter entity.
    pub shooter_id: EntityId,
    /// Projectile id.
    pub projectile_id: ProjectileId,
    /// Held projectile stack.
    pub projectile_stack: Option<ItemStack>,
    /// Launcher stack.
    pub weapon_stack: Option<ItemStack>,
    /// Owner entity.
    pub owner_id: EntityId,
    /// Hits bypass invulnerability frames.
    pub ignore_inv_frames: bool,
    /// Whether the projectile can be picked up.
    pub can_be_collected: bool,
    /// Embedded in terrain or a body.
    pub stuck: bool,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Ask for a narrow-phase scan.
    CollisionCheck(ProjectileCollisionCheckRequest),
    /// Projectile spawned or changed replicated state.
    Sync(ProjectileSyncState),
    /// Projectile removed.
    Despawn(ProjectileId),
}

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Report a creature hit.
    Collision(ProjectileCollisionPacket),
}

#[derive(Serialize, Deserialize)]
struct Frame<T> {
    version: SchemaVersion,
    payload: T,
}

/// Encode a message into a versioned frame.
pub fn encode_frame<T: Serialize>(version: SchemaVersion, payload: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(&Frame { version, payload }).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a versioned frame, rejecting peers incompatible with `expected`.
pub fn decode_frame<T: DeserializeOwned>(expected: SchemaVersion, bytes: &[u8]) -> Result<T, ProtocolError> {
    let frame: Frame<T> = bincode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    if !frame.version.is_compatible_with(&expected) {
        return Err(ProtocolError::VersionMismatch {
            expected: expected.to_string(),
            actual: frame.version.to_string(),
        });
    }
    Ok(frame.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECTILE_PROTOCOL: SchemaVersion = SchemaVersion::PROJECTILE_PROTOCOL;

    fn packet() -> ProjectileCollisionPacket {
        ProjectileCollisionPacket {
            id: ProjectileId::from_u128(5),
            collision_point: [1.0, 2.0, 3.0],
            after_collision_velocity: [0.0, 0.0, 1.0],
            relative_speed: 21.5,
            collider: "head".to_string(),
            receiver_entity: EntityId::from_raw(44),
            packet_version: 3,
            penetration_strength_loss: 2.5,
        }
    }

    #[test]
    fn test_collision_packet_field_names() {
        let json = serde_json::to_value(packet()).expect("serialize");
        let object = json.as_object().expect("object");
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, [
            "AfterCollisionVelocity",
            "Collider",
            "CollisionPoint",
            "Id",
            "PacketVersion",
            "PenetrationStrengthLoss",
            "ReceiverEntity",
            "RelativeSpeed",
        ]);
        assert_eq!(object["ReceiverEntity"], serde_json::json!(44));
    }

    #[test]
    fn test_check_request_field_names() {
        let request = ProjectileCollisionCheckRequest {
            projectile_id: ProjectileId::from_u128(1),
            projectile_entity_id: EntityId::from_raw(2),
            current_position: [0.0; 3],
            previous_position: [0.0; 3],
            velocity: [0.0; 3],
            radius: 0.1,
            penetration_distance: 0.6,
            penetration_strength: 5.0,
            collide_with_shooter: false,
            ignore_entities: vec![EntityId::from_raw(9)],
            packet_version: 0,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        for key in [
            "ProjectileId",
            "ProjectileEntityId",
            "CurrentPosition",
            "PreviousPosition",
            "Velocity",
            "Radius",
            "PenetrationDistance",
            "PenetrationStrength",
            "CollideWithShooter",
            "IgnoreEntities",
            "PacketVersion",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["IgnoreEntities"], serde_json::json!([9]));
    }

    #[test]
    fn test_sync_state_field_names() {
        let state = ProjectileSyncState {
            shooter_id: EntityId::from_raw(1),
            projectile_id: ProjectileId::from_u128(2),
            projectile_stack: None,
            weapon_stack: None,
            owner_id: EntityId::from_raw(1),
            ignore_inv_frames: true,
            can_be_collected: true,
            stuck: false,
        };
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["IgnoreInvFrames"], serde_json::json!(true));
        assert_eq!(json["CanBeCollected"], serde_json::json!(true));
        assert!(json.get("Stuck").is_some());
        assert!(json.get("ProjectileStack").is_some());
    }

    #[test]
    fn test_frame_carries_message() {
        let message = ClientMessage::Collision(packet());
        let bytes = encode_frame(PROJECTILE_PROTOCOL, &message).expect("encode");
        let decoded: ClientMessage = decode_frame(PROJECTILE_PROTOCOL, &bytes).expect("decode");
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let bytes = encode_frame(SchemaVersion::new(2, 0, 0), &ClientMessage::Collision(packet()))
            .expect("encode");
        let err = decode_frame::<ClientMessage>(PROJECTILE_PROTOCOL, &bytes);
        assert!(matches!(err, Err(ProtocolError::VersionMismatch { .. })));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_frame::<ClientMessage>(PROJECTILE_PROTOCOL, &[1, 2]);
        assert!(matches!(err, Err(ProtocolError::Decode(_))));
    }
}
