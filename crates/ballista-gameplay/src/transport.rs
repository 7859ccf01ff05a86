//! Message transport between the projectile server and clients.
//!
//! Sends never block. Ordering is not relied upon; stale messages are
//! filtered by packet versions on the server.

use ballista_common::{EntityId, ProtocolError, SchemaVersion};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::warn;

use crate::protocol::{decode_frame, encode_frame, ClientMessage, ServerMessage};

/// Server side of a link.
pub trait ServerLink {
    /// Send a message to the client owning `recipient`.
    fn send(&self, recipient: EntityId, message: &ServerMessage) -> Result<(), ProtocolError>;

    /// Take the next pending client message, if any.
    fn try_receive(&self) -> Result<Option<ClientMessage>, ProtocolError>;
}

/// Client side of a link.
pub trait ClientLink {
    /// Send a message to the server.
    fn send(&self, message: &ClientMessage) -> Result<(), ProtocolError>;

    /// Take the next pending server message, if any.
    fn try_receive(&self) -> Result<Option<ServerMessage>, ProtocolError>;
}

/// Default number of frames buffered per direction.
pub const DEFAULT_LINK_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
struct Channel {
    version: SchemaVersion,
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
}

impl Channel {
    fn push(&self, bytes: Vec<u8>) -> Result<(), ProtocolError> {
        match self.sender.try_send(bytes) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Link buffer full, dropping frame");
                Ok(())
            },
            Err(TrySendError::Disconnected(_)) => Err(ProtocolError::Disconnected),
        }
    }

    fn pull(&self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.receiver.try_recv() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ProtocolError::Disconnected),
        }
    }
}

/// Server end of an in-process link.
#[derive(Debug, Clone)]
pub struct LoopbackServer {
    channel: Channel,
}

/// Client end of an in-process link.
#[derive(Debug, Clone)]
pub struct LoopbackClient {
    channel: Channel,
}

/// Create a connected in-process server/client pair.
///
/// Messages pass through the same bincode framing a network link would use.
#[must_use]
pub fn loopback_pair(version: SchemaVersion, capacity: usize) -> (LoopbackServer, LoopbackClient) {
    let (to_client, from_server) = bounded(capacity);
    let (to_server, from_client) = bounded(capacity);
    (
        LoopbackServer {
            channel: Channel {
                version,
                sender: to_client,
                receiver: from_client,
            },
        },
        LoopbackClient {
            channel: Channel {
                version,
                sender: to_server,
                receiver: from_server,
            },
        },
    )
}

impl LoopbackServer {
    /// Number of frames waiting for the client.
    #[must_use]
    pub fn pending_outbound(&self) -> usize {
        self.channel.sender.len()
    }
}

impl LoopbackClient {
    /// Send an already encoded frame.
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<(), ProtocolError> {
        self.channel.push(bytes)
    }
}

impl ServerLink for LoopbackServer {
    fn send(&self, _recipient: EntityId, message: &ServerMessage) -> Result<(), ProtocolError> {
        self.channel.push(encode_frame(self.channel.version, message)?)
    }

    fn try_receive(&self) -> Result<Option<ClientMessage>, ProtocolError> {
        self.channel
            .pull()?
            .map(|bytes| decode_frame(self.channel.version, &bytes))
            .transpose()
    }
}

impl ClientLink for LoopbackClient {
    fn send(&self, message: &ClientMessage) -> Result<(), ProtocolError> {
        self.channel.push(encode_frame(self.channel.version, message)?)
    }

    fn try_receive(&self) -> Result<Option<ServerMessage>, ProtocolError> {
        self.channel
            .pull()?
            .map(|bytes| decode_frame(self.channel.version, &bytes))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballista_common::ProjectileId;

    #[test]
    fn test_loopback_delivers_both_ways() {
        let (server, client) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, 8);
        let id = ProjectileId::from_u128(3);

        server
            .send(EntityId::from_raw(1), &ServerMessage::Despawn(id))
            .expect("send");
        assert_eq!(server.pending_outbound(), 1);
        assert_eq!(client.try_receive().expect("recv"), Some(ServerMessage::Despawn(id)));
        assert_eq!(client.try_receive().expect("recv"), None);
        assert!(server.try_receive().expect("recv").is_none());
    }

    #[test]
    fn test_incompatible_frame_rejected() {
        let (server, client) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, 8);
        let bytes = encode_frame(
            SchemaVersion::new(3, 0, 0),
            &ServerMessage::Despawn(ProjectileId::from_u128(1)),
        )
        .expect("encode");
        client.send_raw(bytes).expect("send");
        assert!(matches!(
            server.try_receive(),
            Err(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_full_buffer_drops_without_blocking() {
        let (server, client) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, 1);
        let message = ServerMessage::Despawn(ProjectileId::from_u128(1));
        server.send(EntityId::NULL, &message).expect("first");
        server.send(EntityId::NULL, &message).expect("second is dropped");
        assert!(client.try_receive().expect("recv").is_some());
        assert!(client.try_receive().expect("recv").is_none());
    }

    #[test]
    fn test_disconnected_peer() {
        let (server, client) = loopback_pair(SchemaVersion::PROJECTILE_PROTOCOL, 1);
        drop(client);
        assert!(matches!(
            server.send(EntityId::NULL, &ServerMessage::Despawn(ProjectileId::from_u128(1))),
            Err(ProtocolError::Disconnected)
        ));
    }
}
