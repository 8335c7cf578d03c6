//! Session-level types shared by the coordinator and the rendezvous.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

/// Which side of a session this peer plays.
///
/// Fixed for the lifetime of the session. The host accepts the incoming
/// dial and originates the session seed; the guest dials in and adopts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Host,
    Guest,
}

/// Connection lifecycle, advanced only by the coordinator.
///
/// `Disconnected` is reachable from every state on transport loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    InGame,
}

/// Peer identity assigned by the connector at registration.
///
/// Opaque to the protocol: a socket address for TCP, a generated name for
/// the in-memory network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl core::fmt::Display for PeerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(String::from(s))
    }
}

/// Opaque serialized board state produced by the game engine.
///
/// The sync layer forwards snapshots verbatim and never inspects their
/// contents; only the engine that produced one can interpret it.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot(pub Vec<u8>);

impl Snapshot {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}
