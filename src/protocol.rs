//! Messages exchanged between two peers over a session channel.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(feature = "std")]
use std::string::String;

use crate::domain::Snapshot;

/// Version tag carried in the connect-time handshake. Recorded by the
/// receiver for diagnostics; carries no negotiation effect.
pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Message {
    /// Sent by both sides immediately after the channel opens.
    Handshake { version: String },
    /// Host announces the shared session seed. Sent exactly once.
    StartGame { seed: u64 },
    /// Sender finished its turn; carries its board snapshot for the round.
    EndTurnReady { board: Snapshot },
}
