#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod domain;
mod engine;
mod guard;
pub mod protocol;
mod rendezvous;
pub mod seed;
#[cfg(feature = "std")]
pub mod battle;
#[cfg(feature = "std")]
mod coordinator;
#[cfg(feature = "std")]
mod logging;
#[cfg(feature = "std")]
pub mod session;

pub use domain::{ConnectionStatus, PeerId, PeerRole, Snapshot};
pub use engine::GameEngine;
pub use guard::OnceFlag;
pub use protocol::{Message, PROTOCOL_VERSION};
pub use rendezvous::TurnRendezvous;
#[cfg(feature = "std")]
pub use battle::{BattleResult, SquadEngine, Unit};
#[cfg(feature = "std")]
pub use coordinator::{Command, ConnectionError, LogEntry, MultiplayerCoordinator, SessionState};
#[cfg(feature = "std")]
pub use logging::init_logging;
#[cfg(feature = "std")]
pub use session::{BoxSession, Connector, Session, SessionEvent};
