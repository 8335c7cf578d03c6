use crate::domain::PeerId;
use crate::protocol::Message;

/// Inbound activity on an open session channel.
#[derive(Debug)]
pub enum SessionEvent {
    /// A well-formed peer message, in arrival order.
    Message(Message),
    /// The underlying channel closed or was lost.
    Closed,
}

/// A bidirectional ordered message channel to the remote peer.
///
/// Delivery is fire-and-forget: no acknowledgment is modeled at this layer,
/// and implementations are trusted to preserve FIFO order without loss.
/// Frames that cannot be decoded into a [`Message`] are dropped inside
/// `recv`, never surfaced.
#[async_trait::async_trait]
pub trait Session: Send + Sync + std::fmt::Debug {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<SessionEvent>;
}

pub type BoxSession = Box<dyn Session>;

/// Signaling-layer collaborator: establishes peer identity and opens
/// sessions. Registration and dialing are async with no timeout of their
/// own; the caller decides whether and when to retry.
#[async_trait::async_trait]
pub trait Connector: Send {
    /// Establish this peer's identity. Called once per coordinator; the
    /// coordinator's one-shot guard keeps repeats away.
    async fn register(&mut self) -> anyhow::Result<PeerId>;

    /// Wait for a remote peer to dial us. Resolves with the dialer's
    /// identity and the opened session.
    async fn accept(&mut self) -> anyhow::Result<(PeerId, BoxSession)>;

    /// Dial a remote peer by identity.
    async fn dial(&mut self, remote: &PeerId) -> anyhow::Result<BoxSession>;
}

pub mod in_memory;
pub mod tcp;
