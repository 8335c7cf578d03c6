#![cfg(feature = "std")]

//! Owns the session state machine and drives the sync protocol.
//!
//! All state transitions run on a single logical thread: the coordinator
//! processes one event (inbound message or caller command) to completion
//! before the next. After every mutation it re-evaluates its trigger set —
//! host game start, guest engine init, turn rendezvous — each behind a
//! one-shot latch so that re-evaluation is harmless no matter how often an
//! event-driven caller fires.

use std::time::SystemTime;

use rand::rngs::SmallRng;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionStatus, PeerId, PeerRole},
    engine::GameEngine,
    guard::OnceFlag,
    protocol::{Message, PROTOCOL_VERSION},
    rendezvous::TurnRendezvous,
    seed,
    session::{BoxSession, Connector, SessionEvent},
};

/// Append-only diagnostic trail entry. Never consulted for protocol
/// decisions.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub message: String,
}

/// Errors surfaced to the caller by connection operations. The caller
/// decides whether to retry; the coordinator never retries on its own.
#[derive(Debug)]
pub enum ConnectionError {
    /// A registration attempt is already in flight.
    InitInProgress,
    /// No local peer identity yet; call `initialize_peer` first.
    NotInitialized,
    /// A session already exists or is being established.
    AlreadyConnected,
    /// The signaling layer failed or the remote peer rejected us.
    Signaling(anyhow::Error),
}

impl core::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionError::InitInProgress => write!(f, "peer registration already in flight"),
            ConnectionError::NotInitialized => write!(f, "local peer identity not established"),
            ConnectionError::AlreadyConnected => write!(f, "a session is already active"),
            ConnectionError::Signaling(e) => write!(f, "signaling failure: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Caller commands fed to [`MultiplayerCoordinator::run`].
#[derive(Debug)]
pub enum Command {
    /// The local simulation finished loading; re-evaluate triggers.
    EngineReady,
    /// The local player finished their turn.
    EndTurn,
    /// Tear the session down and stop the pump.
    Shutdown,
}

/// Mutable session state, owned by the coordinator for its lifetime.
///
/// The seed is written at most once per session: by the host when it
/// starts the game, or by the guest when the host's announcement arrives.
#[derive(Debug)]
pub struct SessionState {
    pub role: Option<PeerRole>,
    pub status: ConnectionStatus,
    pub seed: Option<u64>,
    log: Vec<LogEntry>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            role: None,
            status: ConnectionStatus::Disconnected,
            seed: None,
            log: Vec::new(),
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.log.push(LogEntry {
            timestamp: SystemTime::now(),
            message,
        });
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.log
    }
}

enum Pump {
    Inbound(anyhow::Result<SessionEvent>),
    Command(Option<Command>),
}

pub struct MultiplayerCoordinator<E: GameEngine> {
    connector: Box<dyn Connector>,
    session: Option<BoxSession>,
    engine: E,
    rng: SmallRng,
    state: SessionState,
    rendezvous: TurnRendezvous,
    local_id: Option<PeerId>,
    peer_init: OnceFlag,
    host_start: OnceFlag,
    guest_init: OnceFlag,
}

impl<E: GameEngine> MultiplayerCoordinator<E> {
    pub fn new(connector: Box<dyn Connector>, engine: E, rng: SmallRng) -> Self {
        Self {
            connector,
            session: None,
            engine,
            rng,
            state: SessionState::new(),
            rendezvous: TurnRendezvous::new(),
            local_id: None,
            peer_init: OnceFlag::new(),
            host_start: OnceFlag::new(),
            guest_init: OnceFlag::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status
    }

    pub fn role(&self) -> Option<PeerRole> {
        self.state.role
    }

    pub fn session_seed(&self) -> Option<u64> {
        self.state.seed
    }

    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    pub fn logs(&self) -> &[LogEntry] {
        self.state.logs()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn rendezvous(&self) -> &TurnRendezvous {
        &self.rendezvous
    }

    /// Establish the local peer identity with the signaling layer.
    ///
    /// Idempotent under reentrancy: once registered, further calls return
    /// the existing identity; a call while an attempt is in flight fails
    /// with [`ConnectionError::InitInProgress`] instead of creating a
    /// second identity; after a failure the latch rolls back and the
    /// caller may retry.
    pub async fn initialize_peer(&mut self) -> Result<PeerId, ConnectionError> {
        if let Some(id) = &self.local_id {
            return Ok(id.clone());
        }
        if !self.peer_init.begin() {
            return Err(ConnectionError::InitInProgress);
        }
        match self.connector.register().await {
            Ok(id) => {
                self.peer_init.complete();
                self.local_id = Some(id.clone());
                self.state.log(format!("registered as {id}"));
                Ok(id)
            }
            Err(e) => {
                self.peer_init.fail();
                self.state.log(format!("peer registration failed: {e}"));
                Err(ConnectionError::Signaling(e))
            }
        }
    }

    /// Host path: wait for a remote peer to dial in, then adopt the
    /// session with role [`PeerRole::Host`]. Returns the dialer's id.
    pub async fn accept_peer(&mut self) -> Result<PeerId, ConnectionError> {
        if self.local_id.is_none() {
            return Err(ConnectionError::NotInitialized);
        }
        if self.state.status != ConnectionStatus::Disconnected {
            return Err(ConnectionError::AlreadyConnected);
        }
        match self.connector.accept().await {
            Ok((remote, session)) => {
                self.state.log(format!("accepted dial from {remote}"));
                self.adopt_session(session, PeerRole::Host)
                    .await
                    .map_err(ConnectionError::Signaling)?;
                Ok(remote)
            }
            Err(e) => {
                self.state.log(format!("accept failed: {e}"));
                Err(ConnectionError::Signaling(e))
            }
        }
    }

    /// Guest path: dial a remote peer. On failure the status is back at
    /// `Disconnected` and the caller may retry.
    pub async fn connect_to_peer(&mut self, remote: &PeerId) -> Result<(), ConnectionError> {
        if self.local_id.is_none() {
            return Err(ConnectionError::NotInitialized);
        }
        if self.state.status != ConnectionStatus::Disconnected {
            return Err(ConnectionError::AlreadyConnected);
        }
        self.state.status = ConnectionStatus::Connecting;
        self.state.log(format!("dialing {remote}"));
        match self.connector.dial(remote).await {
            Ok(session) => match self.adopt_session(session, PeerRole::Guest).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.teardown("handshake send failed");
                    Err(ConnectionError::Signaling(e))
                }
            },
            Err(e) => {
                self.state.status = ConnectionStatus::Disconnected;
                self.state.log(format!("dial failed: {e}"));
                Err(ConnectionError::Signaling(e))
            }
        }
    }

    /// Install an already-open session channel. Sends the handshake and
    /// runs the trigger set; `connect_to_peer`/`accept_peer` land here,
    /// and tests install channel halves directly.
    pub async fn adopt_session(
        &mut self,
        session: BoxSession,
        role: PeerRole,
    ) -> anyhow::Result<()> {
        self.session = Some(session);
        self.state.role = Some(role);
        self.state.status = ConnectionStatus::Connected;
        self.state.log(format!("connected as {role:?}"));
        self.send(Message::Handshake {
            version: PROTOCOL_VERSION.to_string(),
        })
        .await?;
        self.run_triggers().await
    }

    /// Notification that the local simulation finished loading.
    pub async fn engine_ready(&mut self) -> anyhow::Result<()> {
        self.run_triggers().await
    }

    /// The local player finished their turn: announce readiness with the
    /// current board snapshot. Duplicate calls within one round are
    /// dropped without re-announcing.
    pub async fn end_turn(&mut self) -> anyhow::Result<()> {
        if self.state.status != ConnectionStatus::InGame {
            self.state.log("end turn ignored: not in game");
            return Ok(());
        }
        if !self.rendezvous.mark_local_ready() {
            return Ok(());
        }
        let board = self.engine.board_snapshot();
        self.state
            .log(format!("turn ended, announcing {} byte snapshot", board.len()));
        self.send(Message::EndTurnReady { board }).await?;
        self.run_triggers().await
    }

    /// Apply one inbound peer message, then re-run the trigger set.
    pub async fn handle_message(&mut self, msg: Message) -> anyhow::Result<()> {
        match msg {
            Message::Handshake { version } => {
                self.state.log(format!("handshake: v{version}"));
            }
            Message::StartGame { seed } => {
                // Only a guest without a seed adopts one; a duplicate
                // delivery, or a peer trying to re-seed a running session,
                // never overwrites the stored value.
                if self.state.role == Some(PeerRole::Guest) && self.state.seed.is_none() {
                    self.state.seed = Some(seed);
                    self.state.status = ConnectionStatus::InGame;
                    self.state.log(format!("received session seed {seed}"));
                } else {
                    self.state.log(format!("ignoring StartGame({seed})"));
                }
            }
            Message::EndTurnReady { board } => {
                self.state
                    .log(format!("peer is ready ({} byte snapshot)", board.len()));
                self.rendezvous.mark_remote_ready(board);
            }
        }
        self.run_triggers().await
    }

    /// Process one inbound session event. Returns `false` once the
    /// session is closed and torn down.
    pub async fn step(&mut self) -> anyhow::Result<bool> {
        let event = match self.session.as_mut() {
            Some(session) => session.recv().await,
            None => return Ok(false),
        };
        match event {
            Ok(SessionEvent::Message(msg)) => {
                self.handle_message(msg).await?;
                Ok(true)
            }
            Ok(SessionEvent::Closed) => {
                self.teardown("peer closed the session");
                Ok(false)
            }
            Err(e) => {
                self.teardown(&format!("transport error: {e}"));
                Ok(false)
            }
        }
    }

    /// Event pump: interleave inbound session events with caller
    /// commands, processing each to completion. Returns when the session
    /// closes, the command channel drops, or `Shutdown` arrives.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        loop {
            let pump = {
                let Some(session) = self.session.as_mut() else {
                    return Ok(());
                };
                tokio::select! {
                    event = session.recv() => Pump::Inbound(event),
                    cmd = commands.recv() => Pump::Command(cmd),
                }
            };
            match pump {
                Pump::Inbound(Ok(SessionEvent::Message(msg))) => self.handle_message(msg).await?,
                Pump::Inbound(Ok(SessionEvent::Closed)) => {
                    self.teardown("peer closed the session");
                    return Ok(());
                }
                Pump::Inbound(Err(e)) => {
                    self.teardown(&format!("transport error: {e}"));
                    return Err(e);
                }
                Pump::Command(Some(Command::EngineReady)) => self.engine_ready().await?,
                Pump::Command(Some(Command::EndTurn)) => self.end_turn().await?,
                Pump::Command(Some(Command::Shutdown)) | Pump::Command(None) => {
                    self.teardown("local shutdown");
                    return Ok(());
                }
            }
        }
    }

    /// Tear the session down locally.
    pub fn disconnect(&mut self) {
        self.teardown("local disconnect");
    }

    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no active session"))?;
        session.send(msg).await
    }

    async fn run_triggers(&mut self) -> anyhow::Result<()> {
        self.maybe_start_host_game().await?;
        self.maybe_init_guest_engine();
        if let Some(round_seed) = self.rendezvous.try_resolve(self.state.seed, &mut self.engine) {
            self.state
                .log(format!("battle resolved with round seed {round_seed}"));
        }
        Ok(())
    }

    /// Host game start: fires when the host is connected, unseeded, and
    /// its engine is ready. The latch is claimed before the send await
    /// point, so however often the condition is re-evaluated, the
    /// sequence runs at most once per session.
    async fn maybe_start_host_game(&mut self) -> anyhow::Result<()> {
        let armed = self.state.role == Some(PeerRole::Host)
            && self.state.status == ConnectionStatus::Connected
            && self.state.seed.is_none()
            && self.engine.is_ready();
        if !armed || !self.host_start.begin() {
            return Ok(());
        }
        let session_seed = seed::generate_session_seed(&mut self.rng);
        self.state.seed = Some(session_seed);
        self.state.log(format!("hosting: session seed {session_seed}"));
        if let Err(e) = self.send(Message::StartGame { seed: session_seed }).await {
            self.host_start.fail();
            return Err(e);
        }
        self.engine.init_with_seed(session_seed);
        self.state.status = ConnectionStatus::InGame;
        self.host_start.complete();
        Ok(())
    }

    /// Guest engine init: decoupled from seed receipt so that a
    /// `StartGame` arriving before the simulation finished loading is
    /// deferred, not dropped. Runs at most once per session.
    fn maybe_init_guest_engine(&mut self) {
        let Some(session_seed) = self.state.seed else {
            return;
        };
        let armed = self.state.role == Some(PeerRole::Guest)
            && self.state.status == ConnectionStatus::InGame
            && self.engine.is_ready();
        if !armed || !self.guest_init.begin() {
            return;
        }
        self.engine.init_with_seed(session_seed);
        self.guest_init.complete();
        self.state
            .log(format!("engine initialized with seed {session_seed}"));
    }

    fn teardown(&mut self, reason: &str) {
        self.state.log(format!("session closed: {reason}"));
        self.session = None;
        self.state.role = None;
        self.state.seed = None;
        self.state.status = ConnectionStatus::Disconnected;
        self.rendezvous.reset();
        self.host_start.reset();
        self.guest_init.reset();
    }
}
