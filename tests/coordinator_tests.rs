use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use duelsync::session::in_memory::{InMemoryNetwork, InMemorySession};
use duelsync::{
    Command, ConnectionError, ConnectionStatus, Connector, GameEngine, Message,
    MultiplayerCoordinator, PeerId, PeerRole, Session, SessionEvent, Snapshot,
};
use rand::{rngs::SmallRng, SeedableRng};

#[derive(Default)]
struct RecordingEngine {
    ready: bool,
    round: Option<u32>,
    inits: Vec<u64>,
    battles: Vec<(Vec<u8>, u64)>,
}

impl GameEngine for RecordingEngine {
    fn is_ready(&self) -> bool {
        self.ready
    }
    fn current_round(&self) -> Option<u32> {
        self.round
    }
    fn board_snapshot(&self) -> Snapshot {
        Snapshot(vec![0xAB])
    }
    fn init_with_seed(&mut self, seed: u64) {
        self.inits.push(seed);
        self.round = Some(1);
    }
    fn resolve_battle(&mut self, remote: Snapshot, round_seed: u64) {
        self.battles.push((remote.0, round_seed));
        self.round = self.round.map(|r| r + 1);
    }
}

fn coordinator(engine: RecordingEngine) -> MultiplayerCoordinator<RecordingEngine> {
    let net = InMemoryNetwork::new();
    MultiplayerCoordinator::new(Box::new(net.connector()), engine, SmallRng::seed_from_u64(1))
}

async fn drain(mut session: InMemorySession) -> Vec<Message> {
    let mut out = Vec::new();
    loop {
        match session.recv().await.unwrap() {
            SessionEvent::Message(m) => out.push(m),
            SessionEvent::Closed => return out,
        }
    }
}

#[tokio::test]
async fn host_start_sequence_runs_exactly_once() {
    let engine = RecordingEngine {
        ready: true,
        ..Default::default()
    };
    let mut host = coordinator(engine);
    let (ours, theirs) = InMemorySession::pair();
    host.adopt_session(Box::new(ours), PeerRole::Host)
        .await
        .unwrap();

    // The triggering condition gets re-evaluated over and over, as a
    // reentrant UI would.
    for _ in 0..5 {
        host.engine_ready().await.unwrap();
    }

    assert_eq!(host.status(), ConnectionStatus::InGame);
    let seed = host.session_seed().unwrap();
    assert!(seed < 1_000_000);
    assert_eq!(host.engine().inits, vec![seed]);

    drop(host);
    let msgs = drain(theirs).await;
    assert!(matches!(&msgs[0], Message::Handshake { .. }));
    let starts: Vec<_> = msgs
        .iter()
        .filter_map(|m| match m {
            Message::StartGame { seed } => Some(*seed),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec![seed]);
}

#[tokio::test]
async fn host_waits_for_engine_before_starting() {
    let mut host = coordinator(RecordingEngine::default());
    let (ours, theirs) = InMemorySession::pair();
    host.adopt_session(Box::new(ours), PeerRole::Host)
        .await
        .unwrap();

    assert_eq!(host.status(), ConnectionStatus::Connected);
    assert!(host.session_seed().is_none());

    host.engine_mut().ready = true;
    host.engine_ready().await.unwrap();
    assert_eq!(host.status(), ConnectionStatus::InGame);
    let seed = host.session_seed().unwrap();
    assert_eq!(host.engine().inits, vec![seed]);

    drop(host);
    assert_eq!(
        drain(theirs)
            .await
            .iter()
            .filter(|m| matches!(m, Message::StartGame { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn guest_defers_init_until_engine_ready() {
    let mut guest = coordinator(RecordingEngine::default());
    let (ours, _theirs) = InMemorySession::pair();
    guest
        .adopt_session(Box::new(ours), PeerRole::Guest)
        .await
        .unwrap();

    // Seed arrives while the simulation is still loading: stored, and the
    // status advances, but no init yet.
    guest
        .handle_message(Message::StartGame { seed: 7 })
        .await
        .unwrap();
    assert_eq!(guest.status(), ConnectionStatus::InGame);
    assert_eq!(guest.session_seed(), Some(7));
    assert!(guest.engine().inits.is_empty());

    // Duplicate delivery before readiness changes nothing.
    guest
        .handle_message(Message::StartGame { seed: 7 })
        .await
        .unwrap();
    assert!(guest.engine().inits.is_empty());

    guest.engine_mut().ready = true;
    guest.engine_ready().await.unwrap();
    assert_eq!(guest.engine().inits, vec![7]);

    // Readiness re-announced, duplicate StartGame after init: still once,
    // and the stored seed is never overwritten.
    guest.engine_ready().await.unwrap();
    guest
        .handle_message(Message::StartGame { seed: 9 })
        .await
        .unwrap();
    assert_eq!(guest.engine().inits, vec![7]);
    assert_eq!(guest.session_seed(), Some(7));
}

#[tokio::test]
async fn guest_inits_immediately_when_engine_already_ready() {
    let engine = RecordingEngine {
        ready: true,
        ..Default::default()
    };
    let mut guest = coordinator(engine);
    let (ours, _theirs) = InMemorySession::pair();
    guest
        .adopt_session(Box::new(ours), PeerRole::Guest)
        .await
        .unwrap();

    guest
        .handle_message(Message::StartGame { seed: 7 })
        .await
        .unwrap();
    guest
        .handle_message(Message::StartGame { seed: 7 })
        .await
        .unwrap();
    assert_eq!(guest.engine().inits, vec![7]);
}

#[tokio::test]
async fn handshake_is_logged_and_nothing_else() {
    let mut guest = coordinator(RecordingEngine::default());
    let (ours, theirs) = InMemorySession::pair();
    guest
        .adopt_session(Box::new(ours), PeerRole::Guest)
        .await
        .unwrap();

    guest
        .handle_message(Message::Handshake {
            version: "9.9.9".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(guest.status(), ConnectionStatus::Connected);
    assert!(guest
        .logs()
        .iter()
        .any(|entry| entry.message.contains("9.9.9")));

    // Only our own connect-time handshake ever went out.
    drop(guest);
    let msgs = drain(theirs).await;
    assert_eq!(msgs.len(), 1);
    assert!(matches!(&msgs[0], Message::Handshake { .. }));
}

#[tokio::test]
async fn end_turn_announces_once_per_round() {
    let engine = RecordingEngine {
        ready: true,
        ..Default::default()
    };
    let mut host = coordinator(engine);
    let (ours, theirs) = InMemorySession::pair();
    host.adopt_session(Box::new(ours), PeerRole::Host)
        .await
        .unwrap();
    assert_eq!(host.status(), ConnectionStatus::InGame);

    host.end_turn().await.unwrap();
    host.end_turn().await.unwrap();
    assert!(host.rendezvous().local_ready());

    drop(host);
    let ready_count = drain(theirs)
        .await
        .iter()
        .filter(|m| matches!(m, Message::EndTurnReady { .. }))
        .count();
    assert_eq!(ready_count, 1);
}

#[tokio::test]
async fn end_turn_outside_game_is_ignored() {
    let mut guest = coordinator(RecordingEngine::default());
    let (ours, theirs) = InMemorySession::pair();
    guest
        .adopt_session(Box::new(ours), PeerRole::Guest)
        .await
        .unwrap();

    guest.end_turn().await.unwrap();
    assert!(!guest.rendezvous().local_ready());

    drop(guest);
    assert!(drain(theirs)
        .await
        .iter()
        .all(|m| !matches!(m, Message::EndTurnReady { .. })));
}

#[tokio::test]
async fn peer_close_tears_the_session_down() {
    let engine = RecordingEngine {
        ready: true,
        ..Default::default()
    };
    let mut host = coordinator(engine);
    let (ours, theirs) = InMemorySession::pair();
    host.adopt_session(Box::new(ours), PeerRole::Host)
        .await
        .unwrap();
    assert_eq!(host.status(), ConnectionStatus::InGame);

    drop(theirs);
    // Drain whatever the peer still had queued, then observe the close.
    while host.step().await.unwrap() {}

    assert_eq!(host.status(), ConnectionStatus::Disconnected);
    assert_eq!(host.session_seed(), None);
    assert_eq!(host.role(), None);
    assert!(!host.rendezvous().local_ready());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_pump_processes_commands_and_shutdown() {
    let engine = RecordingEngine {
        ready: true,
        ..Default::default()
    };
    let mut host = coordinator(engine);
    let (ours, mut theirs) = InMemorySession::pair();
    host.adopt_session(Box::new(ours), PeerRole::Host)
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let pump = tokio::spawn(async move {
        host.run(rx).await.unwrap();
        host
    });

    tx.send(Command::EndTurn).await.unwrap();

    // Handshake, StartGame, then the commanded readiness announcement.
    let mut saw_ready = false;
    for _ in 0..3 {
        match theirs.recv().await.unwrap() {
            SessionEvent::Message(Message::EndTurnReady { .. }) => saw_ready = true,
            SessionEvent::Message(_) => {}
            SessionEvent::Closed => panic!("session closed early"),
        }
    }
    assert!(saw_ready);

    tx.send(Command::Shutdown).await.unwrap();
    let host = pump.await.unwrap();
    assert_eq!(host.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn initialize_peer_is_idempotent() {
    let net = InMemoryNetwork::new();
    let mut coordinator = MultiplayerCoordinator::new(
        Box::new(net.connector()),
        RecordingEngine::default(),
        SmallRng::seed_from_u64(2),
    );

    let first = coordinator.initialize_peer().await.unwrap();
    let second = coordinator.initialize_peer().await.unwrap();
    assert_eq!(first, second);
}

struct FlakyConnector {
    attempts: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Connector for FlakyConnector {
    async fn register(&mut self) -> anyhow::Result<PeerId> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            anyhow::bail!("signaling offline");
        }
        Ok(PeerId::from("peer-retry"))
    }
    async fn accept(&mut self) -> anyhow::Result<(PeerId, duelsync::BoxSession)> {
        anyhow::bail!("unused")
    }
    async fn dial(&mut self, _remote: &PeerId) -> anyhow::Result<duelsync::BoxSession> {
        anyhow::bail!("unused")
    }
}

#[tokio::test]
async fn initialize_peer_retries_after_failure_without_duplicating() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut coordinator = MultiplayerCoordinator::new(
        Box::new(FlakyConnector {
            attempts: attempts.clone(),
        }),
        RecordingEngine::default(),
        SmallRng::seed_from_u64(3),
    );

    let err = coordinator.initialize_peer().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Signaling(_)));

    let id = coordinator.initialize_peer().await.unwrap();
    assert_eq!(id, PeerId::from("peer-retry"));

    // Registered: further calls return the stored identity without
    // touching the connector again.
    let again = coordinator.initialize_peer().await.unwrap();
    assert_eq!(again, id);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn connect_requires_initialization_and_reports_failures() {
    let net = InMemoryNetwork::new();
    let mut guest = MultiplayerCoordinator::new(
        Box::new(net.connector()),
        RecordingEngine::default(),
        SmallRng::seed_from_u64(4),
    );

    let err = guest.connect_to_peer(&PeerId::from("peer-0")).await;
    assert!(matches!(err, Err(ConnectionError::NotInitialized)));

    guest.initialize_peer().await.unwrap();
    let err = guest.connect_to_peer(&PeerId::from("nobody")).await;
    assert!(matches!(err, Err(ConnectionError::Signaling(_))));
    assert_eq!(guest.status(), ConnectionStatus::Disconnected);
}
