use duelsync::session::in_memory::{InMemoryNetwork, InMemorySession};
use duelsync::{Connector, Message, Session, SessionEvent, Snapshot};

#[tokio::test]
async fn messages_arrive_in_send_order() {
    let (mut a, mut b) = InMemorySession::pair();

    a.send(Message::Handshake {
        version: "0.1.0".to_string(),
    })
    .await
    .unwrap();
    a.send(Message::StartGame { seed: 11 }).await.unwrap();
    a.send(Message::EndTurnReady {
        board: Snapshot(vec![1, 2, 3]),
    })
    .await
    .unwrap();

    assert!(matches!(
        b.recv().await.unwrap(),
        SessionEvent::Message(Message::Handshake { .. })
    ));
    assert!(matches!(
        b.recv().await.unwrap(),
        SessionEvent::Message(Message::StartGame { seed: 11 })
    ));
    match b.recv().await.unwrap() {
        SessionEvent::Message(Message::EndTurnReady { board }) => {
            assert_eq!(board, Snapshot(vec![1, 2, 3]));
        }
        other => panic!("expected EndTurnReady, got {other:?}"),
    }
}

#[tokio::test]
async fn dropping_one_half_closes_the_other() {
    let (a, mut b) = InMemorySession::pair();
    drop(a);
    assert!(matches!(b.recv().await.unwrap(), SessionEvent::Closed));
}

#[tokio::test]
async fn queued_messages_drain_before_close() {
    let (mut a, mut b) = InMemorySession::pair();
    a.send(Message::StartGame { seed: 5 }).await.unwrap();
    drop(a);

    assert!(matches!(
        b.recv().await.unwrap(),
        SessionEvent::Message(Message::StartGame { seed: 5 })
    ));
    assert!(matches!(b.recv().await.unwrap(), SessionEvent::Closed));
}

#[tokio::test(flavor = "multi_thread")]
async fn network_register_dial_accept() {
    let net = InMemoryNetwork::new();
    let mut host = net.connector();
    let mut guest = net.connector();

    let host_id = host.register().await.unwrap();
    let guest_id = guest.register().await.unwrap();
    assert_ne!(host_id, guest_id);

    let host_task = tokio::spawn(async move {
        let (dialer, mut session) = host.accept().await.unwrap();
        let event = session.recv().await.unwrap();
        (dialer, event)
    });

    let mut session = guest.dial(&host_id).await.unwrap();
    session.send(Message::StartGame { seed: 42 }).await.unwrap();

    let (dialer, event) = host_task.await.unwrap();
    assert_eq!(dialer, guest_id);
    assert!(matches!(
        event,
        SessionEvent::Message(Message::StartGame { seed: 42 })
    ));
}

#[tokio::test]
async fn dialing_an_unknown_peer_fails() {
    let net = InMemoryNetwork::new();
    let mut guest = net.connector();
    guest.register().await.unwrap();

    let err = guest.dial(&"peer-99".into()).await.unwrap_err();
    assert!(err.to_string().contains("unknown peer"));
}

#[tokio::test]
async fn dialing_before_registration_fails() {
    let net = InMemoryNetwork::new();
    let mut guest = net.connector();
    let err = guest.dial(&"peer-0".into()).await.unwrap_err();
    assert!(err.to_string().contains("not registered"));
}
