#![cfg(feature = "std")]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::yield_now;

use crate::domain::PeerId;
use crate::protocol::Message;
use crate::session::{BoxSession, Connector, Session, SessionEvent};

/// Paired in-process session halves backed by FIFO queues. Used by tests
/// and the `local` demo mode.
#[derive(Debug)]
pub struct InMemorySession {
    recv_queue: Arc<Mutex<VecDeque<Message>>>,
    send_queue: Arc<Mutex<VecDeque<Message>>>,
}

impl InMemorySession {
    pub fn pair() -> (Self, Self) {
        let q1 = Arc::new(Mutex::new(VecDeque::new()));
        let q2 = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                recv_queue: q1.clone(),
                send_queue: q2.clone(),
            },
            Self {
                recv_queue: q2,
                send_queue: q1,
            },
        )
    }
}

#[async_trait::async_trait]
impl Session for InMemorySession {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let mut queue = self.send_queue.lock().unwrap();
        queue.push_back(msg);
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<SessionEvent> {
        loop {
            if let Some(msg) = {
                let mut queue = self.recv_queue.lock().unwrap();
                queue.pop_front()
            } {
                return Ok(SessionEvent::Message(msg));
            }
            // Counterpart half dropped and nothing left to drain.
            if Arc::strong_count(&self.recv_queue) == 1 {
                return Ok(SessionEvent::Closed);
            }
            yield_now().await;
        }
    }
}

type DialRequest = (PeerId, oneshot::Sender<InMemorySession>);
type Directory = Arc<Mutex<HashMap<PeerId, mpsc::UnboundedSender<DialRequest>>>>;

/// In-process signaling network. Hands out connectors whose registered
/// peers can dial each other by id.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    directory: Directory,
    next_id: Arc<AtomicUsize>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            directory: self.directory.clone(),
            next_id: self.next_id.clone(),
            local: None,
            incoming: None,
        }
    }
}

pub struct InMemoryConnector {
    directory: Directory,
    next_id: Arc<AtomicUsize>,
    local: Option<PeerId>,
    incoming: Option<mpsc::UnboundedReceiver<DialRequest>>,
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn register(&mut self) -> anyhow::Result<PeerId> {
        if let Some(id) = &self.local {
            return Ok(id.clone());
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = PeerId(format!("peer-{n}"));
        let (tx, rx) = mpsc::unbounded_channel();
        self.directory.lock().unwrap().insert(id.clone(), tx);
        self.incoming = Some(rx);
        self.local = Some(id.clone());
        Ok(id)
    }

    async fn accept(&mut self) -> anyhow::Result<(PeerId, BoxSession)> {
        let incoming = self
            .incoming
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("not registered"))?;
        let (dialer, reply) = incoming
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("network shut down"))?;
        let (ours, theirs) = InMemorySession::pair();
        reply
            .send(theirs)
            .map_err(|_| anyhow::anyhow!("dialer gave up"))?;
        Ok((dialer, Box::new(ours)))
    }

    async fn dial(&mut self, remote: &PeerId) -> anyhow::Result<BoxSession> {
        let local = self
            .local
            .clone()
            .ok_or_else(|| anyhow::anyhow!("not registered"))?;
        let tx = {
            let directory = self.directory.lock().unwrap();
            directory
                .get(remote)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown peer: {remote}"))?
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send((local, reply_tx))
            .map_err(|_| anyhow::anyhow!("peer {remote} is gone"))?;
        let session = reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("peer {remote} rejected the dial"))?;
        Ok(Box::new(session))
    }
}
