#![cfg(feature = "std")]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

use crate::domain::PeerId;
use crate::protocol::Message;
use crate::session::{BoxSession, Connector, Session, SessionEvent};

/// Default timeout for network writes (30 seconds). Reads block
/// indefinitely: a turn can legitimately take minutes.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum frame size (10 MB) to bound memory allocation on receive.
const MAX_MESSAGE_SIZE: u32 = 10_000_000;

/// Session over a TCP stream. Frames are a 4-byte big-endian length prefix
/// followed by a bincode-encoded [`Message`].
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
    send_timeout: Duration,
    max_message_size: u32,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_send_timeout(stream: TcpStream, send_timeout: Duration) -> Self {
        Self {
            stream,
            send_timeout,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Read one length-prefixed frame. `Ok(None)` means clean EOF.
    async fn read_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::UnexpectedEof
                    || e.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                return Ok(None);
            }
            Err(e) => return Err(anyhow::anyhow!("read error: {e}")),
        }

        let len = u32::from_be_bytes(len_buf);
        if len == 0 {
            return Err(anyhow::anyhow!("invalid frame length: 0"));
        }
        if len > self.max_message_size {
            return Err(anyhow::anyhow!(
                "frame too large: {} bytes (max: {})",
                len,
                self.max_message_size
            ));
        }

        let mut buf = vec![0u8; len as usize];
        self.stream.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof
                || e.kind() == std::io::ErrorKind::ConnectionReset
            {
                anyhow::anyhow!("connection lost mid-frame")
            } else {
                anyhow::anyhow!("read error: {e}")
            }
        })?;
        Ok(Some(buf))
    }
}

#[async_trait::async_trait]
impl Session for TcpSession {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let data =
            bincode::serialize(&msg).map_err(|e| anyhow::anyhow!("serialization error: {e}"))?;
        if data.len() as u32 > self.max_message_size {
            return Err(anyhow::anyhow!(
                "message too large: {} bytes (max: {})",
                data.len(),
                self.max_message_size
            ));
        }

        let send_timeout = self.send_timeout;
        let send_op = async {
            let len = (data.len() as u32).to_be_bytes();
            self.stream.write_all(&len).await?;
            self.stream.write_all(&data).await?;
            std::io::Result::Ok(())
        };
        timeout(send_timeout, send_op)
            .await
            .map_err(|_| anyhow::anyhow!("send timeout after {send_timeout:?}"))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::BrokenPipe
                    || e.kind() == std::io::ErrorKind::ConnectionReset
                {
                    anyhow::anyhow!("connection closed by peer")
                } else {
                    anyhow::anyhow!("write error: {e}")
                }
            })
    }

    async fn recv(&mut self) -> anyhow::Result<SessionEvent> {
        loop {
            let Some(frame) = self.read_frame().await? else {
                return Ok(SessionEvent::Closed);
            };
            match bincode::deserialize(&frame) {
                Ok(msg) => return Ok(SessionEvent::Message(msg)),
                Err(e) => {
                    // Framing is intact, the body just isn't a message we
                    // recognize. Drop it and keep reading.
                    log::debug!("dropping undecodable frame ({} bytes): {e}", frame.len());
                }
            }
        }
    }
}

/// Connector over TCP: registering binds a listener and the resulting
/// socket address doubles as the peer id.
pub struct TcpConnector {
    bind_addr: String,
    listener: Option<TcpListener>,
}

impl TcpConnector {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            listener: None,
        }
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn register(&mut self) -> anyhow::Result<PeerId> {
        if let Some(listener) = &self.listener {
            return Ok(PeerId(listener.local_addr()?.to_string()));
        }
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let id = PeerId(listener.local_addr()?.to_string());
        self.listener = Some(listener);
        Ok(id)
    }

    async fn accept(&mut self) -> anyhow::Result<(PeerId, BoxSession)> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("not registered"))?;
        let (stream, remote) = listener.accept().await?;
        Ok((
            PeerId(remote.to_string()),
            Box::new(TcpSession::new(stream)),
        ))
    }

    async fn dial(&mut self, remote: &PeerId) -> anyhow::Result<BoxSession> {
        let session = TcpSession::connect(&remote.0).await?;
        Ok(Box::new(session))
    }
}
