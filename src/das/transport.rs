//! Byte transports underneath a terminal session

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::common::errors::{ClientError, Result};
use crate::common::traits::Transport;

/// Any async byte stream with a per-read timeout
pub struct StreamTransport<S> {
    stream: S,
    read_timeout: Duration,
}

/// The production transport: a TCP connection to the terminal's API port
pub type TcpTransport = StreamTransport<TcpStream>;

impl<S> StreamTransport<S> {
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_timeout,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl TcpTransport {
    /// Open a stream to the terminal, failing after `connect_timeout`
    #[instrument(skip(connect_timeout, read_timeout))]
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to DAS terminal at {}:{}", host, port);

        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                ClientError::Transport(format!(
                    "connect to {}:{} timed out after {:?}",
                    host, port, connect_timeout
                ))
            })?
            .map_err(|e| ClientError::Transport(format!("connect to {}:{}: {}", host, port, e)))?;
        stream.set_nodelay(true)?;

        info!("TCP connection established");
        Ok(Self::new(stream, read_timeout))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match timeout(self.read_timeout, self.stream.read(buf)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no data within {:?}", self.read_timeout),
            )),
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Debug, Default)]
struct Script {
    /// Bytes waiting to be read, one entry per arrival
    pending: VecDeque<Vec<u8>>,
    /// Replies handed out once, matched by command prefix
    once: Vec<(String, String)>,
    /// Replies handed out every time, matched by command prefix
    sticky: Vec<(String, String)>,
    /// Prefixes whose send fails with a connection reset
    failing: Vec<String>,
    sent: Vec<String>,
    reads: usize,
    shut_down: bool,
}

/// In-memory transport that answers commands from a script
///
/// Replies are matched against the text of each sent line by prefix. A
/// command without a scripted reply produces nothing, so the next read times
/// out just as a silent terminal would. Clones share the same script, which
/// lets a test keep a handle after moving the transport into a session.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer the next command starting with `prefix` once
    pub fn respond_once(&self, prefix: &str, reply: &str) -> &Self {
        self.lock().once.push((prefix.to_string(), reply.to_string()));
        self
    }

    /// Answer every command starting with `prefix`
    pub fn respond(&self, prefix: &str, reply: &str) -> &Self {
        self.lock().sticky.push((prefix.to_string(), reply.to_string()));
        self
    }

    /// Make sends of commands starting with `prefix` fail
    pub fn fail_on(&self, prefix: &str) -> &Self {
        self.lock().failing.push(prefix.to_string());
        self
    }

    /// Queue unsolicited bytes, e.g. streamed quotes
    pub fn push_read(&self, bytes: &[u8]) -> &Self {
        self.lock().pending.push_back(bytes.to_vec());
        self
    }

    /// Command lines written so far, without line endings
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of `recv` calls made so far
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(bytes).to_string();
        let mut script = self.lock();
        for line in text.split("\r\n").filter(|l| !l.is_empty()) {
            if script.failing.iter().any(|p| line.starts_with(p.as_str())) {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    format!("scripted failure on {:?}", line),
                ));
            }
            script.sent.push(line.to_string());

            let reply = match script.once.iter().position(|(p, _)| line.starts_with(p.as_str())) {
                Some(idx) => Some(script.once.remove(idx).1),
                None => script
                    .sticky
                    .iter()
                    .find(|(p, _)| line.starts_with(p.as_str()))
                    .map(|(_, r)| r.clone()),
            };
            match reply {
                Some(reply) => script.pending.push_back(reply.into_bytes()),
                None => debug!("No scripted reply for {:?}", line),
            }
        }
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.lock();
        script.reads += 1;
        let Some(mut chunk) = script.pending.pop_front() else {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "script exhausted"));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            script.pending.push_front(rest);
        }
        Ok(n)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.lock().shut_down = true;
        Ok(())
    }
}
