//! Socket seam for control sessions.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

/// Errors that end a control session or prevent one from opening.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Name resolution failed. Never retried.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// Socket error (refused, reset, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resolution or connect took too long.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The receiver closed the socket.
    #[error("connection closed by receiver")]
    Closed,
}

impl ConnectionError {
    /// Whether reconnecting cannot help.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::HostNotFound(_))
    }
}

/// Byte stream a session runs over.
pub trait ControlStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ControlStream for T {}

pub type BoxedStream = Box<dyn ControlStream>;

/// Opens control streams to receivers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream, ConnectionError>;
}

/// TCP connector with a bounded resolve-and-connect time.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<BoxedStream, ConnectionError> {
        let addrs: Vec<SocketAddr> = match timeout(self.timeout, lookup_host((host, port))).await {
            Err(_) => return Err(ConnectionError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(ConnectionError::HostNotFound(format!("{host}: {e}"))),
            Ok(Ok(addrs)) => addrs.collect(),
        };
        if addrs.is_empty() {
            return Err(ConnectionError::HostNotFound(host.to_string()));
        }

        let stream = timeout(self.timeout, TcpStream::connect(&addrs[..]))
            .await
            .map_err(|_| ConnectionError::Timeout(self.timeout))??;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[Connection] Failed to set TCP_NODELAY for {host}: {e}");
        }
        Ok(Box::new(stream))
    }
}
