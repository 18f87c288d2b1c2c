//! Shared test fixtures for connection tests.
//!
//! [`ScriptedConnector`] hands out pre-arranged results in order and refuses
//! once the script runs out, counting every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::DuplexStream;

use super::{BoxedStream, ConnectionError, Connector};

pub enum Scripted {
    Stream(BoxedStream),
    Fail(ConnectionError),
}

#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    hosts: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues an in-memory socket and returns the receiver's end of it.
    pub fn push_duplex(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(4096);
        self.script.lock().push_back(Scripted::Stream(Box::new(client)));
        server
    }

    pub fn push_failure(&self, error: ConnectionError) {
        self.script.lock().push_back(Scripted::Fail(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, host: &str, _port: u16) -> Result<BoxedStream, ConnectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().push(host.to_string());
        match self.script.lock().pop_front() {
            Some(Scripted::Stream(stream)) => Ok(stream),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into()),
        }
    }
}

/// Every refresh query the connection sends on connect, as wire bytes.
pub fn refresh_bytes() -> Vec<u8> {
    crate::protocol::Zone::ALL
        .into_iter()
        .flat_map(crate::protocol::encode::refresh_queries)
        .flat_map(|q| {
            let mut bytes = q.into_bytes();
            bytes.push(b'\r');
            bytes
        })
        .collect()
}
