//! UDP seam for SSDP traffic.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::{SSDP_MAX_DATAGRAM, SSDP_MULTICAST_ADDR, SSDP_PORT};

use super::ssdp::{create_notify_socket, create_search_socket, get_interfaces};
use super::types::{DiscoveryError, DiscoveryResult};

/// Received datagrams buffered between the sockets and the tracker.
const DATAGRAM_QUEUE: usize = 256;

/// Pause after a receive error so a persistently failing socket cannot spin.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// One received SSDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: String,
    pub source: SocketAddr,
}

/// Multicast socket set used by the tracker.
#[async_trait]
pub trait SsdpTransport: Send + Sync {
    /// Binds sockets and starts forwarding everything they receive.
    async fn open(&self) -> DiscoveryResult<mpsc::Receiver<Datagram>>;

    /// Sends `payload` to the SSDP group once from every bound interface,
    /// returning how many interfaces it went out on.
    async fn send_search(&self, payload: &[u8]) -> DiscoveryResult<usize>;

    /// Stops receiving. The datagram channel closes once readers exit.
    fn close(&self);
}

/// Real transport: one search socket per interface plus an optional shared
/// NOTIFY listener on the SSDP port.
pub struct UdpTransport {
    listen_on_multicast_port: bool,
    search_sockets: Mutex<Vec<Arc<UdpSocket>>>,
    cancel: CancellationToken,
}

impl UdpTransport {
    #[must_use]
    pub fn new(listen_on_multicast_port: bool) -> Self {
        Self {
            listen_on_multicast_port,
            search_sockets: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl SsdpTransport for UdpTransport {
    async fn open(&self) -> DiscoveryResult<mpsc::Receiver<Datagram>> {
        let interfaces = get_interfaces();
        if interfaces.is_empty() {
            return Err(DiscoveryError::NoInterfaces);
        }

        let mut sockets = Vec::with_capacity(interfaces.len());
        for iface in &interfaces {
            match create_search_socket(iface.ip) {
                Ok(socket) => sockets.push(Arc::new(socket)),
                Err(e) => log::warn!(
                    "[Discovery] Skipping interface {} ({}): {}",
                    iface.name,
                    iface.ip,
                    e
                ),
            }
        }
        if sockets.is_empty() {
            return Err(DiscoveryError::NoInterfaces);
        }

        let (tx, rx) = mpsc::channel(DATAGRAM_QUEUE);
        for socket in &sockets {
            tokio::spawn(recv_loop(
                Arc::clone(socket),
                tx.clone(),
                self.cancel.child_token(),
            ));
        }

        if self.listen_on_multicast_port {
            match create_notify_socket(&interfaces) {
                Ok(socket) => {
                    tokio::spawn(recv_loop(Arc::new(socket), tx, self.cancel.child_token()));
                }
                Err(e) => log::warn!(
                    "[Discovery] Passive announcements unavailable, search responses only: {}",
                    e
                ),
            }
        }

        log::info!("[Discovery] Listening on {} interface(s)", sockets.len());
        *self.search_sockets.lock() = sockets;
        Ok(rx)
    }

    async fn send_search(&self, payload: &[u8]) -> DiscoveryResult<usize> {
        let sockets = self.search_sockets.lock().clone();
        if sockets.is_empty() {
            return Err(DiscoveryError::NoInterfaces);
        }

        let target = SocketAddr::new(IpAddr::V4(SSDP_MULTICAST_ADDR), SSDP_PORT);
        let results = join_all(sockets.iter().map(|s| s.send_to(payload, target))).await;

        let mut sent = 0;
        let mut last_error = None;
        for result in results {
            match result {
                Ok(_) => sent += 1,
                Err(e) => {
                    log::debug!("[Discovery] M-SEARCH send failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        match (sent, last_error) {
            (0, Some(e)) => Err(DiscoveryError::SendSearch(e)),
            _ => Ok(sent),
        }
    }

    fn close(&self) {
        self.cancel.cancel();
        self.search_sockets.lock().clear();
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Datagram>, cancel: CancellationToken) {
    let mut buf = vec![0u8; SSDP_MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        match received {
            Ok((len, source)) => {
                let datagram = Datagram {
                    payload: String::from_utf8_lossy(&buf[..len]).into_owned(),
                    source,
                };
                if tx.send(datagram).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                log::debug!("[Discovery] Receive error: {}", e);
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}
