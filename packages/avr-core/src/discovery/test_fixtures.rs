//! Shared test fixtures for discovery tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use super::description::DescriptionFetcher;
use super::transport::{Datagram, SsdpTransport};
use super::types::{DiscoveryError, DiscoveryResult};

pub const SEARCH_TARGET: &str = "urn:schemas-denon-com:device:ACT-DenonAVR:1";

/// Search response as a receiver at `ip` would send it.
pub fn response(identity: &str, ip: &str) -> Datagram {
    Datagram {
        payload: format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             LOCATION: http://{ip}:60006/upnp/desc/aios_device/aios_device.xml\r\n\
             ST: {SEARCH_TARGET}\r\n\
             USN: uuid:{identity}::{SEARCH_TARGET}\r\n\r\n"
        ),
        source: source(ip),
    }
}

pub fn datagram(payload: &str, ip: &str) -> Datagram {
    Datagram {
        payload: payload.to_string(),
        source: source(ip),
    }
}

fn source(ip: &str) -> SocketAddr {
    format!("{ip}:1900").parse().expect("socket address")
}

/// In-memory transport that counts searches and replays canned responses.
#[derive(Default)]
pub struct MockTransport {
    inbound: Mutex<Option<mpsc::Sender<Datagram>>>,
    responders: Mutex<Vec<Datagram>>,
    opens: AtomicUsize,
    sends: AtomicUsize,
}

impl MockTransport {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every search is answered with `datagram`.
    pub fn respond_with(&self, datagram: Datagram) {
        self.responders.lock().push(datagram);
    }

    /// Delivers `datagram` as if it arrived on the wire.
    pub fn inject(&self, datagram: Datagram) {
        if let Some(tx) = self.inbound.lock().as_ref() {
            tx.try_send(datagram).expect("inbound queue");
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SsdpTransport for MockTransport {
    async fn open(&self) -> DiscoveryResult<mpsc::Receiver<Datagram>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        *self.inbound.lock() = Some(tx);
        Ok(rx)
    }

    async fn send_search(&self, _payload: &[u8]) -> DiscoveryResult<usize> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let responders = self.responders.lock().clone();
        for datagram in responders {
            self.inject(datagram);
        }
        Ok(1)
    }

    fn close(&self) {
        self.inbound.lock().take();
    }
}

/// Description fetcher answering from a fixed URL map; unknown URLs fail.
///
/// While gated, fetches stay pending until [`MockFetcher::release`].
#[derive(Default)]
pub struct MockFetcher {
    names: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    gated: AtomicBool,
    release: Notify,
}

impl MockFetcher {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn name(&self, url: &str, name: &str) {
        self.names.lock().insert(url.to_string(), name.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Lets one pending (or the next) gated fetch complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl DescriptionFetcher for MockFetcher {
    async fn fetch_friendly_name(&self, url: &str) -> DiscoveryResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        match self.names.lock().get(url) {
            Some(name) => Ok(Some(name.clone())),
            None => Err(DiscoveryError::HttpStatus(404)),
        }
    }
}
