//! Discovery tracker: the `{identity -> DiscoveredReceiver}` cache and the
//! scans that feed it.
//!
//! # Modes
//!
//! - **Passive** ([`DiscoveryTracker::init`] / [`DiscoveryTracker::listen`]):
//!   every announcement or search response that names the receiver device
//!   type is upserted into the cache.
//! - **Active** ([`DiscoveryTracker::search_for_receivers`]): sends one
//!   M-SEARCH per round, waits, and returns the cache snapshot. Only one scan
//!   runs at a time; callers arriving mid-scan wait for it and get the same
//!   snapshot.
//!
//! Cache mutations are persisted to the optional [`CacheStore`] after a
//! debounce, and the store is read back before any network I/O.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::utils::now_millis;

use super::cache_store::{CacheStore, JsonFileCacheStore};
use super::description::{DescriptionFetcher, HttpDescriptionFetcher};
use super::ssdp::{build_msearch_message, identity_from_usn, SsdpKind, SsdpMessage};
use super::transport::{Datagram, SsdpTransport, UdpTransport};
use super::types::{DiscoveredReceiver, DiscoveryResult, TrackerEvent};

type ScanResult = Option<Vec<DiscoveredReceiver>>;

/// Handle to the discovery cache. Clones share the same tracker.
#[derive(Clone)]
pub struct DiscoveryTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: DiscoveryConfig,
    transport: Arc<dyn SsdpTransport>,
    fetcher: Arc<dyn DescriptionFetcher>,
    store: Option<Arc<dyn CacheStore>>,
    cache: RwLock<HashMap<String, DiscoveredReceiver>>,
    /// Completion signal of the in-flight scan, if any.
    scan: Mutex<Option<watch::Receiver<ScanResult>>>,
    listening: tokio::sync::Mutex<bool>,
    fetch_attempted: Mutex<HashSet<String>>,
    dirty: AtomicBool,
    persist: Notify,
    events: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
}

impl DiscoveryTracker {
    pub fn new(
        config: DiscoveryConfig,
        transport: Arc<dyn SsdpTransport>,
        fetcher: Arc<dyn DescriptionFetcher>,
        store: Option<Arc<dyn CacheStore>>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            inner: Arc::new(TrackerInner {
                config,
                transport,
                fetcher,
                store,
                cache: RwLock::new(HashMap::new()),
                scan: Mutex::new(None),
                listening: tokio::sync::Mutex::new(false),
                fetch_attempted: Mutex::new(HashSet::new()),
                dirty: AtomicBool::new(false),
                persist: Notify::new(),
                events,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Creates a tracker with UDP sockets, HTTP description fetches and, when
    /// `cache_path` is set, a JSON file cache.
    pub fn from_config(config: DiscoveryConfig) -> DiscoveryResult<Self> {
        let transport = Arc::new(UdpTransport::new(config.listen_on_multicast_port));
        let fetcher = Arc::new(HttpDescriptionFetcher::new(config.description_timeout())?);
        let store = config
            .cache_path
            .as_ref()
            .map(|path| Arc::new(JsonFileCacheStore::new(path)) as Arc<dyn CacheStore>);
        Ok(Self::new(config, transport, fetcher, store))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Startup
    // ─────────────────────────────────────────────────────────────────────────

    /// Loads the durable cache, then starts passive listening.
    ///
    /// Cached receivers are available even when listening fails.
    pub async fn init(&self) -> DiscoveryResult<()> {
        self.load_cache();
        self.listen().await
    }

    /// Reads the durable cache into memory, dropping stale entries.
    ///
    /// Entries already in memory win over stored ones. Returns how many were
    /// loaded.
    pub fn load_cache(&self) -> usize {
        let Some(store) = &self.inner.store else {
            return 0;
        };
        let stored = match store.load() {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("[Tracker] Failed to load receiver cache: {}", e);
                return 0;
            }
        };

        let cutoff = match self.inner.config.stale_after_secs {
            0 => 0,
            secs => now_millis().saturating_sub(secs.saturating_mul(1000)),
        };
        let mut cache = self.inner.cache.write();
        let mut loaded = 0;
        for receiver in stored {
            if receiver.last_seen_at < cutoff {
                log::debug!("[Tracker] Dropping stale cached receiver {}", receiver.identity);
                continue;
            }
            if !cache.contains_key(&receiver.identity) {
                cache.insert(receiver.identity.clone(), receiver);
                loaded += 1;
            }
        }
        log::info!("[Tracker] Loaded {} cached receiver(s)", loaded);
        loaded
    }

    /// Binds the transport and starts ingesting datagrams. Idempotent.
    pub async fn listen(&self) -> DiscoveryResult<()> {
        TrackerInner::listen(&self.inner).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of every known receiver, ordered by identity.
    #[must_use]
    pub fn receivers(&self) -> Vec<DiscoveredReceiver> {
        self.inner.snapshot()
    }

    #[must_use]
    pub fn receiver(&self, identity: &str) -> Option<DiscoveredReceiver> {
        self.inner.cache.read().get(identity).cloned()
    }

    /// Whether an active scan is in flight.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.inner
            .scan
            .lock()
            .as_ref()
            .is_some_and(|rx| rx.has_changed().is_ok())
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Active scan
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs `rounds` search rounds of `wait` each and returns the snapshot.
    ///
    /// If a scan is already in flight this starts nothing and resolves with
    /// that scan's snapshot instead.
    pub async fn search_for_receivers(
        &self,
        rounds: u32,
        wait: Duration,
    ) -> Vec<DiscoveredReceiver> {
        let mut done = {
            let mut scan = self.inner.scan.lock();
            match scan.as_ref() {
                Some(rx) if rx.has_changed().is_ok() => {
                    log::debug!("[Tracker] Joining in-flight scan");
                    rx.clone()
                }
                _ => {
                    let (tx, rx) = watch::channel(None);
                    *scan = Some(rx.clone());
                    tokio::spawn(TrackerInner::run_scan(
                        Arc::clone(&self.inner),
                        rounds,
                        wait,
                        tx,
                    ));
                    rx
                }
            }
        };

        let result = match done.wait_for(Option::is_some).await {
            Ok(result) => result.clone().unwrap_or_default(),
            Err(_) => self.receivers(),
        };
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Stops listening and background tasks, flushing any pending persist.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.transport.close();
        self.inner.persist_now();
    }
}

impl TrackerInner {
    fn snapshot(&self) -> Vec<DiscoveredReceiver> {
        let mut receivers: Vec<_> = self.cache.read().values().cloned().collect();
        receivers.sort_by(|a, b| a.identity.cmp(&b.identity));
        receivers
    }

    fn emit(&self, event: TrackerEvent) {
        tracing::debug!(?event, "tracker event");
        let _ = self.events.send(event);
    }

    fn mark_dirty(&self) {
        if self.store.is_some() {
            self.dirty.store(true, Ordering::SeqCst);
            self.persist.notify_one();
        }
    }

    /// Writes the cache if it changed since the last write.
    fn persist_now(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return;
        }
        let receivers = self.snapshot();
        match store.save(&receivers) {
            Ok(()) => log::debug!("[Tracker] Persisted {} receiver(s)", receivers.len()),
            Err(e) => {
                log::warn!("[Tracker] Failed to persist receiver cache: {}", e);
                self.dirty.store(true, Ordering::SeqCst);
            }
        }
    }

    async fn listen(self: &Arc<Self>) -> DiscoveryResult<()> {
        let mut listening = self.listening.lock().await;
        if *listening {
            return Ok(());
        }
        let datagrams = self.transport.open().await?;
        tokio::spawn(Self::pump(Arc::clone(self), datagrams));
        if self.store.is_some() {
            tokio::spawn(Self::persist_loop(Arc::clone(self)));
        }
        *listening = true;
        Ok(())
    }

    async fn pump(self: Arc<Self>, mut datagrams: mpsc::Receiver<Datagram>) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                datagram = datagrams.recv() => match datagram {
                    Some(datagram) => self.ingest(&datagram),
                    None => break,
                },
            }
        }
        log::debug!("[Tracker] Datagram pump stopped");
    }

    async fn persist_loop(self: Arc<Self>) {
        let debounce = self.config.persist_debounce();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.persist.notified() => {}
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(debounce) => {}
            }
            self.persist_now();
        }
    }

    async fn run_scan(
        self: Arc<Self>,
        rounds: u32,
        wait: Duration,
        done: watch::Sender<ScanResult>,
    ) {
        if let Err(e) = Self::listen(&self).await {
            log::warn!("[Tracker] Listening unavailable for scan: {}", e);
        }

        log::info!("[Tracker] Scanning: {} round(s) of {:?}", rounds, wait);
        let message = build_msearch_message(&self.config.search_target, self.config.mx);
        for round in 1..=rounds {
            match self.transport.send_search(message.as_bytes()).await {
                Ok(interfaces) => log::debug!(
                    "[Tracker] Round {}: M-SEARCH sent on {} interface(s)",
                    round,
                    interfaces
                ),
                Err(e) => log::warn!("[Tracker] Round {}: M-SEARCH failed: {}", round, e),
            }
            tokio::time::sleep(wait).await;
        }

        let snapshot = self.snapshot();
        log::info!("[Tracker] Scan complete: {} receiver(s)", snapshot.len());
        // Clear the in-flight marker before publishing so a caller woken by
        // the result can start a fresh scan.
        *self.scan.lock() = None;
        let _ = done.send(Some(snapshot));
    }

    /// Upserts the receiver an SSDP datagram describes, if any.
    fn ingest(self: &Arc<Self>, datagram: &Datagram) {
        let Some(message) = SsdpMessage::parse(&datagram.payload) else {
            return;
        };
        if message.kind == SsdpKind::Search || message.is_byebye() {
            return;
        }
        if !message.mentions(&self.config.search_target) {
            return;
        }
        let Some(identity) = message.header("USN").and_then(identity_from_usn) else {
            return;
        };

        let address = datagram.source.ip().to_string();
        let location = message
            .header("LOCATION")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .filter(|url| !self.fetch_attempted.lock().contains(url));
        let now = now_millis();

        let (event, fetch_url) = {
            let mut cache = self.cache.write();
            let event = match cache.get_mut(&identity) {
                Some(entry) => {
                    let moved = entry.current_address != address;
                    entry.current_address = address;
                    entry.last_seen_at = now;
                    if entry.friendly_name.is_none() && location.is_some() {
                        entry.description_url = location;
                    }
                    moved.then(|| TrackerEvent::ReceiverUpdated {
                        receiver: entry.clone(),
                    })
                }
                None => {
                    log::info!("[Tracker] Found receiver {} at {}", identity, address);
                    let entry = DiscoveredReceiver {
                        identity: identity.clone(),
                        current_address: address,
                        last_seen_at: now,
                        description_url: location,
                        friendly_name: None,
                    };
                    let event = TrackerEvent::ReceiverFound {
                        receiver: entry.clone(),
                    };
                    cache.insert(identity.clone(), entry);
                    Some(event)
                }
            };
            let fetch_url = cache
                .get(&identity)
                .filter(|entry| entry.friendly_name.is_none())
                .and_then(|entry| entry.description_url.clone());
            (event, fetch_url)
        };

        self.mark_dirty();
        if let Some(event) = event {
            self.emit(event);
        }
        if let Some(url) = fetch_url {
            if self.fetch_attempted.lock().insert(url.clone()) {
                tokio::spawn(Self::fetch_name(Arc::clone(self), identity, url));
            }
        }
    }

    async fn fetch_name(self: Arc<Self>, identity: String, url: String) {
        let result = self.fetcher.fetch_friendly_name(&url).await;
        let updated = {
            let mut cache = self.cache.write();
            let Some(entry) = cache.get_mut(&identity) else {
                return;
            };
            match result {
                Ok(Some(name)) => {
                    log::debug!("[Tracker] {} is named {:?}", identity, name);
                    entry.friendly_name = Some(name);
                    Some(entry.clone())
                }
                other => {
                    if let Err(e) = other {
                        log::debug!("[Tracker] Description fetch for {} failed: {}", identity, e);
                    }
                    if entry.description_url.as_deref() == Some(url.as_str()) {
                        entry.description_url = None;
                    }
                    None
                }
            }
        };
        self.mark_dirty();
        if let Some(receiver) = updated {
            self.emit(TrackerEvent::ReceiverUpdated { receiver });
        }
    }
}

impl std::fmt::Debug for DiscoveryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryTracker")
            .field("receivers", &self.inner.cache.read().len())
            .field("scanning", &self.is_scanning())
            .finish()
    }
}
