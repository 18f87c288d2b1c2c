//! Receiver control sessions.
//!
//! A [`ReceiverConnection`] owns one socket to one receiver at a time. A
//! background driver opens it, issues a full status refresh, decodes status
//! lines into per-zone [`ZoneStatus`] and broadcasts a [`ConnectionEvent`]
//! for every change. When the socket closes the driver retries at a fixed
//! delay up to a cap, then parks in [`ConnectionState::Failed`].
//!
//! Command methods never fail with an error: they return `false` when the
//! session is not open or the command's precondition is not met.

mod driver;
mod events;
mod reconnect;
mod status;
mod transport;

#[cfg(test)]
pub(crate) mod test_fixtures;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionConfig;
use crate::protocol::encode::{
    encode_dynamic_volume, encode_mute, encode_power, encode_source, encode_video_select,
    encode_volume, plan_relative_volume, refresh_queries, VolumeCommand,
};
use crate::protocol::{decode_line, DynamicVolume, Source, Zone};

pub use events::{ConnectionEvent, ConnectionEventKind};
pub use reconnect::{ReconnectDecision, ReconnectPolicy};
pub use status::{ConnectionState, ReceiverSnapshot, ZoneStatus};
pub use transport::{BoxedStream, ConnectionError, Connector, ControlStream, TcpConnector};

/// Handle to a receiver control session. Clones share the same session.
#[derive(Clone)]
pub struct ReceiverConnection {
    inner: Arc<Inner>,
}

struct Inner {
    host: String,
    identity: String,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    shared: Mutex<Shared>,
    events: broadcast::Sender<ConnectionEvent>,
    task: Mutex<Option<RunningTask>>,
}

struct Shared {
    zones: Vec<ZoneStatus>,
    state: ConnectionState,
    status_message: String,
    reconnect_attempts: u32,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReceiverConnection {
    /// Creates a disconnected connection. Nothing happens until [`connect`](Self::connect).
    pub fn new(
        host: impl Into<String>,
        identity: impl Into<String>,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let zones = Zone::ALL
            .iter()
            .map(|_| ZoneStatus::new(config.default_max_volume))
            .collect();
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                host: host.into(),
                identity: identity.into(),
                policy: ReconnectPolicy::from_config(&config),
                config,
                connector,
                shared: Mutex::new(Shared {
                    zones,
                    state: ConnectionState::Disconnected,
                    status_message: String::new(),
                    reconnect_attempts: 0,
                    outbound: None,
                }),
                events,
                task: Mutex::new(None),
            }),
        }
    }

    /// Creates a connection over plain TCP.
    pub fn tcp(
        host: impl Into<String>,
        identity: impl Into<String>,
        config: ConnectionConfig,
    ) -> Self {
        let connector = Arc::new(TcpConnector::new(config.connect_timeout()));
        Self::new(host, identity, config, connector)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    #[must_use]
    pub fn status_message(&self) -> String {
        self.inner.shared.lock().status_message.clone()
    }

    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts()
    }

    #[must_use]
    pub fn zone_status(&self, zone: Zone) -> ZoneStatus {
        self.inner.shared.lock().zones[zone.index()].clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> ReceiverSnapshot {
        self.inner.snapshot()
    }

    /// Subscribes to events. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Events as a [`Stream`](futures::Stream). Lagged receivers see an error item.
    #[must_use]
    pub fn events(&self) -> BroadcastStream<ConnectionEvent> {
        BroadcastStream::new(self.subscribe())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts the session driver. No-op while one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            return;
        }
        self.inner.shared.lock().reconnect_attempts = 0;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(driver::run(Arc::clone(&self.inner), cancel.clone()));
        *task = Some(RunningTask { cancel, handle });
    }

    /// Closes the socket and cancels any pending reconnect.
    ///
    /// Once this returns the driver has stopped; the connection stays
    /// disconnected until [`connect`](Self::connect) is called again.
    pub async fn disconnect(&self) {
        let running = self.inner.task.lock().take();
        if let Some(RunningTask { cancel, handle }) = running {
            self.inner.set_state(ConnectionState::Closing, "Disconnecting".to_string());
            cancel.cancel();
            if let Err(e) = handle.await {
                log::warn!("[Connection] Driver for {} ended abnormally: {}", self.inner.host, e);
            }
        }
        self.inner.shared.lock().reconnect_attempts = 0;
        self.inner.set_state(ConnectionState::Disconnected, "Disconnected".to_string());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets power, or toggles it when `on` is `None`.
    pub fn set_power(&self, zone: Zone, on: Option<bool>) -> bool {
        let Some(on) = on.or_else(|| self.zone_status(zone).power.map(|p| !p)) else {
            log::debug!("[Connection] Power toggle refused: {zone} power unknown");
            return false;
        };
        self.inner.send(encode_power(zone, on))
    }

    /// Sets mute, or toggles it when `muted` is `None`.
    pub fn set_mute(&self, zone: Zone, muted: Option<bool>) -> bool {
        let Some(muted) = muted.or_else(|| self.zone_status(zone).muted.map(|m| !m)) else {
            log::debug!("[Connection] Mute toggle refused: {zone} mute unknown");
            return false;
        };
        self.inner.send(encode_mute(zone, muted))
    }

    pub fn set_source(&self, zone: Zone, source: Source) -> bool {
        self.inner.send(encode_source(zone, source))
    }

    /// Main zone only.
    pub fn set_video_select_source(&self, zone: Zone, source: Source) -> bool {
        match encode_video_select(zone, source) {
            Some(command) => self.inner.send(command),
            None => false,
        }
    }

    /// Main zone only.
    pub fn set_dynamic_volume(&self, zone: Zone, mode: DynamicVolume) -> bool {
        match encode_dynamic_volume(zone, mode) {
            Some(command) => self.inner.send(command),
            None => false,
        }
    }

    /// Moves volume by `delta` steps, clamped to `[0, max_volume]`.
    ///
    /// Requires the zone to be on with a known volume. A move that the clamp
    /// cancels out sends nothing and reports whether the session is open.
    pub fn change_volume_relative(&self, zone: Zone, delta: i32) -> bool {
        let status = self.zone_status(zone);
        if status.power != Some(true) {
            return false;
        }
        let Some(current) = status.volume else {
            return false;
        };
        match plan_relative_volume(current, delta, status.max_volume) {
            Some(plan) => self.inner.send(encode_volume(zone, plan.command)),
            None => self.is_connected(),
        }
    }

    /// Sets an absolute volume. Requires the zone to be on; not clamped to
    /// the zone's max volume.
    pub fn change_volume_absolute(&self, zone: Zone, volume: f64) -> bool {
        if self.zone_status(zone).power != Some(true) || !volume.is_finite() {
            return false;
        }
        self.inner.send(encode_volume(zone, VolumeCommand::Absolute(volume)))
    }

    /// Re-queries every tracked field of every zone.
    pub fn refresh_status(&self) -> bool {
        Zone::ALL
            .into_iter()
            .flat_map(refresh_queries)
            .all(|query| self.inner.send(query))
    }
}

impl std::fmt::Debug for ReceiverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverConnection")
            .field("host", &self.inner.host)
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state transitions (called by the driver)
// ─────────────────────────────────────────────────────────────────────────────

impl Inner {
    fn snapshot(&self) -> ReceiverSnapshot {
        let shared = self.shared.lock();
        self.snapshot_locked(&shared)
    }

    fn snapshot_locked(&self, shared: &Shared) -> ReceiverSnapshot {
        ReceiverSnapshot {
            host: self.host.clone(),
            identity: self.identity.clone(),
            zones: shared.zones.clone(),
            state: shared.state,
            status_message: shared.status_message.clone(),
            reconnect_attempts: shared.reconnect_attempts,
        }
    }

    fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().reconnect_attempts
    }

    fn publish(&self, kind: ConnectionEventKind, snapshot: ReceiverSnapshot) {
        tracing::debug!(identity = %self.identity, ?kind, "connection event");
        // No subscribers is fine.
        let _ = self.events.send(ConnectionEvent {
            identity: self.identity.clone(),
            kind,
            snapshot,
        });
    }

    fn emit(&self, kind: ConnectionEventKind) {
        let snapshot = self.snapshot();
        self.publish(kind, snapshot);
    }

    fn set_state(&self, state: ConnectionState, message: String) {
        let changed = {
            let mut shared = self.shared.lock();
            shared.state = state;
            if shared.status_message == message {
                None
            } else {
                shared.status_message = message.clone();
                Some(self.snapshot_locked(&shared))
            }
        };
        if let Some(snapshot) = changed {
            self.publish(ConnectionEventKind::Status { message }, snapshot);
        }
    }

    fn set_reconnecting(&self, attempt: u32, delay: Duration) {
        self.shared.lock().reconnect_attempts = attempt;
        self.set_state(
            ConnectionState::Reconnecting,
            format!(
                "Reconnecting in {:.1}s (attempt {}/{})",
                delay.as_secs_f64(),
                attempt,
                self.policy.max_attempts
            ),
        );
    }

    fn on_connected(&self, outbound: mpsc::UnboundedSender<String>) {
        {
            let mut shared = self.shared.lock();
            shared.outbound = Some(outbound);
            shared.reconnect_attempts = 0;
        }
        self.set_state(ConnectionState::Connected, "Connected".to_string());
        self.emit(ConnectionEventKind::Connected);
    }

    fn on_session_end(&self) {
        self.shared.lock().outbound = None;
    }

    fn handle_line(&self, line: &str) {
        log::trace!("[Connection] {} -> {}", self.host, line);
        let Some(decoded) = decode_line(line) else {
            return;
        };
        let (changes, snapshot) = {
            let mut shared = self.shared.lock();
            let changes = shared.zones[decoded.zone.index()].apply(decoded.zone, decoded.update);
            if changes.is_empty() {
                return;
            }
            (changes, self.snapshot_locked(&shared))
        };
        for kind in changes {
            self.publish(kind, snapshot.clone());
        }
    }

    fn send(&self, command: String) -> bool {
        let shared = self.shared.lock();
        if shared.state != ConnectionState::Connected {
            log::debug!("[Connection] {} not connected, dropping {}", self.host, command);
            return false;
        }
        match &shared.outbound {
            Some(outbound) => outbound.send(command).is_ok(),
            None => false,
        }
    }
}
