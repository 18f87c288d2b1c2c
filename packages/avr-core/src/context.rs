//! Top-level wiring: configuration, discovery and connections in one place.

use std::sync::Arc;

use crate::config::Config;
use crate::connection::{Connector, ReceiverConnection, TcpConnector};
use crate::discovery::{DiscoveredReceiver, DiscoveryTracker};
use crate::error::AvrResult;
use crate::registry::ConnectionRegistry;

/// Owns the discovery tracker and the connection registry.
#[derive(Debug)]
pub struct AvrContext {
    config: Config,
    tracker: DiscoveryTracker,
    registry: ConnectionRegistry,
}

impl AvrContext {
    /// Validates `config` and builds a context with UDP discovery and TCP
    /// control sessions.
    pub fn new(config: Config) -> AvrResult<Self> {
        config.validate()?;
        let tracker = DiscoveryTracker::from_config(config.discovery.clone())?;
        let connector = Arc::new(TcpConnector::new(config.connection.connect_timeout()));
        Ok(Self::with_parts(config, tracker, connector))
    }

    /// Builds a context from pre-constructed parts.
    pub fn with_parts(
        config: Config,
        tracker: DiscoveryTracker,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let registry = ConnectionRegistry::new(config.connection.clone(), connector);
        Self {
            config,
            tracker,
            registry,
        }
    }

    /// Loads the receiver cache, then starts passive listening.
    pub async fn init(&self) -> AvrResult<()> {
        self.tracker.init().await?;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> &DiscoveryTracker {
        &self.tracker
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Connection to a discovered receiver at its current address.
    pub async fn connection_for(&self, receiver: &DiscoveredReceiver) -> ReceiverConnection {
        self.registry
            .get_or_create(&receiver.identity, &receiver.current_address)
            .await
    }

    pub async fn connection_for_host(&self, identity: &str, host: &str) -> ReceiverConnection {
        self.registry.get_or_create(identity, host).await
    }

    /// Disconnects every session and stops discovery.
    pub async fn shutdown(&self) {
        log::info!("[Context] Shutting down");
        self.registry.disconnect_all().await;
        self.tracker.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_fixtures::ScriptedConnector;
    use crate::connection::ConnectionState;
    use crate::discovery::test_fixtures::{response, MockFetcher, MockTransport};
    use crate::discovery::{CacheStore, JsonFileCacheStore};
    use crate::error::AvrError;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn context(
        config: Config,
        transport: Arc<MockTransport>,
        store: Option<Arc<dyn CacheStore>>,
        connector: Arc<ScriptedConnector>,
    ) -> AvrContext {
        let tracker = DiscoveryTracker::new(
            config.discovery.clone(),
            transport,
            MockFetcher::arc(),
            store,
        );
        AvrContext::with_parts(config, tracker, connector)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.discovery.mx = 0;
        assert!(matches!(AvrContext::new(config), Err(AvrError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn connection_follows_discovered_address() {
        let transport = MockTransport::arc();
        let connector = ScriptedConnector::arc();
        let ctx = context(Config::default(), transport.clone(), None, connector.clone());
        ctx.init().await.unwrap();

        transport.inject(response("AB12", "192.168.1.20"));
        sleep(Duration::from_millis(10)).await;
        let receiver = ctx.tracker().receiver("AB12").unwrap();

        let conn = ctx.connection_for(&receiver).await;
        assert_eq!(conn.host(), "192.168.1.20");
        assert_eq!(conn.identity(), "AB12");

        conn.connect();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.hosts(), ["192.168.1.20"]);

        let same = ctx.connection_for_host("AB12", "192.168.1.20").await;
        assert_eq!(ctx.registry().len(), 1);
        assert_ne!(same.state(), ConnectionState::Disconnected);

        ctx.shutdown().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(ctx.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_persists_discovered_receivers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receivers.json");
        let store = Arc::new(JsonFileCacheStore::new(&path));
        let transport = MockTransport::arc();
        let ctx = context(
            Config::default(),
            transport.clone(),
            Some(store.clone()),
            ScriptedConnector::arc(),
        );
        ctx.init().await.unwrap();

        transport.inject(response("AB12", "192.168.1.20"));
        sleep(Duration::from_millis(10)).await;
        ctx.shutdown().await;

        let stored = store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].current_address, "192.168.1.20");
    }
}
