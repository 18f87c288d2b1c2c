//! Connection registry keyed by receiver identity.
//!
//! Holds at most one [`ReceiverConnection`] per identity. A receiver that
//! reappears at a new address gets a fresh connection; the old one is
//! disconnected.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::ConnectionConfig;
use crate::connection::{Connector, ReceiverConnection};

pub struct ConnectionRegistry {
    /// identity -> connection
    connections: DashMap<String, ReceiverConnection>,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
}

impl ConnectionRegistry {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connections: DashMap::new(),
            config,
            connector,
        }
    }

    /// Returns the connection for `identity`, creating it if needed.
    ///
    /// If the registered connection points at a different host it is
    /// replaced and the old one is disconnected.
    pub async fn get_or_create(&self, identity: &str, host: &str) -> ReceiverConnection {
        let (connection, replaced) = match self.connections.entry(identity.to_string()) {
            Entry::Occupied(mut entry) if entry.get().host() != host => {
                let fresh = self.build(identity, host);
                let old = entry.insert(fresh.clone());
                (fresh, Some(old))
            }
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let fresh = self.build(identity, host);
                entry.insert(fresh.clone());
                (fresh, None)
            }
        };

        if let Some(old) = replaced {
            log::info!(
                "[Registry] {} moved from {} to {}, replacing connection",
                identity,
                old.host(),
                host
            );
            old.disconnect().await;
        }
        connection
    }

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<ReceiverConnection> {
        self.connections.get(identity).map(|entry| entry.value().clone())
    }

    /// Removes and disconnects the connection for `identity`.
    pub async fn remove(&self, identity: &str) -> bool {
        match self.connections.remove(identity) {
            Some((_, connection)) => {
                connection.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Registered identities, sorted.
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        let mut identities: Vec<_> = self.connections.iter().map(|e| e.key().clone()).collect();
        identities.sort();
        identities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Disconnects every connection and empties the registry.
    pub async fn disconnect_all(&self) {
        let connections: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.connections.clear();
        log::debug!("[Registry] Disconnecting {} connection(s)", connections.len());
        futures::future::join_all(connections.iter().map(ReceiverConnection::disconnect)).await;
    }

    fn build(&self, identity: &str, host: &str) -> ReceiverConnection {
        ReceiverConnection::new(
            host,
            identity,
            self.config.clone(),
            Arc::clone(&self.connector),
        )
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("identities", &self.identities())
            .finish()
    }
}
