//! Shared types for receiver discovery.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to bind or configure a UDP socket.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// Failed to send an M-SEARCH on any interface.
    #[error("failed to send SSDP search: {0}")]
    SendSearch(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,

    /// Description document request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Description document request returned a non-success status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Description document was not well-formed XML.
    #[error("failed to parse device description: {0}")]
    Xml(String),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A receiver seen on the network.
///
/// `identity` is unique within the tracker's cache; repeat sightings refresh
/// `current_address` and `last_seen_at` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredReceiver {
    /// UUID taken from the announcement's USN.
    pub identity: String,
    /// IP address the last announcement came from.
    pub current_address: String,
    /// Unix timestamp (milliseconds) of the last announcement.
    pub last_seen_at: u64,
    /// UPnP device description URL (LOCATION header).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_url: Option<String>,
    /// `friendlyName` from the device description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

impl DiscoveredReceiver {
    /// Name for display: the friendly name when known, otherwise the address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.friendly_name
            .as_deref()
            .unwrap_or(&self.current_address)
    }
}

/// Change to the discovery cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerEvent {
    /// First sighting of an identity.
    ReceiverFound { receiver: DiscoveredReceiver },
    /// Address or friendly name of a known identity changed.
    ReceiverUpdated { receiver: DiscoveredReceiver },
}

/// Interface name prefixes that are skipped for discovery.
pub const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap", "utun",
];

/// Checks if an interface name belongs to a virtual/container interface.
pub fn is_virtual_interface(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(prefix))
}
