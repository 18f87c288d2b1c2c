//! Library configuration.
//!
//! All fields have sensible defaults; partial YAML/JSON documents deserialize
//! with missing fields filled from [`Default`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol_constants::{
    CONTROL_PORT, DEFAULT_MAX_VOLUME, MAX_RECONNECT_ATTEMPTS, RECEIVER_SEARCH_TARGET,
    RECONNECT_DELAY_MS,
};

/// A configuration value failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ConfigError {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for receiver control sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// TCP port of the control interface.
    pub port: u16,

    /// Timeout for name resolution plus TCP connect (milliseconds).
    pub connect_timeout_ms: u64,

    /// Fixed delay before each reconnection attempt (milliseconds).
    pub reconnect_delay_ms: u64,

    /// Consecutive failed attempts before the connection is marked failed.
    pub max_reconnect_attempts: u32,

    /// Volume ceiling assumed until the receiver reports `MVMAX`.
    pub default_max_volume: f64,

    /// Capacity of each connection's event broadcast channel.
    pub event_channel_capacity: usize,

    /// Longest status line accepted before it is discarded.
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: CONTROL_PORT,
            connect_timeout_ms: 5000,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            default_max_volume: DEFAULT_MAX_VOLUME,
            event_channel_capacity: 64,
            max_line_length: 512,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Validates the connection settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::new("connection.port", "must be non-zero"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::new(
                "connection.connect_timeout_ms",
                "must be >= 1",
            ));
        }
        if !(self.default_max_volume.is_finite() && self.default_max_volume > 0.0) {
            return Err(ConfigError::new(
                "connection.default_max_volume",
                "must be a positive number",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::new("connection.event_channel_capacity", "must be >= 1"));
        }
        if self.max_line_length < 16 {
            return Err(ConfigError::new("connection.max_line_length", "must be >= 16"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the SSDP discovery tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Device type sent in M-SEARCH and required in announcements.
    pub search_target: String,

    /// MX header value (max seconds a device may delay its response).
    pub mx: u8,

    /// Also listen on `0.0.0.0:1900` for unsolicited NOTIFY announcements.
    pub listen_on_multicast_port: bool,

    /// Timeout for fetching a device description document (milliseconds).
    pub description_timeout_ms: u64,

    /// Quiet period after the last cache change before persisting (milliseconds).
    pub persist_debounce_ms: u64,

    /// Cached entries older than this are dropped on load (seconds, 0 = keep all).
    pub stale_after_secs: u64,

    /// File backing the durable cache. No persistence when unset.
    pub cache_path: Option<PathBuf>,

    /// Capacity of the tracker's event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_target: RECEIVER_SEARCH_TARGET.to_string(),
            mx: 2,
            listen_on_multicast_port: true,
            description_timeout_ms: 3000,
            persist_debounce_ms: 2000,
            stale_after_secs: 30 * 24 * 60 * 60,
            cache_path: None,
            event_channel_capacity: 64,
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn description_timeout(&self) -> Duration {
        Duration::from_millis(self.description_timeout_ms)
    }

    #[must_use]
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// Validates the discovery settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_target.trim().is_empty() {
            return Err(ConfigError::new("discovery.search_target", "must not be empty"));
        }
        if !(1..=5).contains(&self.mx) {
            return Err(ConfigError::new("discovery.mx", "must be between 1 and 5"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::new("discovery.event_channel_capacity", "must be >= 1"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the AVR core library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;
        self.discovery.validate()
    }
}
