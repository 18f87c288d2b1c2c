//! CLI configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use avr_core::{ConnectionConfig, DiscoveryConfig};
use serde::Deserialize;

/// CLI configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// TCP port of the receiver control interface.
    /// Override: `AVR_PORT`
    pub port: u16,

    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Delay between reconnection attempts in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Volume ceiling assumed until the receiver reports one.
    /// Override: `AVR_MAX_VOLUME`
    pub default_max_volume: f64,

    /// Time allowed for the initial status refresh before a command is sent
    /// (milliseconds).
    pub status_settle_ms: u64,

    /// SSDP device type to search for.
    /// Override: `AVR_SEARCH_TARGET`
    pub search_target: String,

    /// SSDP MX value.
    pub mx: u8,

    /// Listen for NOTIFY announcements on the multicast port during discovery.
    pub listen_on_multicast_port: bool,

    /// Receiver cache file.
    /// Override: `AVR_CACHE_PATH`
    pub cache_path: Option<PathBuf>,
}

impl Default for CtlConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        let discovery = DiscoveryConfig::default();
        Self {
            port: connection.port,
            connect_timeout_ms: connection.connect_timeout_ms,
            reconnect_delay_ms: connection.reconnect_delay_ms,
            max_reconnect_attempts: connection.max_reconnect_attempts,
            default_max_volume: connection.default_max_volume,
            status_settle_ms: 500,
            search_target: discovery.search_target,
            mx: discovery.mx,
            listen_on_multicast_port: discovery.listen_on_multicast_port,
            cache_path: None,
        }
    }
}

impl CtlConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AVR_MAX_VOLUME") {
            if let Ok(max) = val.parse() {
                self.default_max_volume = max;
            }
        }

        if let Ok(val) = std::env::var("AVR_SEARCH_TARGET") {
            if !val.trim().is_empty() {
                self.search_target = val.trim().to_string();
            }
        }

        // Note: AVR_PORT and AVR_CACHE_PATH are handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to avr-core's Config type.
    pub fn to_core_config(&self) -> avr_core::Config {
        avr_core::Config {
            connection: ConnectionConfig {
                port: self.port,
                connect_timeout_ms: self.connect_timeout_ms,
                reconnect_delay_ms: self.reconnect_delay_ms,
                max_reconnect_attempts: self.max_reconnect_attempts,
                default_max_volume: self.default_max_volume,
                ..Default::default()
            },
            discovery: DiscoveryConfig {
                search_target: self.search_target.clone(),
                mx: self.mx,
                listen_on_multicast_port: self.listen_on_multicast_port,
                cache_path: self.cache_path.clone(),
                ..Default::default()
            },
        }
    }
}
