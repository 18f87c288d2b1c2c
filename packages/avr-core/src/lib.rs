//! AVR Core - control-plane library for networked A/V receivers.
//!
//! This crate discovers receivers on the local network and drives their
//! line-oriented TCP control protocol. It is used by the `avr-ctl` command
//! line tool and can be embedded in other hosts.
//!
//! # Architecture
//!
//! - [`protocol`]: pure command encoding, status-line decoding and the
//!   telnet-aware line codec
//! - [`connection`]: one control session per receiver with status tracking,
//!   change events and bounded reconnect
//! - [`discovery`]: SSDP search/listen, the receiver cache and its
//!   durable store
//! - [`registry`]: connections keyed by receiver identity
//! - [`context`]: wires configuration, discovery and connections together
//! - [`config`]: tunables with defaults and validation
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! I/O sits behind traits so the state machines can be tested without a
//! network:
//!
//! - [`Connector`](connection::Connector): opening control sockets
//! - [`SsdpTransport`](discovery::SsdpTransport): multicast search and listen
//! - [`DescriptionFetcher`](discovery::DescriptionFetcher): device descriptions
//! - [`CacheStore`](discovery::CacheStore): durable receiver cache

#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod context;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod protocol_constants;
pub mod registry;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::{Config, ConfigError, ConnectionConfig, DiscoveryConfig};
pub use context::AvrContext;
pub use error::{AvrError, AvrResult, ErrorCode};
pub use registry::ConnectionRegistry;
pub use utils::now_millis;

// Re-export connection types
pub use connection::{
    ConnectionError, ConnectionEvent, ConnectionEventKind, ConnectionState, ReceiverConnection,
    ReceiverSnapshot, ZoneStatus,
};

// Re-export discovery types
pub use discovery::{DiscoveredReceiver, DiscoveryError, DiscoveryTracker, TrackerEvent};

// Re-export protocol types
pub use protocol::{DynamicVolume, Source, Zone};
