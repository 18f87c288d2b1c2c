//! Centralized error types for the AVR core library.
//!
//! Each subsystem defines its own `thiserror` enum next to the code that
//! produces it; this module ties them together with machine-readable codes
//! and an umbrella [`AvrError`] for callers that want a single type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connection::ConnectionError;
use crate::discovery::{CacheError, DiscoveryError};

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for ConnectionError {
    fn code(&self) -> &'static str {
        match self {
            Self::HostNotFound(_) => "host_not_found",
            Self::Io(_) => "connection_io_error",
            Self::Timeout(_) => "connection_timeout",
            Self::Closed => "connection_closed",
        }
    }
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::SendSearch(_) => "ssdp_send_failed",
            Self::NoInterfaces => "no_network_interfaces",
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_) => "http_error_status",
            Self::Xml(_) => "description_parse_error",
        }
    }
}

impl ErrorCode for CacheError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "cache_io_error",
            Self::Serialize(_) => "cache_format_error",
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        "invalid_configuration"
    }
}

/// Library-wide error type.
#[derive(Debug, Error)]
pub enum AvrError {
    /// Control session failure.
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// SSDP or description fetch failure.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Durable cache read/write failure.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for AvrError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connection(e) => e.code(),
            Self::Discovery(e) => e.code(),
            Self::Cache(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::discovery::DiscoveryResult;

/// Convenient Result alias for library-wide operations.
pub type AvrResult<T> = Result<T, AvrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_not_found_keeps_its_code_through_the_umbrella() {
        let err: AvrError = ConnectionError::HostNotFound("avr.local".into()).into();
        assert_eq!(err.code(), "host_not_found");
        assert!(err.to_string().contains("avr.local"));
    }

    #[test]
    fn discovery_codes_are_stable() {
        assert_eq!(DiscoveryError::NoInterfaces.code(), "no_network_interfaces");
        assert_eq!(DiscoveryError::HttpStatus(404).code(), "http_error_status");
    }
}
