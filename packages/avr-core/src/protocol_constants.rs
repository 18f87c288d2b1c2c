//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the receiver's control protocol and by SSDP,
//! and changing them would break interoperability with real devices.

use std::net::Ipv4Addr;

// ─────────────────────────────────────────────────────────────────────────────
// Control Protocol (telnet-style line protocol)
// ─────────────────────────────────────────────────────────────────────────────

/// TCP port the receiver's control interface listens on.
pub const CONTROL_PORT: u16 = 23;

/// Line terminator for both requests and responses.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Prefix routing a command or status line to the secondary zone.
pub const ZONE2_PREFIX: &str = "Z2";

/// Vendor volume ceiling assumed until the device reports its own.
pub const DEFAULT_MAX_VOLUME: f64 = 85.0;

/// Highest volume the two/three-digit wire format can carry.
pub const WIRE_VOLUME_CEILING: f64 = 98.0;

// ─────────────────────────────────────────────────────────────────────────────
// Telnet Option Negotiation
// ─────────────────────────────────────────────────────────────────────────────

/// Interpret-as-command escape byte.
pub const IAC: u8 = 255;
/// Sender refuses to perform an option.
pub const DONT: u8 = 254;
/// Sender asks the peer to perform an option.
pub const DO: u8 = 253;
/// Sender refuses an option.
pub const WONT: u8 = 252;
/// Sender offers to perform an option.
pub const WILL: u8 = 251;
/// Start of sub-negotiation.
pub const SB: u8 = 250;
/// End of sub-negotiation.
pub const SE: u8 = 240;

// ─────────────────────────────────────────────────────────────────────────────
// Reconnection
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed delay between reconnection attempts (milliseconds).
pub const RECONNECT_DELAY_MS: u64 = 1000;

/// Consecutive failed reconnection attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// SSDP (Simple Service Discovery Protocol)
// ─────────────────────────────────────────────────────────────────────────────

/// SSDP multicast group.
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP port.
pub const SSDP_PORT: u16 = 1900;

/// Device type advertised by network-enabled receivers.
pub const RECEIVER_SEARCH_TARGET: &str = "urn:schemas-denon-com:device:ACT-DenonAVR:1";

/// Multicast TTL for M-SEARCH packets.
///
/// 4 hops covers typical home networks with a few routers.
pub const SSDP_MULTICAST_TTL: u32 = 4;

/// Largest SSDP datagram we accept.
pub const SSDP_MAX_DATAGRAM: usize = 2048;
