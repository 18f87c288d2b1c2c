//! Typed connection events.

use serde::Serialize;

use crate::protocol::{DynamicVolume, Source, Zone};

use super::status::ReceiverSnapshot;

/// What happened on a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectionEventKind {
    /// Socket opened and status refresh issued.
    Connected,
    /// Socket closed, or an open attempt failed.
    #[serde(rename_all = "camelCase")]
    Closed { had_error: bool },
    PowerChanged { zone: Zone, power: bool },
    VolumeChanged { zone: Zone, volume: f64 },
    #[serde(rename_all = "camelCase")]
    MaxVolumeChanged { zone: Zone, max_volume: f64 },
    MuteChanged { zone: Zone, muted: bool },
    SourceChanged { zone: Zone, source: Source },
    DynamicVolumeChanged { zone: Zone, mode: DynamicVolume },
    /// The human-readable status message changed.
    Status { message: String },
}

impl ConnectionEventKind {
    /// Zone the event refers to, for status changes.
    #[must_use]
    pub fn zone(&self) -> Option<Zone> {
        match self {
            Self::PowerChanged { zone, .. }
            | Self::VolumeChanged { zone, .. }
            | Self::MaxVolumeChanged { zone, .. }
            | Self::MuteChanged { zone, .. }
            | Self::SourceChanged { zone, .. }
            | Self::DynamicVolumeChanged { zone, .. } => Some(*zone),
            Self::Connected | Self::Closed { .. } | Self::Status { .. } => None,
        }
    }

    /// Whether this is a zone status change.
    #[must_use]
    pub fn is_status_change(&self) -> bool {
        self.zone().is_some()
    }
}

/// An event with the connection it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEvent {
    pub identity: String,
    #[serde(flatten)]
    pub kind: ConnectionEventKind,
    pub snapshot: ReceiverSnapshot,
}
