//! Per-zone status and connection state.

use serde::Serialize;

use crate::protocol::{DynamicVolume, Source, StatusUpdate, Zone};

use super::events::ConnectionEventKind;

/// Lifecycle of a receiver connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Reconnecting,
    /// Terminal until the caller connects again.
    Failed,
}

/// Last known status of one zone. `None` means not yet reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    pub power: Option<bool>,
    pub volume: Option<f64>,
    pub max_volume: f64,
    pub muted: Option<bool>,
    pub source: Option<Source>,
    /// Only reported for the main zone.
    pub dynamic_volume: Option<DynamicVolume>,
}

impl ZoneStatus {
    #[must_use]
    pub fn new(max_volume: f64) -> Self {
        Self {
            power: None,
            volume: None,
            max_volume,
            muted: None,
            source: None,
            dynamic_volume: None,
        }
    }

    /// Applies a decoded delta, returning the change events it causes.
    ///
    /// Values identical to the held ones produce nothing. A volume report
    /// also clears mute.
    pub fn apply(&mut self, zone: Zone, update: StatusUpdate) -> Vec<ConnectionEventKind> {
        let mut changes = Vec::new();
        match update {
            StatusUpdate::Power(power) => {
                if replace(&mut self.power, power) {
                    changes.push(ConnectionEventKind::PowerChanged { zone, power });
                }
            }
            StatusUpdate::Volume(volume) => {
                // Only a new level implies unmuted; a repeated report does not.
                if replace(&mut self.volume, volume) {
                    changes.push(ConnectionEventKind::VolumeChanged { zone, volume });
                    if replace(&mut self.muted, false) {
                        changes.push(ConnectionEventKind::MuteChanged { zone, muted: false });
                    }
                }
            }
            StatusUpdate::MaxVolume(max_volume) => {
                if self.max_volume != max_volume {
                    self.max_volume = max_volume;
                    changes.push(ConnectionEventKind::MaxVolumeChanged { zone, max_volume });
                }
            }
            StatusUpdate::Mute(muted) => {
                if replace(&mut self.muted, muted) {
                    changes.push(ConnectionEventKind::MuteChanged { zone, muted });
                }
            }
            StatusUpdate::Source(source) => {
                if replace(&mut self.source, source) {
                    changes.push(ConnectionEventKind::SourceChanged { zone, source });
                }
            }
            StatusUpdate::DynamicVolume(mode) => {
                if replace(&mut self.dynamic_volume, mode) {
                    changes.push(ConnectionEventKind::DynamicVolumeChanged { zone, mode });
                }
            }
        }
        changes
    }
}

/// Stores `value`, returning whether it differed from the held one.
fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

/// Point-in-time copy of a connection, carried by every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSnapshot {
    pub host: String,
    pub identity: String,
    pub zones: Vec<ZoneStatus>,
    pub state: ConnectionState,
    pub status_message: String,
    pub reconnect_attempts: u32,
}

impl ReceiverSnapshot {
    #[must_use]
    pub fn zone(&self, zone: Zone) -> Option<&ZoneStatus> {
        self.zones.get(zone.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_are_suppressed() {
        let mut status = ZoneStatus::new(85.0);
        assert_eq!(status.apply(Zone::Main, StatusUpdate::Power(true)).len(), 1);
        assert!(status.apply(Zone::Main, StatusUpdate::Power(true)).is_empty());
        assert_eq!(status.apply(Zone::Main, StatusUpdate::Power(false)).len(), 1);
    }

    #[test]
    fn volume_report_clears_mute() {
        let mut status = ZoneStatus::new(85.0);
        status.apply(Zone::Main, StatusUpdate::Mute(true));
        let changes = status.apply(Zone::Main, StatusUpdate::Volume(40.0));
        assert_eq!(
            changes,
            vec![
                ConnectionEventKind::VolumeChanged {
                    zone: Zone::Main,
                    volume: 40.0
                },
                ConnectionEventKind::MuteChanged {
                    zone: Zone::Main,
                    muted: false
                },
            ]
        );
        assert_eq!(status.muted, Some(false));
    }

    #[test]
    fn repeated_volume_report_keeps_mute() {
        let mut status = ZoneStatus::new(85.0);
        status.apply(Zone::Main, StatusUpdate::Volume(40.0));
        status.apply(Zone::Main, StatusUpdate::Mute(true));

        let changes = status.apply(Zone::Main, StatusUpdate::Volume(40.0));

        assert!(changes.is_empty());
        assert_eq!(status.muted, Some(true));
    }

    #[test]
    fn max_volume_revision() {
        let mut status = ZoneStatus::new(85.0);
        assert!(status
            .apply(Zone::Main, StatusUpdate::MaxVolume(85.0))
            .is_empty());
        assert_eq!(
            status.apply(Zone::Main, StatusUpdate::MaxVolume(80.5)),
            vec![ConnectionEventKind::MaxVolumeChanged {
                zone: Zone::Main,
                max_volume: 80.5
            }]
        );
    }
}
