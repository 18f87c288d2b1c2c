//! Typed vocabulary of the receiver control protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A token did not belong to the expected vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} token: {token:?}")]
pub struct UnknownToken {
    pub kind: &'static str,
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone
// ─────────────────────────────────────────────────────────────────────────────

/// An independently controllable audio output of the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Zone {
    Main,
    Zone2,
}

impl Zone {
    /// Every zone tracked by a connection, in index order.
    pub const ALL: [Zone; 2] = [Zone::Main, Zone::Zone2];

    /// Zone index (0 = main, 1 = secondary).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Zone2 => 1,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main zone"),
            Self::Zone2 => write!(f, "zone 2"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Source
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! sources {
    ($($variant:ident => $token:literal),+ $(,)?) => {
        /// Input selector tokens understood by the receiver.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Source {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl Source {
            /// Every known source, in vocabulary order.
            pub const ALL: &'static [Source] = &[$(Source::$variant),+];

            /// Wire token for this source.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }
        }
    };
}

sources! {
    Phono => "PHONO",
    Cd => "CD",
    Tuner => "TUNER",
    Dvd => "DVD",
    Bd => "BD",
    Tv => "TV",
    SatCbl => "SAT/CBL",
    MediaPlayer => "MPLAY",
    Game => "GAME",
    HdRadio => "HDRADIO",
    Net => "NET",
    Pandora => "PANDORA",
    SiriusXm => "SIRIUSXM",
    Spotify => "SPOTIFY",
    LastFm => "LASTFM",
    Flickr => "FLICKR",
    InternetRadio => "IRADIO",
    Server => "SERVER",
    Favorites => "FAVORITES",
    Aux1 => "AUX1",
    Aux2 => "AUX2",
    Aux3 => "AUX3",
    Aux4 => "AUX4",
    Aux5 => "AUX5",
    Aux6 => "AUX6",
    Aux7 => "AUX7",
    Bluetooth => "BT",
    UsbIpod => "USB/IPOD",
    Usb => "USB",
    Ipod => "IPD",
    InternetRadioPreset => "IRP",
    FavoritesPreset => "FVP",
}

impl FromStr for Source {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownToken {
                kind: "source",
                token: token.to_string(),
            })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dynamic Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Loudness-normalization intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicVolume {
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "LIT")]
    Light,
    #[serde(rename = "MED")]
    Medium,
    #[serde(rename = "HEV")]
    Heavy,
}

impl DynamicVolume {
    pub const ALL: [DynamicVolume; 4] = [Self::Off, Self::Light, Self::Medium, Self::Heavy];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Light => "LIT",
            Self::Medium => "MED",
            Self::Heavy => "HEV",
        }
    }
}

impl FromStr for DynamicVolume {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownToken {
                kind: "dynamic volume",
                token: token.to_string(),
            })
    }
}

impl fmt::Display for DynamicVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoded Status
// ─────────────────────────────────────────────────────────────────────────────

/// A single status delta decoded from one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusUpdate {
    Power(bool),
    Volume(f64),
    MaxVolume(f64),
    Mute(bool),
    Source(Source),
    DynamicVolume(DynamicVolume),
}

/// A status delta routed to its zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedLine {
    pub zone: Zone,
    pub update: StatusUpdate,
}
