//! Incoming status line decoding.
//!
//! Lines are routed by an optional `Z2` zone prefix, then dispatched through
//! a table keyed on the two-letter command code. `PS` parameter lines are
//! space delimited and dispatched on the parameter name instead.

use crate::protocol_constants::ZONE2_PREFIX;

use super::types::{DecodedLine, DynamicVolume, Source, StatusUpdate, Zone};

type ParseFn = fn(&str) -> Option<StatusUpdate>;

/// Fixed-width command codes.
const CODE_TABLE: &[(&str, ParseFn)] = &[
    ("PW", parse_power),
    ("MV", parse_master_volume),
    ("MU", parse_mute),
    ("SI", parse_source),
];

/// `PS<NAME> <VALUE>` parameters.
const PARAMETER_TABLE: &[(&str, ParseFn)] = &[("DYNVOL", parse_dynamic_volume)];

/// Secondary-zone shorthand replies (`Z2ON`, `Z245`, `Z2CD`), tried in order.
const ZONE2_SHORTHAND: &[ParseFn] = &[parse_power, parse_volume_value, parse_source];

const PARAMETER_PREFIX: &str = "PS";

/// Decodes one line (without its terminator) into a zone-routed status delta.
///
/// Returns `None` for blank, unknown or malformed lines; these are logged at
/// debug level and never treated as errors.
pub fn decode_line(line: &str) -> Option<DecodedLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (zone, body) = match line.strip_prefix(ZONE2_PREFIX) {
        Some(rest) => (Zone::Zone2, rest),
        None => (Zone::Main, line),
    };

    let update = if let Some(parameter) = body.strip_prefix(PARAMETER_PREFIX) {
        if zone == Zone::Zone2 {
            log::debug!("[Codec] Ignoring zone 2 parameter line: {line}");
            return None;
        }
        decode_parameter(parameter)
    } else {
        decode_code(body).or_else(|| match zone {
            Zone::Zone2 => ZONE2_SHORTHAND.iter().find_map(|parse| parse(body)),
            Zone::Main => None,
        })
    };

    match update {
        Some(update) => Some(DecodedLine { zone, update }),
        None => {
            log::debug!("[Codec] Ignoring unrecognized line: {line}");
            None
        }
    }
}

fn decode_code(body: &str) -> Option<StatusUpdate> {
    let code = body.get(..2)?;
    let value = &body[2..];
    CODE_TABLE
        .iter()
        .find(|(key, _)| *key == code)
        .and_then(|(_, parse)| parse(value))
}

fn decode_parameter(parameter: &str) -> Option<StatusUpdate> {
    let (name, value) = parameter.split_once(' ')?;
    PARAMETER_TABLE
        .iter()
        .find(|(key, _)| *key == name)
        .and_then(|(_, parse)| parse(value))
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Parsers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_power(value: &str) -> Option<StatusUpdate> {
    match value {
        "ON" => Some(StatusUpdate::Power(true)),
        "STANDBY" | "OFF" => Some(StatusUpdate::Power(false)),
        _ => None,
    }
}

fn parse_mute(value: &str) -> Option<StatusUpdate> {
    match value {
        "ON" => Some(StatusUpdate::Mute(true)),
        "OFF" => Some(StatusUpdate::Mute(false)),
        _ => None,
    }
}

fn parse_source(value: &str) -> Option<StatusUpdate> {
    value.parse::<Source>().ok().map(StatusUpdate::Source)
}

fn parse_dynamic_volume(value: &str) -> Option<StatusUpdate> {
    value
        .parse::<DynamicVolume>()
        .ok()
        .map(StatusUpdate::DynamicVolume)
}

fn parse_master_volume(value: &str) -> Option<StatusUpdate> {
    match value.strip_prefix("MAX") {
        Some(max) => volume_digits(max.trim_start()).map(StatusUpdate::MaxVolume),
        None => parse_volume_value(value),
    }
}

fn parse_volume_value(value: &str) -> Option<StatusUpdate> {
    volume_digits(value).map(StatusUpdate::Volume)
}

/// Reads a wire volume.
///
/// One or two digits are whole steps. Three digits carry tenths, so the
/// number is divided by ten (`355` is 35.5). The `MAX` form uses the same
/// rule.
fn volume_digits(digits: &str) -> Option<f64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let raw: u32 = digits.parse().ok()?;
    match digits.len() {
        1 | 2 => Some(f64::from(raw)),
        3 => Some(f64::from(raw) / 10.0),
        _ => None,
    }
}
