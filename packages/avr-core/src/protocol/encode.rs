//! Outgoing command encoding.
//!
//! Functions here return the command text without the trailing CR; the line
//! codec appends the terminator when the command is written.

use crate::protocol_constants::{WIRE_VOLUME_CEILING, ZONE2_PREFIX};

use super::types::{DynamicVolume, Source, Zone};

/// Prefix for power, volume and mute commands.
#[must_use]
pub fn command_prefix(zone: Zone) -> &'static str {
    match zone {
        Zone::Main => "",
        Zone::Zone2 => ZONE2_PREFIX,
    }
}

/// Prefix for source selection. The secondary zone takes the bare token.
#[must_use]
pub fn source_prefix(zone: Zone) -> &'static str {
    match zone {
        Zone::Main => "SI",
        Zone::Zone2 => ZONE2_PREFIX,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Volume request sent to the receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeCommand {
    Up,
    Down,
    Absolute(f64),
}

/// Result of planning a relative volume change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeVolume {
    pub command: VolumeCommand,
    /// Expected volume once the receiver applies the command.
    pub target: f64,
}

/// Plans a relative change of `delta` whole steps from `current`.
///
/// Single steps use the receiver's own `UP`/`DOWN` tokens when the step
/// stays inside `[0, max_volume]`; otherwise the clamped target is sent as an
/// absolute level. Returns `None` for a zero delta or when the clamped target
/// is the current volume.
#[must_use]
pub fn plan_relative_volume(current: f64, delta: i32, max_volume: f64) -> Option<RelativeVolume> {
    if delta == 0 {
        return None;
    }
    let ceiling = max_volume.max(0.0);
    let stepped = current + f64::from(delta);
    let target = stepped.clamp(0.0, ceiling);
    if target == current {
        return None;
    }
    let command = match delta {
        1 | -1 if target == stepped => {
            if delta > 0 {
                VolumeCommand::Up
            } else {
                VolumeCommand::Down
            }
        }
        _ => VolumeCommand::Absolute(target),
    };
    Some(RelativeVolume { command, target })
}

/// Formats a volume for the wire.
///
/// Whole numbers are two digits, zero padded (`05`, `45`). Half steps are
/// three digits carrying tenths (`455` = 45.5). Values are snapped to the
/// nearest half step and limited to what the format can carry.
#[must_use]
pub fn format_volume(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let snapped = ((value.clamp(0.0, WIRE_VOLUME_CEILING)) * 2.0).round() / 2.0;
    if snapped.fract() == 0.0 {
        format!("{:02}", snapped as u32)
    } else {
        format!("{:03}", (snapped * 10.0).round() as u32)
    }
}

#[must_use]
pub fn encode_volume(zone: Zone, command: VolumeCommand) -> String {
    let prefix = command_prefix(zone);
    match command {
        VolumeCommand::Up => format!("{prefix}MVUP"),
        VolumeCommand::Down => format!("{prefix}MVDOWN"),
        VolumeCommand::Absolute(value) => format!("{prefix}MV{}", format_volume(value)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Power / Mute / Inputs
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn encode_power(zone: Zone, on: bool) -> String {
    let value = if on { "ON" } else { "STANDBY" };
    format!("{}PW{value}", command_prefix(zone))
}

#[must_use]
pub fn encode_mute(zone: Zone, muted: bool) -> String {
    let value = if muted { "ON" } else { "OFF" };
    format!("{}MU{value}", command_prefix(zone))
}

#[must_use]
pub fn encode_source(zone: Zone, source: Source) -> String {
    format!("{}{}", source_prefix(zone), source.as_str())
}

/// Video select is a main-zone feature.
#[must_use]
pub fn encode_video_select(zone: Zone, source: Source) -> Option<String> {
    (zone == Zone::Main).then(|| format!("SV{}", source.as_str()))
}

/// Dynamic volume is only known to exist on the main zone.
#[must_use]
pub fn encode_dynamic_volume(zone: Zone, mode: DynamicVolume) -> Option<String> {
    (zone == Zone::Main).then(|| format!("PSDYNVOL {}", mode.as_str()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Status Refresh
// ─────────────────────────────────────────────────────────────────────────────

/// One query per tracked field for `zone`.
#[must_use]
pub fn refresh_queries(zone: Zone) -> Vec<String> {
    let prefix = command_prefix(zone);
    let mut queries = vec![
        format!("{prefix}PW?"),
        format!("{prefix}MV?"),
        format!("{prefix}MU?"),
        format!("{}?", source_prefix(zone)),
    ];
    if zone == Zone::Main {
        queries.push("PSDYNVOL ?".to_string());
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_uses_distinct_prefix_per_zone() {
        assert_eq!(encode_source(Zone::Main, Source::Cd), "SICD");
        assert_eq!(encode_source(Zone::Zone2, Source::Cd), "Z2CD");
    }

    #[test]
    fn power_and_mute_prefixes() {
        assert_eq!(encode_power(Zone::Main, true), "PWON");
        assert_eq!(encode_power(Zone::Zone2, false), "Z2PWSTANDBY");
        assert_eq!(encode_mute(Zone::Main, true), "MUON");
        assert_eq!(encode_mute(Zone::Zone2, false), "Z2MUOFF");
    }

    #[test]
    fn volumes_are_zero_padded() {
        assert_eq!(encode_volume(Zone::Main, VolumeCommand::Absolute(5.0)), "MV05");
        assert_eq!(encode_volume(Zone::Main, VolumeCommand::Absolute(45.0)), "MV45");
        assert_eq!(encode_volume(Zone::Zone2, VolumeCommand::Absolute(0.0)), "Z2MV00");
    }

    #[test]
    fn half_steps_use_three_digits() {
        assert_eq!(format_volume(35.5), "355");
        assert_eq!(format_volume(0.5), "005");
        assert_eq!(format_volume(35.4), "355");
    }

    #[test]
    fn wire_format_saturates() {
        assert_eq!(format_volume(-3.0), "00");
        assert_eq!(format_volume(250.0), "98");
        assert_eq!(format_volume(f64::NAN), "00");
    }

    #[test]
    fn single_steps_use_up_down_tokens() {
        let up = plan_relative_volume(40.0, 1, 85.0).unwrap();
        assert_eq!(up.command, VolumeCommand::Up);
        assert_eq!(up.target, 41.0);
        assert_eq!(encode_volume(Zone::Main, up.command), "MVUP");

        let down = plan_relative_volume(40.0, -1, 85.0).unwrap();
        assert_eq!(encode_volume(Zone::Zone2, down.command), "Z2MVDOWN");
    }

    #[test]
    fn larger_steps_clamp_to_range() {
        let plan = plan_relative_volume(80.0, 10, 85.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(85.0));

        let plan = plan_relative_volume(3.0, -10, 85.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(0.0));
    }

    #[test]
    fn zero_delta_plans_nothing() {
        assert_eq!(plan_relative_volume(40.0, 0, 85.0), None);
    }

    #[test]
    fn single_steps_never_cross_bounds() {
        assert_eq!(plan_relative_volume(85.0, 1, 85.0), None);
        assert_eq!(plan_relative_volume(0.0, -1, 85.0), None);

        let plan = plan_relative_volume(84.5, 1, 85.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(85.0));
        assert_eq!(encode_volume(Zone::Main, plan.command), "MV85");

        let plan = plan_relative_volume(0.5, -1, 85.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(0.0));

        // Ceiling lowered below the current level.
        let plan = plan_relative_volume(90.0, -1, 80.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(80.0));
        let plan = plan_relative_volume(90.0, 1, 80.0).unwrap();
        assert_eq!(plan.command, VolumeCommand::Absolute(80.0));
    }

    #[test]
    fn relative_target_always_within_bounds() {
        for max in [0.0, 50.0, 85.0, 85.5, 98.0] {
            for start in (0..=196).map(|v| f64::from(v) / 2.0) {
                for delta in -120..=120 {
                    if let Some(plan) = plan_relative_volume(start, delta, max) {
                        assert!(
                            (0.0..=max).contains(&plan.target),
                            "start={start} delta={delta} max={max} target={}",
                            plan.target
                        );
                        let applied = match plan.command {
                            VolumeCommand::Up => start + 1.0,
                            VolumeCommand::Down => start - 1.0,
                            VolumeCommand::Absolute(v) => v,
                        };
                        assert!(
                            (0.0..=max).contains(&applied),
                            "start={start} delta={delta} max={max} applied={applied}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn main_zone_only_commands() {
        assert_eq!(
            encode_video_select(Zone::Main, Source::Game).as_deref(),
            Some("SVGAME")
        );
        assert_eq!(encode_video_select(Zone::Zone2, Source::Game), None);
        assert_eq!(
            encode_dynamic_volume(Zone::Main, DynamicVolume::Heavy).as_deref(),
            Some("PSDYNVOL HEV")
        );
        assert_eq!(encode_dynamic_volume(Zone::Zone2, DynamicVolume::Off), None);
    }

    #[test]
    fn refresh_covers_every_tracked_field() {
        assert_eq!(
            refresh_queries(Zone::Main),
            ["PW?", "MV?", "MU?", "SI?", "PSDYNVOL ?"]
        );
        assert_eq!(refresh_queries(Zone::Zone2), ["Z2PW?", "Z2MV?", "Z2MU?", "Z2?"]);
    }
}
