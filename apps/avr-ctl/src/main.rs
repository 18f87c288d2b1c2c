//! avr-ctl - command line control for networked A/V receivers.
//!
//! Discovers receivers over SSDP and drives a single receiver's control
//! session for one command, or streams its events until interrupted.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use avr_core::{
    AvrContext, ConnectionEventKind, ConnectionState, DiscoveredReceiver, DynamicVolume,
    ReceiverConnection, Source, Zone, ZoneStatus,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use crate::config::CtlConfig;

/// Time allowed for a queued command to reach the socket before disconnecting.
const COMMAND_FLUSH: Duration = Duration::from_millis(200);

/// avr-ctl - Discover and control networked A/V receivers.
#[derive(Parser, Debug)]
#[command(name = "avr-ctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "warn", env = "AVR_LOG_LEVEL", global = true)]
    log_level: log::LevelFilter,

    /// Control port (overrides config file).
    #[arg(short = 'p', long, env = "AVR_PORT", global = true)]
    port: Option<u16>,

    /// Receiver cache file (overrides config file).
    #[arg(long, value_name = "FILE", env = "AVR_CACHE_PATH", global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the network and list receivers.
    Discover {
        /// Number of search rounds.
        #[arg(long, default_value_t = 3)]
        rounds: u32,

        /// Seconds to wait after each round.
        #[arg(long, default_value_t = 2.0)]
        wait: f64,
    },

    /// Print the status of every zone.
    Status { host: String },

    /// Switch a zone on or off.
    Power {
        host: String,
        #[arg(short, long, value_enum, default_value_t = ZoneArg::Main)]
        zone: ZoneArg,
        #[arg(value_enum)]
        action: Switch,
    },

    /// Change a zone's volume.
    Volume {
        host: String,
        #[arg(short, long, value_enum, default_value_t = ZoneArg::Main)]
        zone: ZoneArg,
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Mute or unmute a zone.
    Mute {
        host: String,
        #[arg(short, long, value_enum, default_value_t = ZoneArg::Main)]
        zone: ZoneArg,
        #[arg(value_enum)]
        action: Switch,
    },

    /// Select a zone's input source.
    Source {
        host: String,
        #[arg(short, long, value_enum, default_value_t = ZoneArg::Main)]
        zone: ZoneArg,
        /// Source token (e.g. CD, TUNER, SAT/CBL).
        source: Source,
    },

    /// Select the main zone's video source.
    Video { host: String, source: Source },

    /// Set the main zone's dynamic volume mode (off, lit, med, hev).
    Dynvol { host: String, mode: DynamicVolume },

    /// Print receiver events as JSON lines until interrupted.
    Watch { host: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ZoneArg {
    Main,
    Zone2,
}

impl From<ZoneArg> for Zone {
    fn from(zone: ZoneArg) -> Self {
        match zone {
            ZoneArg::Main => Zone::Main,
            ZoneArg::Zone2 => Zone::Zone2,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
    Toggle,
}

impl Switch {
    /// `None` means toggle.
    fn target(self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Toggle => None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum VolumeAction {
    /// One step up.
    Up,
    /// One step down.
    Down,
    /// Absolute level in receiver units (0.5 steps).
    Set { level: f64 },
    /// Relative change in whole steps.
    Step {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::debug!("avr-ctl v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        CtlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(cache) = args.cache {
        config.cache_path = Some(cache);
    }

    let ctx = AvrContext::new(config.to_core_config()).context("Invalid configuration")?;
    let settle = Duration::from_millis(config.status_settle_ms);

    let result = match args.command {
        Command::Discover { rounds, wait } => discover(&ctx, rounds, wait).await,
        Command::Status { host } => status(&ctx, &host, settle).await,
        Command::Power { host, zone, action } => {
            run_command(&ctx, &host, settle, |conn| {
                conn.set_power(zone.into(), action.target())
            })
            .await
        }
        Command::Volume { host, zone, action } => {
            let zone = Zone::from(zone);
            run_command(&ctx, &host, settle, |conn| match action {
                VolumeAction::Up => conn.change_volume_relative(zone, 1),
                VolumeAction::Down => conn.change_volume_relative(zone, -1),
                VolumeAction::Set { level } => conn.change_volume_absolute(zone, level),
                VolumeAction::Step { delta } => conn.change_volume_relative(zone, delta),
            })
            .await
        }
        Command::Mute { host, zone, action } => {
            run_command(&ctx, &host, settle, |conn| {
                conn.set_mute(zone.into(), action.target())
            })
            .await
        }
        Command::Source { host, zone, source } => {
            run_command(&ctx, &host, settle, |conn| {
                conn.set_source(zone.into(), source)
            })
            .await
        }
        Command::Video { host, source } => {
            run_command(&ctx, &host, settle, |conn| {
                conn.set_video_select_source(Zone::Main, source)
            })
            .await
        }
        Command::Dynvol { host, mode } => {
            run_command(&ctx, &host, settle, |conn| {
                conn.set_dynamic_volume(Zone::Main, mode)
            })
            .await
        }
        Command::Watch { host } => watch(&ctx, &host).await,
    };

    ctx.shutdown().await;
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

async fn discover(ctx: &AvrContext, rounds: u32, wait: f64) -> Result<()> {
    if !wait.is_finite() || wait < 0.0 {
        bail!("--wait must be a non-negative number of seconds");
    }
    ctx.tracker().load_cache();
    let receivers = ctx
        .tracker()
        .search_for_receivers(rounds.max(1), Duration::from_secs_f64(wait))
        .await;

    if receivers.is_empty() {
        println!("No receivers found");
        return Ok(());
    }
    print_receivers(&receivers);
    Ok(())
}

async fn status(ctx: &AvrContext, target: &str, settle: Duration) -> Result<()> {
    let conn = open(ctx, target, settle).await?;
    let snapshot = conn.snapshot();
    println!("{} ({})", snapshot.host, snapshot.identity);
    for zone in Zone::ALL {
        print_zone(zone, &conn.zone_status(zone));
    }
    Ok(())
}

async fn run_command(
    ctx: &AvrContext,
    target: &str,
    settle: Duration,
    command: impl FnOnce(&ReceiverConnection) -> bool,
) -> Result<()> {
    let conn = open(ctx, target, settle).await?;
    if !command(&conn) {
        bail!("Command not sent (receiver off or status unknown?)");
    }
    tokio::time::sleep(COMMAND_FLUSH).await;
    println!("OK");
    Ok(())
}

async fn watch(ctx: &AvrContext, target: &str) -> Result<()> {
    let conn = connection(ctx, target).await;
    let mut events = conn.subscribe();
    conn.connect();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Shutdown signal received");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if event.snapshot.state == ConnectionState::Failed {
                        bail!("{}", event.snapshot.status_message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves `target` against the receiver cache (identity or friendly name),
/// falling back to treating it as a host name or address.
async fn connection(ctx: &AvrContext, target: &str) -> ReceiverConnection {
    ctx.tracker().load_cache();
    let cached = ctx.tracker().receivers().into_iter().find(|r| {
        r.identity.eq_ignore_ascii_case(target)
            || r
                .friendly_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(target))
    });
    match cached {
        Some(receiver) => {
            log::debug!(
                "Using cached receiver {} at {}",
                receiver.identity,
                receiver.current_address
            );
            ctx.connection_for(&receiver).await
        }
        None => ctx.connection_for_host(target, target).await,
    }
}

/// Connects and waits for the initial status refresh.
async fn open(ctx: &AvrContext, target: &str, settle: Duration) -> Result<ReceiverConnection> {
    let conn = connection(ctx, target).await;
    let mut events = conn.subscribe();
    conn.connect();

    loop {
        match events.recv().await {
            Ok(event) => match event.kind {
                ConnectionEventKind::Connected => break,
                _ if event.snapshot.state == ConnectionState::Failed => {
                    bail!("{}", event.snapshot.status_message)
                }
                ConnectionEventKind::Status { message } => log::info!("{}", message),
                _ => {}
            },
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("Connection to {} closed", conn.host()),
        }
    }

    tokio::time::sleep(settle).await;
    Ok(conn)
}

fn print_receivers(receivers: &[DiscoveredReceiver]) {
    let rows: Vec<[&str; 3]> = receivers
        .iter()
        .map(|r| {
            [
                r.identity.as_str(),
                r.current_address.as_str(),
                r.friendly_name.as_deref().unwrap_or("-"),
            ]
        })
        .collect();
    let headers = ["IDENTITY", "ADDRESS", "NAME"];
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(headers[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    for row in std::iter::once(headers).chain(rows) {
        println!(
            "{:<w0$}  {:<w1$}  {}",
            row[0],
            row[1],
            row[2],
            w0 = widths[0],
            w1 = widths[1]
        );
    }
}

fn print_zone(zone: Zone, status: &ZoneStatus) {
    fn show<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "?".to_string(), |v| v.to_string())
    }
    let power = status.power.map(|on| if on { "on" } else { "standby" });
    println!(
        "  {:<9} power={} volume={}/{} muted={} source={} dynvol={}",
        zone.to_string(),
        show(power),
        show(status.volume),
        status.max_volume,
        show(status.muted),
        show(status.source),
        show(status.dynamic_volume),
    );
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
