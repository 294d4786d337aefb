//! # CLI Interface
//!
//! Command-line arguments for `lockerd`, via `clap` derive. Two
//! subcommands: `run` and `check-config`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use locker_core::LockerConfig;

use crate::logging::LogFormat;

/// Smart locker controller.
///
/// Runs one locker against emulated peripherals driven from stdin, talking
/// to the host bridge over TCP.
#[derive(Parser, Debug)]
#[command(name = "lockerd", about = "Smart locker controller", version, propagate_version = true)]
pub struct LockerdCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the locker.
    Run(RunArgs),
    /// Load and validate a configuration file, then print the effective values.
    CheckConfig(CheckConfigArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the YAML configuration file. Defaults are used when omitted.
    #[arg(long, short = 'c', env = "LOCKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bridge address (`host:port`), overriding the configuration.
    #[arg(long, env = "LOCKER_BRIDGE")]
    pub bridge: Option<String>,

    /// Run with no bridge at all; every borrow is denied locally.
    #[arg(long, conflicts_with = "bridge")]
    pub no_bridge: bool,

    #[command(flatten)]
    pub timing: TimingOverrides,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, env = "LOCKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOCKER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Per-value timing overrides, in milliseconds.
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct TimingOverrides {
    #[arg(long, env = "LOCKER_DOOR_OPEN_TIMEOUT_MS")]
    pub door_open_timeout_ms: Option<u64>,

    #[arg(long, env = "LOCKER_INPUT_TIMEOUT_MS")]
    pub input_timeout_ms: Option<u64>,

    #[arg(long, env = "LOCKER_AUTH_TIMEOUT_MS")]
    pub auth_timeout_ms: Option<u64>,

    #[arg(long, env = "LOCKER_MESSAGE_DURATION_MS")]
    pub message_duration_ms: Option<u64>,

    #[arg(long, env = "LOCKER_DEBOUNCE_MS")]
    pub debounce_ms: Option<u64>,

    #[arg(long, env = "LOCKER_CONNECT_WINDOW_MS")]
    pub connect_window_ms: Option<u64>,

    #[arg(long, env = "LOCKER_RECONNECT_INTERVAL_MS")]
    pub reconnect_interval_ms: Option<u64>,

    #[arg(long, env = "LOCKER_TICK_MS")]
    pub tick_ms: Option<u64>,
}

impl TimingOverrides {
    /// Write every given override into `config`.
    pub fn apply(&self, config: &mut LockerConfig) {
        let timing = &mut config.timing;
        let overrides = [
            (self.door_open_timeout_ms, &mut timing.door_open_timeout_ms),
            (self.input_timeout_ms, &mut timing.input_timeout_ms),
            (self.auth_timeout_ms, &mut timing.auth_timeout_ms),
            (self.message_duration_ms, &mut timing.message_duration_ms),
            (self.debounce_ms, &mut timing.debounce_ms),
            (self.connect_window_ms, &mut timing.connect_window_ms),
            (self.reconnect_interval_ms, &mut timing.reconnect_interval_ms),
            (self.tick_ms, &mut timing.tick_ms),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut LockerConfig) {
        if let Some(bridge) = &self.bridge {
            config.link.bridge_addr.clone_from(bridge);
        }
        self.timing.apply(config);
    }
}

/// Arguments for the `check-config` subcommand.
#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', env = "LOCKER_CONFIG")]
    pub config: PathBuf,
}
