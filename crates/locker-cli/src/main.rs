//! # lockerd
//!
//! Entry point for the locker controller binary. Parses CLI arguments,
//! initializes logging, assembles a locker on emulated peripherals and runs
//! its tick loop until `quit`, end of input or Ctrl-C.
//!
//! - `run`          run the locker
//! - `check-config` validate a configuration file and print it

mod cli;
mod console;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use locker_controller::{Locker, MockTransport, TickReport};
use locker_core::LockerConfig;
use locker_hardware::{MockPeripheralHandles, Peripherals, SensorConfig};
use locker_network::{BridgeClientConfig, spawn_bridge};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use cli::{CheckConfigArgs, Commands, LockerdCli, RunArgs};
use console::ConsoleCommand;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = LockerdCli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<LockerConfig> {
    match path {
        Some(path) => LockerConfig::load(path).with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(LockerConfig::default()),
    }
}

/// Run one locker until told to stop.
async fn run(args: RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format)?;

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    info!(
        version = locker_core::VERSION,
        bridge = %config.link.bridge_addr,
        tick_ms = config.timing.tick_ms,
        "Starting lockerd"
    );

    let (peripherals, hw) = Peripherals::mock(
        SensorConfig::new("door", config.sensors.door_threshold),
        SensorConfig::new("item", config.sensors.item_threshold),
    );

    let builder = Locker::builder(LockerConfig::clone(&config)).with_peripherals(peripherals);
    let builder = if args.no_bridge {
        warn!("Running without a bridge, borrows will be denied");
        let (transport, bridge) = MockTransport::new();
        bridge.set_reachable(false);
        builder.with_transport(transport)
    } else {
        let (transport, _task) = spawn_bridge(
            BridgeClientConfig::from_settings(&config.link, &config.timing),
            config.link.outbox_capacity,
        );
        builder.with_transport(transport)
    };
    let mut locker = builder.build().context("failed to assemble locker")?;

    drive(&mut locker, hw, &config).await?;

    info!(ticks = locker.ticks(), state = %locker.state(), "Lockerd stopped");
    Ok(())
}

/// The tick loop, interleaved with console input.
async fn drive(locker: &mut Locker, mut hw: MockPeripheralHandles, config: &LockerConfig) -> Result<()> {
    let mut interval = tokio::time::interval(config.timing.tick());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = locker.tick();
                log_report(&report);
                if hw.display.take_changed() {
                    info!(display = %hw.display.text(), "Display");
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read stdin")? else {
                    debug!("Stdin closed");
                    stdin_open = false;
                    continue;
                };
                match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Status)) => log_status(locker, &hw),
                    Ok(Some(command)) => {
                        if let Err(e) = command.apply(&hw) {
                            warn!("{:#}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    Ok(())
}

fn log_report(report: &TickReport) {
    if report.is_quiet() {
        return;
    }
    for record in &report.records {
        info!(record = %record.to_line(), "Transaction logged");
    }
    debug!(?report, "Tick");
}

fn log_status(locker: &Locker, hw: &MockPeripheralHandles) {
    let view = locker.view();
    info!(
        state = %view.state,
        security = %locker.security(),
        link = %locker.link_state(),
        link_available = view.link_available,
        queued = locker.link().queued(),
        alert = view.alert,
        unlocked = view.unlocked,
        display = %hw.display.text(),
        "Status"
    );
}

/// Validate a configuration file and print the effective values.
fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = load_config(Some(&args.config))?;
    let yaml = config.to_yaml().context("failed to render configuration")?;
    print!("{yaml}");
    Ok(())
}
