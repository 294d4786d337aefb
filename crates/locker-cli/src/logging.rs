//! # Structured Logging
//!
//! Installs the `tracing` subscriber: pretty or JSON output, filtered by
//! `RUST_LOG` when set and by `--log-level` otherwise. Output goes to
//! stderr so stdout stays free for `check-config`.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines for a terminal.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Install the global subscriber. Call once, early in `main()`.
///
/// # Errors
///
/// Fails if the filter directive is malformed or a subscriber is already
/// installed.
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid log level: {default_level}"))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    tracing::debug!("Logging initialized (format={:?})", format);
    Ok(())
}
