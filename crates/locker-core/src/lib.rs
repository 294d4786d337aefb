//! Shared building blocks for the smart locker controller.
//!
//! Holds the error type, the small value types every component passes
//! around ([`SubjectId`], [`Timestamp`]), protocol and timing defaults, and
//! the process-wide [`LockerConfig`].

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{DisplaySettings, IdentifierPolicy, LinkSettings, LockerConfig, SensorSettings, TimingConfig};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
