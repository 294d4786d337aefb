//! Process-wide locker configuration.
//!
//! Configuration is read once at startup, validated, and then only ever
//! shared immutably. Every field has a factory default from
//! [`constants`](crate::constants), so a YAML file only needs to name the
//! values a deployment changes:
//!
//! ```
//! use locker_core::LockerConfig;
//! use std::time::Duration;
//!
//! let config = LockerConfig::from_yaml_str(
//!     "timing:\n  door_open_timeout_ms: 45000\nidentifier:\n  min_len: 6\n",
//! ).unwrap();
//!
//! assert_eq!(config.timing.door_open_timeout(), Duration::from_secs(45));
//! assert_eq!(config.timing.auth_timeout(), Duration::from_secs(10));
//! assert_eq!(config.identifier.min_len, 6);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::{Error, Result};

/// Named durations governing sensor acceptance and per-state dwell limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Maximum time the door stays unlocked for a borrow or return.
    pub door_open_timeout_ms: u64,

    /// Maximum idle time between keys while entering an identifier.
    pub input_timeout_ms: u64,

    /// Maximum wait for the remote authority.
    pub auth_timeout_ms: u64,

    /// How long transient messages are shown.
    pub message_duration_ms: u64,

    /// Sensor debounce hold time and sampling period.
    pub debounce_ms: u64,

    /// Window for a link connect attempt.
    pub connect_window_ms: u64,

    /// Delay between background reconnect attempts.
    pub reconnect_interval_ms: u64,

    /// Status display refresh cadence.
    pub status_refresh_ms: u64,

    /// Scheduler tick period.
    pub tick_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            door_open_timeout_ms: DEFAULT_DOOR_OPEN_TIMEOUT_MS,
            input_timeout_ms: DEFAULT_INPUT_TIMEOUT_MS,
            auth_timeout_ms: DEFAULT_AUTH_TIMEOUT_MS,
            message_duration_ms: DEFAULT_MESSAGE_DURATION_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            connect_window_ms: DEFAULT_CONNECT_WINDOW_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            status_refresh_ms: DEFAULT_STATUS_REFRESH_MS,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl TimingConfig {
    pub fn door_open_timeout(&self) -> Duration {
        Duration::from_millis(self.door_open_timeout_ms)
    }

    pub fn input_timeout(&self) -> Duration {
        Duration::from_millis(self.input_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn message_duration(&self) -> Duration {
        Duration::from_millis(self.message_duration_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn connect_window(&self) -> Duration {
        Duration::from_millis(self.connect_window_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_millis(self.status_refresh_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    fn validate(&self) -> Result<()> {
        let named = [
            ("door_open_timeout_ms", self.door_open_timeout_ms),
            ("input_timeout_ms", self.input_timeout_ms),
            ("auth_timeout_ms", self.auth_timeout_ms),
            ("message_duration_ms", self.message_duration_ms),
            ("debounce_ms", self.debounce_ms),
            ("connect_window_ms", self.connect_window_ms),
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("status_refresh_ms", self.status_refresh_ms),
            ("tick_ms", self.tick_ms),
        ];

        if let Some((name, _)) = named.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("timing.{name} must be greater than zero")));
        }

        if self.connect_window_ms > self.auth_timeout_ms {
            return Err(Error::Config(
                "timing.connect_window_ms must not exceed timing.auth_timeout_ms".to_string(),
            ));
        }

        Ok(())
    }
}

/// Accepted identifier length bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierPolicy {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_ID_LENGTH,
            max_len: DEFAULT_MAX_ID_LENGTH,
        }
    }
}

impl IdentifierPolicy {
    /// Returns `true` if an identifier of `len` digits may be submitted.
    pub fn accepts_len(&self, len: usize) -> bool {
        (self.min_len..=self.max_len).contains(&len)
    }

    fn validate(&self) -> Result<()> {
        if self.min_len == 0 || self.min_len > self.max_len || self.max_len > MAX_SUBJECT_ID_LENGTH {
            return Err(Error::Config(format!(
                "identifier bounds must satisfy 1 <= min_len <= max_len <= {MAX_SUBJECT_ID_LENGTH}, got {}..={}",
                self.min_len, self.max_len
            )));
        }
        Ok(())
    }
}

/// Thresholds for the two IR presence channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Raw value at or above which the door counts as closed.
    pub door_threshold: u16,

    /// Raw value at or above which the item counts as present.
    pub item_threshold: u16,

    /// Both channels below this value is an implausible sample.
    pub implausible_below: u16,

    /// Consecutive implausible samples before a sensor fault latches.
    pub fault_count: u32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            door_threshold: DEFAULT_DOOR_THRESHOLD,
            item_threshold: DEFAULT_ITEM_THRESHOLD,
            implausible_below: DEFAULT_IMPLAUSIBLE_BELOW,
            fault_count: DEFAULT_SENSOR_FAULT_COUNT,
        }
    }
}

impl SensorSettings {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("door_threshold", self.door_threshold), ("item_threshold", self.item_threshold)] {
            if value > ADC_MAX {
                return Err(Error::Config(format!("sensors.{name} exceeds ADC range ({value} > {ADC_MAX})")));
            }
            if value <= self.implausible_below {
                return Err(Error::Config(format!(
                    "sensors.{name} must be above sensors.implausible_below"
                )));
            }
        }
        if self.fault_count == 0 {
            return Err(Error::Config("sensors.fault_count must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Host bridge link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// `host:port` of the bridge.
    pub bridge_addr: String,

    /// Bounded capacity of the controller outbox.
    pub outbox_capacity: usize,

    /// Bounded capacity of the offline queue.
    pub queue_capacity: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            bridge_addr: DEFAULT_BRIDGE_ADDR.to_string(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Status display geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub columns: usize,
    pub lines: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            columns: DEFAULT_DISPLAY_COLUMNS,
            lines: DEFAULT_DISPLAY_LINES,
        }
    }
}

/// Complete locker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub timing: TimingConfig,
    pub identifier: IdentifierPolicy,
    pub sensors: SensorSettings,
    pub link: LinkSettings,
    pub display: DisplaySettings,
}

impl LockerConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed YAML and `Error::Config`
    /// when a value is out of range.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: LockerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`LockerConfig::from_yaml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check every section for out-of-range values.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.identifier.validate()?;
        self.sensors.validate()?;

        if self.link.bridge_addr.trim().is_empty() {
            return Err(Error::Config("link.bridge_addr must not be empty".to_string()));
        }
        if self.link.outbox_capacity == 0 || self.link.queue_capacity == 0 {
            return Err(Error::Config("link capacities must be greater than zero".to_string()));
        }
        if self.display.columns == 0 || self.display.lines == 0 {
            return Err(Error::Config("display geometry must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = LockerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timing.door_open_timeout(), Duration::from_secs(30));
        assert_eq!(config.timing.input_timeout(), Duration::from_secs(15));
        assert_eq!(config.timing.auth_timeout(), Duration::from_secs(10));
        assert_eq!(config.timing.message_duration(), Duration::from_secs(3));
        assert_eq!(config.timing.debounce(), Duration::from_millis(200));
        assert_eq!(config.identifier, IdentifierPolicy { min_len: 8, max_len: 9 });
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LockerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, LockerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let yaml = "timing:\n  input_timeout_ms: 5000\nsensors:\n  fault_count: 3\nlink:\n  bridge_addr: \"10.0.0.2:9000\"\n";
        let config = LockerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.timing.input_timeout(), Duration::from_secs(5));
        assert_eq!(config.timing.door_open_timeout_ms, DEFAULT_DOOR_OPEN_TIMEOUT_MS);
        assert_eq!(config.sensors.fault_count, 3);
        assert_eq!(config.link.bridge_addr, "10.0.0.2:9000");
    }

    #[rstest]
    #[case("timing:\n  debounce_ms: 0\n")]
    #[case("identifier:\n  min_len: 10\n  max_len: 9\n")]
    #[case("identifier:\n  min_len: 0\n")]
    #[case("sensors:\n  door_threshold: 5000\n")]
    #[case("sensors:\n  item_threshold: 40\n")]
    #[case("timing:\n  connect_window_ms: 20000\n")]
    #[case("display:\n  columns: 0\n")]
    fn test_invalid_values_rejected(#[case] yaml: &str) {
        let result = LockerConfig::from_yaml_str(yaml);
        assert!(matches!(result, Err(Error::Config(_))), "{yaml} -> {result:?}");
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let result = LockerConfig::from_yaml_str("timing: [1, 2");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_yaml_roundtrip_of_effective_config() {
        let config = LockerConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(LockerConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_policy_accepts_len() {
        let policy = IdentifierPolicy { min_len: 8, max_len: 9 };
        assert!(!policy.accepts_len(7));
        assert!(policy.accepts_len(8));
        assert!(policy.accepts_len(9));
        assert!(!policy.accepts_len(10));
    }
}
