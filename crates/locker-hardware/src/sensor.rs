//! Threshold-compared analog presence sensors.
//!
//! The locker's door and item detectors are the same IR reflectance part
//! on two ADC channels; only the wiring and threshold differ. One
//! [`ThresholdSensor`] type covers both, parameterized by [`SensorConfig`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::traits::{AnalogInput, BinarySensor};
use crate::types::DeviceInfo;

/// Wiring and threshold for one presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,

    /// Raw value at or above which the channel reads `true`.
    pub threshold: u16,
}

impl SensorConfig {
    pub fn new(name: impl Into<String>, threshold: u16) -> Self {
        Self {
            name: name.into(),
            threshold,
        }
    }
}

/// One sample: the raw value and its thresholded meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub raw: u16,
    pub active: bool,
}

/// A binary sensor derived from an analog channel.
///
/// # Examples
///
/// ```
/// use locker_hardware::mock::MockAnalogInput;
/// use locker_hardware::{BinarySensor, SensorConfig, ThresholdSensor};
///
/// let (input, handle) = MockAnalogInput::new("door-ir", 3000);
/// let mut door_closed = ThresholdSensor::new(input, SensorConfig::new("door", 1300));
///
/// assert!(door_closed.read().unwrap());
/// handle.set(900);
/// assert!(!door_closed.read().unwrap());
/// ```
#[derive(Debug)]
pub struct ThresholdSensor<A> {
    input: A,
    config: SensorConfig,
}

impl<A: AnalogInput> ThresholdSensor<A> {
    pub fn new(input: A, config: SensorConfig) -> Self {
        Self { input, config }
    }

    /// Sample the channel and apply the threshold.
    pub fn sample(&mut self) -> Result<Reading> {
        let raw = self.input.read_raw()?;
        Ok(Reading {
            raw,
            active: raw >= self.config.threshold,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn info(&self) -> DeviceInfo {
        self.input.info()
    }
}

impl<A: AnalogInput> BinarySensor for ThresholdSensor<A> {
    fn read(&mut self) -> Result<bool> {
        self.sample().map(|reading| reading.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAnalogInput;
    use rstest::rstest;

    #[rstest]
    #[case(1299, false)]
    #[case(1300, true)]
    #[case(4095, true)]
    #[case(0, false)]
    fn test_threshold_boundary(#[case] raw: u16, #[case] expected: bool) {
        let (input, _handle) = MockAnalogInput::new("door-ir", raw);
        let mut sensor = ThresholdSensor::new(input, SensorConfig::new("door", 1300));

        let reading = sensor.sample().unwrap();
        assert_eq!(reading.raw, raw);
        assert_eq!(reading.active, expected);
    }

    #[test]
    fn test_read_failure_propagates() {
        let (input, handle) = MockAnalogInput::new("item-ir", 3000);
        let mut sensor = ThresholdSensor::new(input, SensorConfig::new("item", 2800));

        handle.set_failing(true);
        assert!(sensor.read().is_err());

        handle.set_failing(false);
        assert!(sensor.read().unwrap());
    }

    #[test]
    fn test_boxed_input() {
        let (input, _handle) = MockAnalogInput::new("door-ir", 2000);
        let boxed: Box<dyn AnalogInput> = Box::new(input);
        let mut sensor = ThresholdSensor::new(boxed, SensorConfig::new("door", 1300));

        assert!(sensor.read().unwrap());
        assert_eq!(sensor.info().name, "door-ir");
        assert_eq!(sensor.config().threshold, 1300);
    }
}
