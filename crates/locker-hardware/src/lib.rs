//! Peripheral abstraction layer for the smart locker.
//!
//! The controller never talks to a driver directly. It sees a handful of
//! small capability traits:
//!
//! - [`AnalogInput`]: a raw ADC channel, wrapped by [`ThresholdSensor`] into a
//!   [`BinarySensor`] for the door and item IR detectors.
//! - [`Actuator`]: the lock servo, the indicator LED and the buzzer.
//! - [`Keypad`]: the 4x4 matrix keypad, producing [`Key`]s.
//! - [`TextDisplay`]: the 16x2 LCD.
//!
//! All calls are synchronous and non-blocking so they can be polled from
//! the controller's tick. [`Peripherals`] bundles one of each;
//! [`Peripherals::mock`] builds a mocked set together with the handles that
//! drive it.
//!
//! ```
//! use locker_hardware::mock::MockActuator;
//! use locker_hardware::Actuator;
//!
//! let (mut lock, handle) = MockActuator::new("lock", true);
//! lock.set(false).unwrap();
//! assert!(!handle.is_active());
//! ```

pub mod error;
pub mod mock;
pub mod peripherals;
pub mod sensor;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use peripherals::{MockPeripheralHandles, Peripherals, PresenceSensor};
pub use sensor::{Reading, SensorConfig, ThresholdSensor};
pub use traits::{Actuator, AnalogInput, BinarySensor, Keypad, TextDisplay};
pub use types::{DeviceInfo, Key};
