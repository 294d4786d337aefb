//! Peripheral capability traits.
//!
//! Each physical device is one small capability (read a value, set an
//! output, poll a key, show text) plus the configuration that wires it.
//! All calls are synchronous and must return promptly: the controller
//! polls them from its tick and never waits on a device.
//!
//! The traits are object-safe, so a locker is assembled from
//! `Box<dyn Trait>` values regardless of which driver sits behind them.

use crate::error::Result;
use crate::types::{DeviceInfo, Key};

/// A raw analog channel (ADC).
pub trait AnalogInput: Send {
    /// Sample the channel once.
    fn read_raw(&mut self) -> Result<u16>;

    fn info(&self) -> DeviceInfo;
}

/// A two-valued input.
pub trait BinarySensor: Send {
    fn read(&mut self) -> Result<bool>;
}

/// A two-valued output: lock servo, indicator LED, buzzer.
pub trait Actuator: Send {
    /// Drive the output. `true` means engaged/on.
    fn set(&mut self, active: bool) -> Result<()>;

    /// Last commanded value.
    fn is_active(&self) -> bool;

    fn info(&self) -> DeviceInfo;
}

/// A scanned keypad.
pub trait Keypad: Send {
    /// Return the next pending key press, if any.
    fn poll_key(&mut self) -> Result<Option<Key>>;

    fn info(&self) -> DeviceInfo;
}

/// A character display.
pub trait TextDisplay: Send {
    /// Replace the visible contents. Lines arrive already fitted to the
    /// display geometry.
    fn show(&mut self, lines: &[String]) -> Result<()>;

    fn info(&self) -> DeviceInfo;
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read_raw(&mut self) -> Result<u16> {
        (**self).read_raw()
    }

    fn info(&self) -> DeviceInfo {
        (**self).info()
    }
}
