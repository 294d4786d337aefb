//! Mock ADC channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crate::{HardwareError, Result, traits::AnalogInput, types::DeviceInfo};

#[derive(Debug)]
struct Shared {
    raw: AtomicU16,
    failing: AtomicBool,
}

/// Mock analog input whose value is set through a [`MockAnalogHandle`].
#[derive(Debug)]
pub struct MockAnalogInput {
    shared: Arc<Shared>,
    name: String,
}

impl MockAnalogInput {
    /// Create a channel reading `initial` until changed.
    pub fn new(name: impl Into<String>, initial: u16) -> (Self, MockAnalogHandle) {
        let shared = Arc::new(Shared {
            raw: AtomicU16::new(initial),
            failing: AtomicBool::new(false),
        });

        let input = Self {
            shared: Arc::clone(&shared),
            name: name.into(),
        };

        (input, MockAnalogHandle { shared })
    }
}

impl AnalogInput for MockAnalogInput {
    fn read_raw(&mut self) -> Result<u16> {
        if self.shared.failing.load(Ordering::Relaxed) {
            return Err(HardwareError::communication(format!("{}: ADC read failed", self.name)));
        }
        Ok(self.shared.raw.load(Ordering::Relaxed))
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock Analog").with_firmware_version("1.0.0")
    }
}

/// Handle for setting a mock channel's value. Cloneable.
#[derive(Debug, Clone)]
pub struct MockAnalogHandle {
    shared: Arc<Shared>,
}

impl MockAnalogHandle {
    /// Set the raw value returned by subsequent reads.
    pub fn set(&self, raw: u16) {
        self.shared.raw.store(raw, Ordering::Relaxed);
    }

    pub fn get(&self) -> u16 {
        self.shared.raw.load(Ordering::Relaxed)
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Relaxed);
    }
}
