//! Mock two-state output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{HardwareError, Result, traits::Actuator, types::DeviceInfo};

#[derive(Debug)]
struct Shared {
    active: AtomicBool,
    commands: AtomicUsize,
    failing: AtomicBool,
}

/// Mock actuator that records every command.
#[derive(Debug)]
pub struct MockActuator {
    shared: Arc<Shared>,
    name: String,
}

impl MockActuator {
    pub fn new(name: impl Into<String>, initial: bool) -> (Self, MockActuatorHandle) {
        let shared = Arc::new(Shared {
            active: AtomicBool::new(initial),
            commands: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        });

        let actuator = Self {
            shared: Arc::clone(&shared),
            name: name.into(),
        };

        (actuator, MockActuatorHandle { shared })
    }
}

impl Actuator for MockActuator {
    fn set(&mut self, active: bool) -> Result<()> {
        if self.shared.failing.load(Ordering::Relaxed) {
            return Err(HardwareError::actuator_failed(self.name.clone(), "no response"));
        }
        self.shared.active.store(active, Ordering::Relaxed);
        self.shared.commands.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock Actuator").with_firmware_version("1.0.0")
    }
}

/// Handle for observing a mock actuator. Cloneable.
#[derive(Debug, Clone)]
pub struct MockActuatorHandle {
    shared: Arc<Shared>,
}

impl MockActuatorHandle {
    /// Current output state.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Number of successful `set` calls so far.
    pub fn command_count(&self) -> usize {
        self.shared.commands.load(Ordering::Relaxed)
    }

    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_recorded() {
        let (mut lock, handle) = MockActuator::new("lock", true);
        assert!(handle.is_active());

        lock.set(false).unwrap();
        lock.set(true).unwrap();

        assert!(lock.is_active());
        assert_eq!(handle.command_count(), 2);
    }

    #[test]
    fn test_failing_actuator_keeps_state() {
        let (mut buzzer, handle) = MockActuator::new("buzzer", false);
        handle.set_failing(true);

        assert!(buzzer.set(true).is_err());
        assert!(!handle.is_active());
        assert_eq!(handle.command_count(), 0);
    }
}
