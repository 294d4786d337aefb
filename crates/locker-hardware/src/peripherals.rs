//! The locker's peripheral set.
//!
//! A locker has exactly one of each device, so instead of a registry the
//! peripherals travel as one bundle of trait objects. The controller
//! crate takes the bundle apart and hands each device to the single
//! component that owns it.
//!
//! # Examples
//!
//! ```
//! use locker_hardware::{Key, Peripherals, SensorConfig};
//!
//! let (peripherals, handles) = Peripherals::mock(
//!     SensorConfig::new("door", 1300),
//!     SensorConfig::new("item", 2800),
//! );
//!
//! handles.keypad.press(Key::Hash).unwrap();
//! handles.set_door_closed(true);
//! handles.set_item_present(true);
//! assert_eq!(peripherals.describe().len(), 7);
//! ```

use crate::mock::{
    MockActuator, MockActuatorHandle, MockAnalogHandle, MockAnalogInput, MockDisplay,
    MockDisplayHandle, MockKeypad, MockKeypadHandle,
};
use crate::sensor::{SensorConfig, ThresholdSensor};
use crate::traits::{Actuator, AnalogInput, Keypad, TextDisplay};
use crate::types::DeviceInfo;

/// Boxed presence channel.
pub type PresenceSensor = ThresholdSensor<Box<dyn AnalogInput>>;

/// Raw value a mock channel reports for "clearly active".
const MOCK_ACTIVE_RAW: u16 = 3500;

/// Raw value a mock channel reports for "clearly inactive".
const MOCK_INACTIVE_RAW: u16 = 600;

/// Every device a locker drives.
pub struct Peripherals {
    /// Reads `true` while the door is closed.
    pub door_sensor: PresenceSensor,

    /// Reads `true` while the item is in the compartment.
    pub item_sensor: PresenceSensor,

    /// Engaged (`true`) means locked.
    pub lock: Box<dyn Actuator>,

    /// Green LED.
    pub indicator: Box<dyn Actuator>,

    pub buzzer: Box<dyn Actuator>,
    pub keypad: Box<dyn Keypad>,
    pub display: Box<dyn TextDisplay>,
}

impl Peripherals {
    /// Build a fully mocked peripheral set.
    ///
    /// The door starts closed with the item present and the lock engaged.
    pub fn mock(door: SensorConfig, item: SensorConfig) -> (Self, MockPeripheralHandles) {
        let (door_input, door_raw) = MockAnalogInput::new(format!("{}-ir", door.name), MOCK_ACTIVE_RAW);
        let (item_input, item_raw) = MockAnalogInput::new(format!("{}-ir", item.name), MOCK_ACTIVE_RAW);
        let (lock, lock_handle) = MockActuator::new("lock", true);
        let (indicator, indicator_handle) = MockActuator::new("indicator", false);
        let (buzzer, buzzer_handle) = MockActuator::new("buzzer", false);
        let (keypad, keypad_handle) = MockKeypad::new();
        let (display, display_handle) = MockDisplay::new("lcd");

        let peripherals = Self {
            door_sensor: ThresholdSensor::new(Box::new(door_input), door),
            item_sensor: ThresholdSensor::new(Box::new(item_input), item),
            lock: Box::new(lock),
            indicator: Box::new(indicator),
            buzzer: Box::new(buzzer),
            keypad: Box::new(keypad),
            display: Box::new(display),
        };

        let handles = MockPeripheralHandles {
            door_raw,
            item_raw,
            lock: lock_handle,
            indicator: indicator_handle,
            buzzer: buzzer_handle,
            keypad: keypad_handle,
            display: display_handle,
        };

        (peripherals, handles)
    }

    /// Device descriptions for startup logging.
    pub fn describe(&self) -> Vec<DeviceInfo> {
        vec![
            self.door_sensor.info(),
            self.item_sensor.info(),
            self.lock.info(),
            self.indicator.info(),
            self.buzzer.info(),
            self.keypad.info(),
            self.display.info(),
        ]
    }
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

/// Control handles for a mocked [`Peripherals`] set.
#[derive(Debug, Clone)]
pub struct MockPeripheralHandles {
    pub door_raw: MockAnalogHandle,
    pub item_raw: MockAnalogHandle,
    pub lock: MockActuatorHandle,
    pub indicator: MockActuatorHandle,
    pub buzzer: MockActuatorHandle,
    pub keypad: MockKeypadHandle,
    pub display: MockDisplayHandle,
}

impl MockPeripheralHandles {
    pub fn set_door_closed(&self, closed: bool) {
        self.door_raw.set(if closed { MOCK_ACTIVE_RAW } else { MOCK_INACTIVE_RAW });
    }

    pub fn set_item_present(&self, present: bool) {
        self.item_raw.set(if present { MOCK_ACTIVE_RAW } else { MOCK_INACTIVE_RAW });
    }

    /// Set both raw channels directly.
    pub fn set_raw(&self, door: u16, item: u16) {
        self.door_raw.set(door);
        self.item_raw.set(item);
    }

    /// `true` while the lock is engaged.
    pub fn is_locked(&self) -> bool {
        self.lock.is_active()
    }
}
