//! Mock keypad implementation for testing and development.

use crate::{HardwareError, Result, traits::Keypad, types::{DeviceInfo, Key}};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Buffered key presses not yet polled by the controller.
const KEY_BUFFER: usize = 64;

/// Mock keypad fed through a channel.
///
/// # Examples
///
/// ```
/// use locker_hardware::mock::MockKeypad;
/// use locker_hardware::{Key, Keypad};
///
/// let (mut keypad, handle) = MockKeypad::new();
///
/// handle.type_keys("#12").unwrap();
///
/// assert_eq!(keypad.poll_key().unwrap(), Some(Key::Hash));
/// assert_eq!(keypad.poll_key().unwrap(), Some(Key::Digit(1)));
/// assert_eq!(keypad.poll_key().unwrap(), Some(Key::Digit(2)));
/// assert_eq!(keypad.poll_key().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    input_rx: mpsc::Receiver<Key>,
    name: String,
}

impl MockKeypad {
    /// Create a new mock keypad with the default name.
    pub fn new() -> (Self, MockKeypadHandle) {
        Self::with_name("keypad")
    }

    /// Create a new mock keypad with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockKeypadHandle) {
        let name = name.into();
        let (input_tx, input_rx) = mpsc::channel(KEY_BUFFER);

        let keypad = Self {
            input_rx,
            name: name.clone(),
        };
        let handle = MockKeypadHandle { input_tx, name };

        (keypad, handle)
    }
}

impl Keypad for MockKeypad {
    fn poll_key(&mut self) -> Result<Option<Key>> {
        match self.input_rx.try_recv() {
            Ok(key) => Ok(Some(key)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HardwareError::disconnected(self.name.clone())),
        }
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), "Mock 4x4 Keypad").with_firmware_version("1.0.0")
    }
}

/// Handle for pressing keys on a mock keypad. Cloneable.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    input_tx: mpsc::Sender<Key>,
    name: String,
}

impl MockKeypadHandle {
    /// Queue one key press.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad was dropped or its buffer is full.
    pub fn press(&self, key: Key) -> Result<()> {
        self.input_tx
            .try_send(key)
            .map_err(|e| HardwareError::communication(format!("{}: {e}", self.name)))
    }

    /// Queue one key press per character.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidKey` on the first character outside
    /// the keypad alphabet; earlier characters stay queued.
    pub fn type_keys(&self, keys: &str) -> Result<()> {
        for c in keys.chars().filter(|c| !c.is_whitespace()) {
            self.press(Key::from_char(c)?)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
