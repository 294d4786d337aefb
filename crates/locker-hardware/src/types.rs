//! Common types shared across peripheral implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HardwareError, Result};

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "door-ir", "lock-servo").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.firmware_version {
            Some(version) => write!(f, "{} ({} {})", self.name, self.model, version),
            None => write!(f, "{} ({})", self.name, self.model),
        }
    }
}

/// A key on the 4x4 matrix keypad.
///
/// Digits build identifiers, `#` starts and confirms, `*` erases, and the
/// letter column is reserved for maintenance commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Hash key (#).
    Hash,

    /// Star key (*).
    Star,

    /// Maintenance: manual unlock.
    A,

    /// Maintenance: manual lock.
    B,

    /// Maintenance: sensor readout.
    C,

    /// Enter or leave maintenance.
    D,
}

impl Key {
    /// Map a keypad character to a key.
    ///
    /// Letters are accepted in either case.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidKey` for characters outside the
    /// keypad alphabet.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker_hardware::Key;
    ///
    /// assert_eq!(Key::from_char('7').unwrap(), Key::Digit(7));
    /// assert_eq!(Key::from_char('d').unwrap(), Key::D);
    /// assert!(Key::from_char('E').is_err());
    /// ```
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            '0'..='9' => Ok(Key::Digit(c as u8 - b'0')),
            '#' => Ok(Key::Hash),
            '*' => Ok(Key::Star),
            'A' => Ok(Key::A),
            'B' => Ok(Key::B),
            'C' => Ok(Key::C),
            'D' => Ok(Key::D),
            _ => Err(HardwareError::InvalidKey(c)),
        }
    }

    /// Character printed on the key.
    pub fn as_char(&self) -> char {
        match self {
            Key::Digit(d) => char::from(b'0' + d),
            Key::Hash => '#',
            Key::Star => '*',
            Key::A => 'A',
            Key::B => 'B',
            Key::C => 'C',
            Key::D => 'D',
        }
    }

    /// The digit value, if this is a digit key.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Key::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

impl TryFrom<char> for Key {
    type Error = HardwareError;

    fn try_from(c: char) -> Result<Self> {
        Key::from_char(c)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case('0', Key::Digit(0))]
    #[case('9', Key::Digit(9))]
    #[case('#', Key::Hash)]
    #[case('*', Key::Star)]
    #[case('a', Key::A)]
    #[case('B', Key::B)]
    #[case('c', Key::C)]
    #[case('D', Key::D)]
    fn test_key_from_char(#[case] c: char, #[case] expected: Key) {
        let key = Key::from_char(c).unwrap();
        assert_eq!(key, expected);
        assert_eq!(key.as_char(), c.to_ascii_uppercase());
    }

    #[rstest]
    #[case('E')]
    #[case(' ')]
    #[case('+')]
    #[case('٣')]
    fn test_key_rejects_outside_alphabet(#[case] c: char) {
        assert!(matches!(Key::from_char(c), Err(HardwareError::InvalidKey(_))));
    }

    #[test]
    fn test_as_digit() {
        assert_eq!(Key::Digit(4).as_digit(), Some(4));
        assert_eq!(Key::Hash.as_digit(), None);
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo::new("door-ir", "Mock Analog").with_firmware_version("1.0.0");
        assert_eq!(info.to_string(), "door-ir (Mock Analog 1.0.0)");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"name\":\"door-ir\""));
    }
}
