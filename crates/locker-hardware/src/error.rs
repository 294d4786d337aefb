//! Error types for peripheral operations.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to a peripheral.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Character outside the keypad alphabet.
    #[error("Invalid key: {0:?}")]
    InvalidKey(char),

    /// Actuator refused or failed to reach the commanded position.
    #[error("Actuator {device} failed: {message}")]
    ActuatorFailed { device: String, message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new actuator failure.
    pub fn actuator_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActuatorFailed {
            device: device.into(),
            message: message.into(),
        }
    }
}
