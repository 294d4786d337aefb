use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Invalid subject identifier: {0}")]
    InvalidSubjectId(String),

    // Protocol errors
    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Unknown log kind: {0}")]
    UnknownLogKind(String),

    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Display errors
    #[error("Invalid display line {line} (max {max})")]
    InvalidLine { line: usize, max: usize },

    #[error("Duration must be greater than zero")]
    InvalidDuration,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
