//! Core constants for the smart locker.
//!
//! Wire-protocol literals, keypad alphabet and the factory defaults for every
//! tunable value in [`LockerConfig`](crate::LockerConfig). Components read
//! the configuration, not these constants, so a deployment can override any
//! of them without a rebuild.
//!
//! # Wire Protocol
//!
//! The locker talks to the host bridge over a line-oriented link:
//!
//! ```text
//! locker -> bridge: BORROW,<subjectId>
//! locker -> bridge: RETURN,<subjectId>
//! locker -> bridge: <KIND>,<subjectId>,<timestamp>
//! bridge -> locker: OK | DENIED
//! ```
//!
//! # Usage
//!
//! ```
//! use locker_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(FIELD_SEPARATOR, ',');
//! let timeout = Duration::from_millis(DEFAULT_AUTH_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs(), 10);
//! ```

// ============================================================================
// Wire Protocol
// ============================================================================

/// Separator between fields of a directive or log record.
pub const FIELD_SEPARATOR: char = ',';

/// Line terminator for every directive and reply.
pub const LINE_TERMINATOR: char = '\n';

/// Verb for an authorization request.
pub const VERB_BORROW: &str = "BORROW";

/// Verb for a completed-return notification.
pub const VERB_RETURN: &str = "RETURN";

/// Reply synonyms that mean the request was approved.
pub const APPROVAL_SYNONYMS: [&str; 3] = ["OK", "GRANTED", "SUCCESS"];

/// Reply synonyms that mean the request was rejected.
pub const REJECTION_SYNONYMS: [&str; 4] = ["DENIED", "NO", "FAIL", "ERROR"];

/// Maximum accepted reply line length in bytes.
///
/// Replies are single words; anything longer is garbage on the link and is
/// rejected by the codec instead of growing the receive buffer.
pub const MAX_LINE_LENGTH: usize = 256;

// ============================================================================
// Subject Identifiers
// ============================================================================

/// Absolute cap on identifier length, independent of deployment policy.
pub const MAX_SUBJECT_ID_LENGTH: usize = 20;

/// Default minimum identifier length (student ID).
pub const DEFAULT_MIN_ID_LENGTH: usize = 8;

/// Default maximum identifier length (student ID).
pub const DEFAULT_MAX_ID_LENGTH: usize = 9;

// ============================================================================
// Timing Defaults (milliseconds)
// ============================================================================

/// How long the door may stay unlocked waiting for a borrow or return.
pub const DEFAULT_DOOR_OPEN_TIMEOUT_MS: u64 = 30_000;

/// Idle time allowed between keys while entering an identifier.
pub const DEFAULT_INPUT_TIMEOUT_MS: u64 = 15_000;

/// How long to wait for the remote authority to answer.
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 10_000;

/// How long a transient message stays on the display.
pub const DEFAULT_MESSAGE_DURATION_MS: u64 = 3_000;

/// Sensor debounce hold time, also the sampling period.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Window in which a link connect attempt must succeed.
pub const DEFAULT_CONNECT_WINDOW_MS: u64 = 2_000;

/// Delay between background reconnect attempts while offline.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;

/// Status display refresh cadence.
pub const DEFAULT_STATUS_REFRESH_MS: u64 = 250;

/// Scheduler tick period.
pub const DEFAULT_TICK_MS: u64 = 20;

// ============================================================================
// Sensor Defaults
// ============================================================================

/// Raw IR reading at or above which the door counts as closed.
pub const DEFAULT_DOOR_THRESHOLD: u16 = 1300;

/// Raw IR reading at or above which the item counts as present.
pub const DEFAULT_ITEM_THRESHOLD: u16 = 2800;

/// Raw readings below this on both channels are physically implausible.
pub const DEFAULT_IMPLAUSIBLE_BELOW: u16 = 50;

/// Consecutive implausible samples that latch a sensor fault.
pub const DEFAULT_SENSOR_FAULT_COUNT: u32 = 10;

/// Full scale of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

// ============================================================================
// Link Defaults
// ============================================================================

/// Default host bridge address.
pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:7878";

/// Capacity of the controller -> link outbox channel.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Capacity of the offline directive queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

// ============================================================================
// Display Defaults
// ============================================================================

/// Character columns of the status LCD.
pub const DEFAULT_DISPLAY_COLUMNS: usize = 16;

/// Lines of the status LCD.
pub const DEFAULT_DISPLAY_LINES: usize = 2;
