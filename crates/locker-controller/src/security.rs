//! Physical security monitor.
//!
//! The monitor is the only writer of [`SecurityState`]. It samples the door
//! and item channels at most once per debounce interval, accepts a changed
//! channel only after the change has persisted for the full interval, and
//! combines the two accepted values through a fixed truth table:
//!
//! | door   | item    | state          |
//! |--------|---------|----------------|
//! | closed | present | `ClosedPresent`|
//! | closed | absent  | `ClosedAbsent` |
//! | open   | present | `OpenPresent`  |
//! | open   | absent  | `OpenAbsent`   |
//!
//! Samples where both raw channels sit below the implausibility floor are
//! not physically possible with the IR parts fitted; a run of them latches
//! `SensorError`.

use std::fmt;
use std::time::Duration;

use locker_core::{SensorSettings, Timestamp};
use locker_hardware::{PresenceSensor, Reading};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Derived physical state of the compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityState {
    ClosedPresent,
    ClosedAbsent,
    OpenPresent,
    OpenAbsent,
    SensorError,
}

impl SecurityState {
    /// Truth table from the two accepted channel values.
    pub fn from_flags(door_closed: bool, item_present: bool) -> Self {
        match (door_closed, item_present) {
            (true, true) => SecurityState::ClosedPresent,
            (true, false) => SecurityState::ClosedAbsent,
            (false, true) => SecurityState::OpenPresent,
            (false, false) => SecurityState::OpenAbsent,
        }
    }

    /// `None` while faulted.
    pub fn door_closed(&self) -> Option<bool> {
        match self {
            SecurityState::ClosedPresent | SecurityState::ClosedAbsent => Some(true),
            SecurityState::OpenPresent | SecurityState::OpenAbsent => Some(false),
            SecurityState::SensorError => None,
        }
    }

    /// `None` while faulted.
    pub fn item_present(&self) -> Option<bool> {
        match self {
            SecurityState::ClosedPresent | SecurityState::OpenPresent => Some(true),
            SecurityState::ClosedAbsent | SecurityState::OpenAbsent => Some(false),
            SecurityState::SensorError => None,
        }
    }

    pub fn is_door_open(&self) -> bool {
        self.door_closed() == Some(false)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, SecurityState::SensorError)
    }
}

impl fmt::Display for SecurityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityState::ClosedPresent => "ClosedPresent",
            SecurityState::ClosedAbsent => "ClosedAbsent",
            SecurityState::OpenPresent => "OpenPresent",
            SecurityState::OpenAbsent => "OpenAbsent",
            SecurityState::SensorError => "SensorError",
        };
        f.write_str(s)
    }
}

/// A change of the composite state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityChange {
    pub from: SecurityState,
    pub to: SecurityState,
    pub at: Timestamp,
}

/// Most recent raw channel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub door: u16,
    pub item: u16,
}

/// Current state plus the raw values it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecuritySnapshot {
    pub state: SecurityState,
    pub raw: RawSample,
}

/// Hold-time filter for one channel.
#[derive(Debug, Clone, Copy)]
struct Debounced {
    accepted: bool,
    candidate: Option<(bool, Timestamp)>,
}

impl Debounced {
    fn new(value: bool) -> Self {
        Self {
            accepted: value,
            candidate: None,
        }
    }

    /// Feed one reading; returns `true` when the accepted value flipped.
    fn feed(&mut self, value: bool, now: Timestamp, hold: Duration) -> bool {
        if value == self.accepted {
            self.candidate = None;
            return false;
        }

        match self.candidate {
            Some((pending, since)) if pending == value => {
                if now.has_elapsed(since, hold) {
                    self.accepted = value;
                    self.candidate = None;
                    true
                } else {
                    false
                }
            }
            _ => {
                self.candidate = Some((value, now));
                false
            }
        }
    }
}

/// Debounced, fault-aware view of the door and item sensors.
pub struct SecurityMonitor {
    door: PresenceSensor,
    item: PresenceSensor,
    door_closed: Debounced,
    item_present: Debounced,
    state: SecurityState,
    raw: RawSample,
    implausible_below: u16,
    fault_count: u32,
    implausible_run: u32,
    debounce: Duration,
    last_sample: Timestamp,
}

impl SecurityMonitor {
    /// Create a monitor whose initial state comes straight from one read.
    pub fn new(
        door: PresenceSensor,
        item: PresenceSensor,
        settings: &SensorSettings,
        debounce: Duration,
        now: Timestamp,
    ) -> Self {
        let mut monitor = Self {
            door,
            item,
            door_closed: Debounced::new(true),
            item_present: Debounced::new(true),
            state: SecurityState::ClosedPresent,
            raw: RawSample::default(),
            implausible_below: settings.implausible_below,
            fault_count: settings.fault_count,
            implausible_run: 0,
            debounce,
            last_sample: now,
        };

        match monitor.read_channels() {
            Some((door, item)) => {
                if monitor.is_implausible(door, item) {
                    monitor.implausible_run = 1;
                }
                monitor.door_closed = Debounced::new(door.active);
                monitor.item_present = Debounced::new(item.active);
                monitor.state = SecurityState::from_flags(door.active, item.active);
            }
            None => monitor.implausible_run = 1,
        }

        info!(state = %monitor.state, door = monitor.raw.door, item = monitor.raw.item, "Security monitor initialized");
        monitor
    }

    /// Sample the sensors if a debounce interval has passed since the last
    /// sample. Returns a change only when the composite state differs from
    /// the previous one.
    pub fn sample(&mut self, now: Timestamp) -> Option<SecurityChange> {
        if !now.has_elapsed(self.last_sample, self.debounce) {
            return None;
        }
        self.last_sample = now;

        let previous = self.state;
        let next = match self.read_channels() {
            Some((door, item)) if !self.is_implausible(door, item) => self.accept(door, item, now),
            _ => self.count_implausible(),
        };

        if next == previous {
            return None;
        }

        self.state = next;
        let change = SecurityChange {
            from: previous,
            to: next,
            at: now,
        };
        debug!(from = %previous, to = %next, "Security state changed");
        Some(change)
    }

    pub fn state(&self) -> SecurityState {
        self.state
    }

    /// Raw values of the most recent successful read.
    pub fn last_raw(&self) -> RawSample {
        self.raw
    }

    pub fn snapshot(&self) -> SecuritySnapshot {
        SecuritySnapshot {
            state: self.state,
            raw: self.raw,
        }
    }

    /// Consecutive implausible samples seen so far.
    pub fn implausible_run(&self) -> u32 {
        self.implausible_run
    }

    fn read_channels(&mut self) -> Option<(Reading, Reading)> {
        let door = self.door.sample();
        let item = self.item.sample();

        match (door, item) {
            (Ok(door), Ok(item)) => {
                self.raw = RawSample {
                    door: door.raw,
                    item: item.raw,
                };
                Some((door, item))
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Sensor read failed");
                None
            }
        }
    }

    fn is_implausible(&self, door: Reading, item: Reading) -> bool {
        door.raw < self.implausible_below && item.raw < self.implausible_below
    }

    fn accept(&mut self, door: Reading, item: Reading, now: Timestamp) -> SecurityState {
        if self.state.is_fault() {
            info!(door = door.raw, item = item.raw, "Sensor readings plausible again");
            self.door_closed = Debounced::new(door.active);
            self.item_present = Debounced::new(item.active);
        } else {
            self.door_closed.feed(door.active, now, self.debounce);
            self.item_present.feed(item.active, now, self.debounce);
        }
        self.implausible_run = 0;

        SecurityState::from_flags(self.door_closed.accepted, self.item_present.accepted)
    }

    fn count_implausible(&mut self) -> SecurityState {
        self.implausible_run = self.implausible_run.saturating_add(1);

        if self.implausible_run >= self.fault_count {
            if !self.state.is_fault() {
                error!(
                    run = self.implausible_run,
                    door = self.raw.door,
                    item = self.raw.item,
                    "Implausible sensor readings, latching sensor fault"
                );
            }
            SecurityState::SensorError
        } else {
            debug!(run = self.implausible_run, "Implausible sensor sample");
            self.state
        }
    }
}

impl fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("state", &self.state)
            .field("raw", &self.raw)
            .field("implausible_run", &self.implausible_run)
            .finish()
    }
}
