//! Shared harness for locker integration tests.
//!
//! A [`Harness`] is a fully assembled [`Locker`] on mock peripherals, a mock
//! bridge and a manual clock. Every helper advances time in whole scheduler
//! ticks and keeps the reports, so a test can drive the physical world and
//! then assert on everything the locker logged.

#![allow(dead_code)]

use std::time::Duration;

use locker_controller::{Locker, ManualClock, MockBridgeHandle, MockTransport, TickReport, TransactionState};
use locker_core::LockerConfig;
use locker_hardware::{MockPeripheralHandles, Peripherals, SensorConfig};
use locker_protocol::{LogKind, TransactionLogRecord};

/// Long enough for a sensor change to be sampled and accepted.
pub const SETTLE: Duration = Duration::from_millis(600);

/// Test identifier within the default 8-9 digit policy.
pub const SUBJECT: &str = "12345678";

pub struct Harness {
    pub locker: Locker,
    pub clock: ManualClock,
    pub hw: MockPeripheralHandles,
    pub bridge: MockBridgeHandle,
    pub config: LockerConfig,
    pub reports: Vec<TickReport>,
}

/// Initial physical world and bridge for a [`Harness`].
#[derive(Debug, Clone)]
pub struct Setup {
    pub config: LockerConfig,
    pub item_present: bool,
    pub bridge_reachable: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            config: LockerConfig::default(),
            item_present: true,
            bridge_reachable: true,
        }
    }
}

impl Setup {
    pub fn item_absent(mut self) -> Self {
        self.item_present = false;
        self
    }

    pub fn offline(mut self) -> Self {
        self.bridge_reachable = false;
        self
    }

    pub fn build(self) -> Harness {
        let config = self.config;
        let (peripherals, hw) = Peripherals::mock(
            SensorConfig::new("door", config.sensors.door_threshold),
            SensorConfig::new("item", config.sensors.item_threshold),
        );
        hw.set_item_present(self.item_present);

        let (transport, bridge) = MockTransport::new();
        bridge.set_reachable(self.bridge_reachable);

        let clock = ManualClock::new();
        let locker = Locker::builder(config.clone())
            .with_peripherals(peripherals)
            .with_transport(transport)
            .with_clock(clock.clone())
            .build()
            .expect("locker builds from valid config");

        Harness {
            locker,
            clock,
            hw,
            bridge,
            config,
            reports: Vec::new(),
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Setup::default().build()
    }

    /// Advance one tick period and run one tick.
    pub fn tick(&mut self) -> &TickReport {
        self.clock.advance(self.config.timing.tick());
        let report = self.locker.tick();
        self.reports.push(report);
        self.reports.last().expect("report was just pushed")
    }

    pub fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Run ticks until at least `duration` has passed.
    pub fn run_for(&mut self, duration: Duration) {
        let tick = self.config.timing.tick();
        let count = duration.as_millis().div_ceil(tick.as_millis());
        self.ticks(count as usize);
    }

    /// Type keys, then tick once per key plus one.
    pub fn press(&mut self, keys: &str) {
        self.hw.keypad.type_keys(keys).expect("valid keypad characters");
        let count = keys.chars().filter(|c| !c.is_whitespace()).count();
        self.ticks(count + 1);
    }

    /// Move the door and item, then let the monitor accept the change.
    pub fn world(&mut self, door_closed: bool, item_present: bool) {
        self.hw.set_door_closed(door_closed);
        self.hw.set_item_present(item_present);
        self.run_for(SETTLE);
    }

    /// Type `#`, the subject and `#` from `IdleAvailable`.
    pub fn request_borrow(&mut self, subject: &str) {
        self.press("#");
        assert_eq!(self.state(), TransactionState::AwaitingId);
        self.press(&format!("{subject}#"));
    }

    pub fn state(&self) -> TransactionState {
        self.locker.state()
    }

    /// Every record emitted so far.
    pub fn records(&self) -> Vec<&TransactionLogRecord> {
        self.reports.iter().flat_map(|r| r.records.iter()).collect()
    }

    pub fn records_of(&self, kind: LogKind) -> Vec<&TransactionLogRecord> {
        self.records().into_iter().filter(|r| r.kind == kind).collect()
    }

    /// Every state entered so far, in order.
    pub fn path(&self) -> Vec<TransactionState> {
        self.reports
            .iter()
            .flat_map(|r| r.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// Forget collected reports.
    pub fn clear(&mut self) {
        self.reports.clear();
    }
}
