//! The tick scheduler.
//!
//! A [`Locker`] owns the four components and runs them cooperatively. One
//! call to [`Locker::tick`] reads the clock once and then runs, in order:
//!
//! 1. security monitor sampling
//! 2. keypad poll and transaction controller evaluation
//! 3. auth link evaluation
//! 4. feedback evaluation
//! 5. forced-entry and sensor-fault checks
//!
//! Nothing in a tick blocks. Components talk through single-writer handles
//! and bounded channels, never through shared mutable fields.

use locker_core::{Error, LockerConfig, Result, Timestamp};
use locker_hardware::{Keypad, Peripherals};
use locker_protocol::TransactionLogRecord;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth_link::{AuthLink, LinkState};
use crate::clock::{Clock, SystemClock};
use crate::feedback::{FeedbackCoordinator, FeedbackDevices, FeedbackInput};
use crate::pending::pending_auth;
use crate::security::{SecurityChange, SecurityMonitor, SecurityState};
use crate::state_machine::{StateTransition, TransactionState};
use crate::status_display::StatusDisplay;
use crate::transaction::{ControllerOutputs, ControllerView, TransactionController};
use crate::transport::LinkTransport;

/// Capacity of the controller -> feedback notice channel.
const NOTICE_CAPACITY: usize = 16;

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub at: Timestamp,
    pub state: TransactionState,
    pub security: SecurityState,
    pub link: LinkState,
    pub security_change: Option<SecurityChange>,
    pub transitions: Vec<StateTransition>,
    #[serde(skip)]
    pub records: Vec<TransactionLogRecord>,
}

impl TickReport {
    /// `true` if the tick changed nothing observable.
    pub fn is_quiet(&self) -> bool {
        self.security_change.is_none() && self.transitions.is_empty() && self.records.is_empty()
    }
}

/// A fully assembled locker.
pub struct Locker {
    clock: Box<dyn Clock>,
    keypad: Box<dyn Keypad>,
    monitor: SecurityMonitor,
    controller: TransactionController,
    link: AuthLink,
    feedback: FeedbackCoordinator,
    ticks: u64,
}

impl Locker {
    pub fn builder(config: LockerConfig) -> LockerBuilder {
        LockerBuilder::new(config)
    }

    /// Run one scheduler tick.
    pub fn tick(&mut self) -> TickReport {
        let time = self.clock.tick_time();
        self.ticks += 1;

        let security_change = self.monitor.sample(time.now);
        if let Some(change) = security_change {
            info!(from = %change.from, to = %change.to, "Security state changed");
        }
        let security = self.monitor.snapshot();

        let key = match self.keypad.poll_key() {
            Ok(key) => key,
            Err(e) => {
                warn!("Keypad read failed: {}", e);
                None
            }
        };
        if let Some(key) = key {
            debug!(key = %key, "Key pressed");
        }

        let mut evaluation = self.controller.evaluate(time, key, security);
        let link = self.link.evaluate(time.now);

        let view = self.controller.view(self.link.is_available());
        self.feedback.evaluate(
            time.now,
            FeedbackInput {
                view: &view,
                security: security.state,
                link,
            },
        );

        evaluation.extend(self.controller.check_faults(time, security));

        TickReport {
            at: time.now,
            state: self.controller.state(),
            security: security.state,
            link: self.link.state(),
            security_change,
            transitions: evaluation.transitions,
            records: evaluation.records,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.controller.state()
    }

    pub fn security(&self) -> SecurityState {
        self.monitor.state()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn view(&self) -> ControllerView {
        self.controller.view(self.link.is_available())
    }

    pub fn controller(&self) -> &TransactionController {
        &self.controller
    }

    pub fn monitor(&self) -> &SecurityMonitor {
        &self.monitor
    }

    pub fn link(&self) -> &AuthLink {
        &self.link
    }

    pub fn feedback(&self) -> &FeedbackCoordinator {
        &self.feedback
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl std::fmt::Debug for Locker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("ticks", &self.ticks)
            .field("monitor", &self.monitor)
            .field("controller", &self.controller)
            .field("link", &self.link)
            .field("feedback", &self.feedback)
            .finish()
    }
}

/// Assembles a [`Locker`] from configuration, devices, a transport and a
/// clock.
pub struct LockerBuilder {
    config: LockerConfig,
    peripherals: Option<Peripherals>,
    transport: Option<Box<dyn LinkTransport>>,
    clock: Option<Box<dyn Clock>>,
}

impl LockerBuilder {
    pub fn new(config: LockerConfig) -> Self {
        Self {
            config,
            peripherals: None,
            transport: None,
            clock: None,
        }
    }

    pub fn with_peripherals(mut self, peripherals: Peripherals) -> Self {
        self.peripherals = Some(peripherals);
        self
    }

    pub fn with_transport(mut self, transport: impl LinkTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Validate the configuration and wire the components together.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or the
    /// peripherals or transport were not provided.
    pub fn build(self) -> Result<Locker> {
        self.config.validate()?;

        let peripherals = self
            .peripherals
            .ok_or_else(|| Error::Config("peripherals not provided".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| Error::Config("link transport not provided".to_string()))?;
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock::new()));

        for device in peripherals.describe() {
            info!("Peripheral: {}", device);
        }

        let config = self.config;
        let timing = &config.timing;
        let now = clock.now();

        let Peripherals {
            door_sensor,
            item_sensor,
            lock,
            indicator,
            buzzer,
            keypad,
            display,
        } = peripherals;

        let monitor = SecurityMonitor::new(door_sensor, item_sensor, &config.sensors, timing.debounce(), now);

        let (requester, responder) = pending_auth();
        let (outbox_tx, outbox_rx) = mpsc::channel(config.link.outbox_capacity);
        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_CAPACITY);

        let controller = TransactionController::new(
            ControllerOutputs {
                lock,
                auth: requester,
                outbox: outbox_tx,
                notices: notice_tx,
            },
            timing.clone(),
            config.identifier.clone(),
            monitor.snapshot(),
            now,
        );

        let link = AuthLink::new(transport, responder, outbox_rx, timing, &config.link, now);

        let feedback = FeedbackCoordinator::new(
            StatusDisplay::from_settings(&config.display),
            FeedbackDevices {
                display,
                indicator,
                buzzer,
            },
            notice_rx,
            timing,
        );

        info!(state = %controller.state(), security = %monitor.state(), "Locker assembled");

        Ok(Locker {
            clock,
            keypad,
            monitor,
            controller,
            link,
            feedback,
            ticks: 0,
        })
    }
}
