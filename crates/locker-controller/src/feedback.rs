//! User feedback: LCD text, the green indicator and the buzzer.
//!
//! The coordinator only projects state; it never writes anything another
//! component reads. Transient notices come in over a bounded channel from
//! the transaction controller and the newest one wins.

use std::time::Duration;

use locker_core::{TimingConfig, Timestamp};
use locker_hardware::{Actuator, TextDisplay};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::auth_link::LinkState;
use crate::security::SecurityState;
use crate::state_machine::TransactionState;
use crate::status_display::StatusDisplay;
use crate::transaction::ControllerView;

/// A short message for the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text to show; `\n` separates display lines.
    pub text: String,
}

impl Notice {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Everything the feedback coordinator projects in one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackInput<'a> {
    pub view: &'a ControllerView,
    pub security: SecurityState,
    pub link: LinkState,
}

/// Output devices the coordinator drives.
pub struct FeedbackDevices {
    pub display: Box<dyn TextDisplay>,
    pub indicator: Box<dyn Actuator>,
    pub buzzer: Box<dyn Actuator>,
}

pub struct FeedbackCoordinator {
    display: StatusDisplay,
    devices: FeedbackDevices,
    notices: mpsc::Receiver<Notice>,
    message_duration: Duration,
    status_refresh: Duration,
    last_refresh: Option<Timestamp>,
    shown: Vec<String>,
}

impl FeedbackCoordinator {
    pub fn new(
        display: StatusDisplay,
        devices: FeedbackDevices,
        notices: mpsc::Receiver<Notice>,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            display,
            devices,
            notices,
            message_duration: timing.message_duration(),
            status_refresh: timing.status_refresh(),
            last_refresh: None,
            shown: Vec::new(),
        }
    }

    /// The frame buffer as last composed.
    pub fn display(&self) -> &StatusDisplay {
        &self.display
    }

    pub fn evaluate(&mut self, now: Timestamp, input: FeedbackInput<'_>) {
        let mut latest = None;
        while let Ok(notice) = self.notices.try_recv() {
            latest = Some(notice);
        }
        if let Some(notice) = latest {
            debug!(text = ?notice.text, "Showing notice");
            if let Err(e) = self.display.show_notice(&notice.text, self.message_duration, now) {
                warn!("Failed to show notice: {}", e);
            }
        }

        self.display.update(now);

        let refresh_due = self
            .last_refresh
            .is_none_or(|last| now.has_elapsed(last, self.status_refresh));
        if refresh_due {
            self.display.set_status(status_lines(input));
            self.last_refresh = Some(now);
        }

        let frame = self.display.frame();
        if frame != self.shown {
            match self.devices.display.show(&frame) {
                Ok(()) => self.shown = frame,
                Err(e) => warn!("Failed to update display: {}", e),
            }
        }

        drive(self.devices.indicator.as_mut(), input.view.unlocked, "indicator");
        drive(self.devices.buzzer.as_mut(), input.view.alert, "buzzer");
    }
}

impl std::fmt::Debug for FeedbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackCoordinator")
            .field("frame", &self.shown)
            .field("notice", &self.display.has_notice())
            .finish()
    }
}

fn drive(output: &mut dyn Actuator, on: bool, name: &str) {
    if output.is_active() == on {
        return;
    }
    if let Err(e) = output.set(on) {
        warn!("Failed to switch {} {}: {}", name, if on { "on" } else { "off" }, e);
    }
}

/// The status layer for the current state.
fn status_lines(input: FeedbackInput<'_>) -> [String; 2] {
    let view = input.view;

    if view.alert {
        return ["SECURITY ALERT".into(), "CLOSE THE DOOR".into()];
    }

    let idle_hint = || {
        match (view.link_available, input.link) {
            (true, _) => "PRESS # TO START",
            (false, LinkState::Connecting) => "CONNECTING...",
            (false, _) => "LINK OFFLINE",
        }
        .to_string()
    };

    match view.state {
        TransactionState::IdleAvailable => ["AVAILABLE".into(), idle_hint()],
        TransactionState::IdleOccupied => ["ON LOAN".into(), idle_hint()],
        TransactionState::AwaitingId => ["ENTER ID".into(), view.input.clone()],
        TransactionState::Authenticating => ["CHECKING...".into(), String::new()],
        TransactionState::BorrowAuthorized | TransactionState::BorrowInProgress => {
            ["TAKE ITEM".into(), String::new()]
        }
        TransactionState::ReturnInProgress => ["RETURN ITEM".into(), String::new()],
        TransactionState::BorrowCompleting | TransactionState::ReturnCompleting => {
            ["CLOSE DOOR".into(), String::new()]
        }
        TransactionState::ErrorState => ["OUT OF SERVICE".into(), "PRESS D".into()],
        TransactionState::Maintenance => ["MAINTENANCE".into(), input.security.to_string()],
    }
}
