//! The transaction controller.
//!
//! [`TransactionController`] is the locker's main state machine. Each tick it
//! takes the key pressed (if any) and the security snapshot for that tick,
//! advances the [`StateMachine`], drives the lock, and emits transaction log
//! records. Every side effect happens inside the code path of one transition,
//! so re-evaluating a state that did not change repeats nothing.
//!
//! Borrowing needs a decision from the remote authority; returning never
//! does. Door-open timeouts only fire once the door is shut again, so a
//! timed-out transaction never leaves an idle locker with its door open.

use locker_core::{IdentifierPolicy, SubjectId, TimingConfig, Timestamp};
use locker_hardware::{Actuator, Key};
use locker_protocol::{Decision, Directive, LogKind, TransactionLogRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clock::TickTime;
use crate::feedback::Notice;
use crate::pending::{AuthRequester, PendingAuth};
use crate::security::{SecuritySnapshot, SecurityState};
use crate::session::SessionContext;
use crate::state_machine::{StateMachine, StateTransition, TransactionState};

/// Upper bound on chained transitions in one evaluation.
const MAX_STEPS_PER_TICK: usize = 4;

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub transitions: Vec<StateTransition>,
    pub records: Vec<TransactionLogRecord>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.records.is_empty()
    }

    pub fn extend(&mut self, other: Evaluation) {
        self.transitions.extend(other.transitions);
        self.records.extend(other.records);
    }
}

/// Read-only projection of the controller for display and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerView {
    pub state: TransactionState,
    pub input: String,
    pub input_len: usize,
    pub alert: bool,
    pub unlocked: bool,
    pub link_available: bool,
}

/// Channels and devices the controller writes to.
pub struct ControllerOutputs {
    pub lock: Box<dyn Actuator>,
    pub auth: AuthRequester,
    pub outbox: mpsc::Sender<Directive>,
    pub notices: mpsc::Sender<Notice>,
}

/// The locker's main state machine.
pub struct TransactionController {
    machine: StateMachine,
    lock: Box<dyn Actuator>,
    auth: AuthRequester,
    outbox: mpsc::Sender<Directive>,
    notices: mpsc::Sender<Notice>,
    session: SessionContext,
    timing: TimingConfig,
    policy: IdentifierPolicy,
    security: SecuritySnapshot,
    alert: bool,
    out: Evaluation,
}

impl TransactionController {
    /// Create a controller in the idle state matching `security`, with the
    /// lock engaged.
    pub fn new(
        outputs: ControllerOutputs,
        timing: TimingConfig,
        policy: IdentifierPolicy,
        security: SecuritySnapshot,
        now: Timestamp,
    ) -> Self {
        let initial = derive_rest_state(security.state);
        let mut controller = Self {
            machine: StateMachine::new(initial, now),
            lock: outputs.lock,
            auth: outputs.auth,
            outbox: outputs.outbox,
            notices: outputs.notices,
            session: SessionContext::new(&policy),
            timing,
            policy,
            security,
            alert: false,
            out: Evaluation::default(),
        };

        controller.set_lock(true);
        info!(state = %initial, security = %security.state, "Transaction controller started");
        controller
    }

    pub fn state(&self) -> TransactionState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// `true` while a forced entry is unresolved.
    pub fn is_alert(&self) -> bool {
        self.alert
    }

    /// `true` while the lock is released.
    pub fn is_unlocked(&self) -> bool {
        !self.lock.is_active()
    }

    pub fn pending_auth(&self) -> PendingAuth {
        self.auth.snapshot()
    }

    pub fn view(&self, link_available: bool) -> ControllerView {
        ControllerView {
            state: self.state(),
            input: self.session.input().to_string(),
            input_len: self.session.input_len(),
            alert: self.alert,
            unlocked: self.is_unlocked(),
            link_available,
        }
    }

    /// Apply this tick's key press and advance the state machine.
    pub fn evaluate(&mut self, time: TickTime, key: Option<Key>, security: SecuritySnapshot) -> Evaluation {
        self.security = security;

        if let Some(key) = key {
            if self.alert {
                debug!(key = %key.as_char(), "Key ignored during security alert");
            } else {
                self.handle_key(key, time);
            }
        }

        for _ in 0..MAX_STEPS_PER_TICK {
            let before = self.state();
            self.advance(time);
            if self.state() == before {
                break;
            }
        }

        std::mem::take(&mut self.out)
    }

    /// Forced-entry and sensor-fault checks, run last in the tick.
    pub fn check_faults(&mut self, time: TickTime, security: SecuritySnapshot) -> Evaluation {
        self.security = security;
        let state = self.state();

        if security.state.is_fault() {
            if !matches!(state, TransactionState::ErrorState | TransactionState::Maintenance) {
                error!(state = %state, "Sensor fault, entering error state");
                self.set_lock(true);
                self.auth.abandon();
                self.session.reset();
                self.alert = false;
                self.notify("SENSOR FAULT\nCALL SERVICE");
                self.go(TransactionState::ErrorState, time.now);
            }
            return std::mem::take(&mut self.out);
        }

        if state.is_idle() && security.state.is_door_open() && !self.alert {
            warn!(state = %state, security = %security.state, "Door open while idle, forced entry");
            self.alert = true;
            self.emit(LogKind::SecurityBreach, None, time);
            self.notify("SECURITY ALERT");
        }

        if self.alert && security.state.door_closed() == Some(true) {
            info!("Door closed after forced entry, re-locking");
            self.set_lock(true);
            self.alert = false;
            let next = derive_rest_state(security.state);
            if next != self.state() && self.state().is_idle() {
                self.go(next, time.now);
            }
        }

        std::mem::take(&mut self.out)
    }

    fn handle_key(&mut self, key: Key, time: TickTime) {
        let now = time.now;

        match (self.state(), key) {
            (TransactionState::IdleAvailable, Key::Hash) => {
                if self.security.state.item_present() == Some(true) {
                    self.session.begin_entry(now);
                    self.go(TransactionState::AwaitingId, now);
                } else {
                    self.notify("EMPTY");
                }
            }
            (TransactionState::IdleOccupied, Key::Hash) => {
                self.set_lock(false);
                self.go(TransactionState::ReturnInProgress, now);
                self.machine.set_timeout(self.timing.door_open_timeout());
                self.notify("OPEN DOOR\nPLACE ITEM");
            }
            (TransactionState::IdleAvailable | TransactionState::IdleOccupied | TransactionState::ErrorState, Key::D) => {
                info!(from = %self.state(), "Entering maintenance");
                self.go(TransactionState::Maintenance, now);
            }

            (TransactionState::AwaitingId, Key::Digit(_)) => {
                if !self.session.push_digit(key.as_char(), now) {
                    debug!("Identifier buffer full, digit ignored");
                }
            }
            (TransactionState::AwaitingId, Key::Star) => {
                if !self.session.backspace(now) {
                    debug!("Identifier entry cancelled");
                    self.session.reset();
                    self.go(TransactionState::IdleAvailable, now);
                }
            }
            (TransactionState::AwaitingId, Key::Hash) => self.submit_identifier(time),

            (TransactionState::Maintenance, Key::A) => {
                self.set_lock(false);
                self.notify("UNLOCKED");
            }
            (TransactionState::Maintenance, Key::B) => {
                self.set_lock(true);
                self.notify("LOCKED");
            }
            (TransactionState::Maintenance, Key::C) => {
                let raw = self.security.raw;
                self.notify(&format!("D:{} I:{}\n{}", raw.door, raw.item, self.security.state));
            }
            (TransactionState::Maintenance, Key::D) => self.exit_maintenance(now),

            (state, key) => debug!(state = %state, key = %key.as_char(), "Key ignored"),
        }
    }

    fn submit_identifier(&mut self, time: TickTime) {
        match SubjectId::with_policy(self.session.input(), &self.policy) {
            Ok(subject) => {
                info!(subject = %subject, "Requesting authorization");
                self.auth.request(subject.clone(), time.now);
                self.session.set_current_subject(subject);
                self.session.clear_input();
                self.go(TransactionState::Authenticating, time.now);
                self.machine.set_timeout(self.timing.auth_timeout());
            }
            Err(e) => {
                debug!("Identifier rejected: {}", e);
                self.session.begin_entry(time.now);
                self.notify(&format!("ID: {}-{} DIGITS", self.policy.min_len, self.policy.max_len));
            }
        }
    }

    fn exit_maintenance(&mut self, now: Timestamp) {
        if self.security.state.is_door_open() {
            self.notify("CLOSE DOOR FIRST");
            return;
        }

        self.set_lock(true);
        let next = match self.security.state {
            SecurityState::SensorError => TransactionState::ErrorState,
            state => derive_rest_state(state),
        };
        info!(to = %next, "Leaving maintenance");
        self.go(next, now);
    }

    /// Time- and sensor-driven progress for the current state.
    fn advance(&mut self, time: TickTime) {
        let now = time.now;
        let security = self.security.state;

        match self.state() {
            TransactionState::AwaitingId => {
                if now.has_elapsed(self.session.last_activity(), self.timing.input_timeout()) {
                    debug!("Identifier entry timed out");
                    self.session.reset();
                    self.notify("TIMEOUT");
                    self.go(TransactionState::IdleAvailable, now);
                }
            }

            TransactionState::Authenticating => {
                if let Some(decision) = self.auth.take_result() {
                    match decision {
                        Decision::Granted => {
                            info!(subject = ?self.session.current_subject().map(SubjectId::as_str), "Authorization granted");
                            self.go(TransactionState::BorrowAuthorized, now);
                        }
                        Decision::Denied => {
                            let subject = self.session.current_subject().cloned();
                            if self.auth.link_unavailable() {
                                warn!("Authorization unavailable, bridge unreachable");
                                self.emit(LogKind::Timeout, subject, time);
                                self.notify("DENIED\nOFFLINE");
                            } else {
                                warn!("Authorization denied");
                                self.emit(LogKind::Denied, subject, time);
                                self.notify("DENIED");
                            }
                            self.session.reset();
                            self.go(TransactionState::IdleAvailable, now);
                        }
                    }
                } else if self.machine.has_timed_out(now) {
                    let anomaly = self.auth.anomaly();
                    self.auth.abandon();
                    let kind = match &anomaly {
                        Some(text) => {
                            warn!(reply = %text, "Authorization failed on unrecognized reply");
                            LogKind::Denied
                        }
                        None => {
                            warn!("Authorization timed out");
                            LogKind::Timeout
                        }
                    };
                    let subject = self.session.current_subject().cloned();
                    self.emit(kind, subject, time);
                    self.session.reset();
                    self.notify("NO RESPONSE");
                    self.go(TransactionState::IdleAvailable, now);
                }
            }

            TransactionState::BorrowAuthorized => {
                self.set_lock(false);
                self.go(TransactionState::BorrowInProgress, now);
                self.machine.set_timeout(self.timing.door_open_timeout());
                self.notify("OPEN DOOR\nTAKE ITEM");
            }

            TransactionState::BorrowInProgress => {
                if security == SecurityState::OpenAbsent {
                    self.go(TransactionState::BorrowCompleting, now);
                } else if self.machine.has_timed_out(now) && security.door_closed() == Some(true) {
                    warn!("Borrow timed out");
                    self.set_lock(true);
                    let subject = self.session.current_subject().cloned();
                    self.emit(LogKind::Timeout, subject, time);
                    self.session.reset();
                    self.notify("TIMEOUT");
                    self.go(TransactionState::IdleAvailable, now);
                }
            }

            TransactionState::BorrowCompleting => match security {
                SecurityState::ClosedAbsent => {
                    self.set_lock(true);
                    let subject = self.session.current_subject().cloned();
                    self.session.commit_borrow();
                    self.emit(LogKind::Borrow, subject, time);
                    self.notify("ENJOY");
                    self.go(TransactionState::IdleOccupied, now);
                }
                SecurityState::ClosedPresent => {
                    info!("Item put back, borrow cancelled");
                    self.set_lock(true);
                    self.session.reset();
                    self.notify("CANCELLED");
                    self.go(TransactionState::IdleAvailable, now);
                }
                _ => {}
            },

            TransactionState::ReturnInProgress => {
                if security == SecurityState::OpenPresent {
                    self.go(TransactionState::ReturnCompleting, now);
                } else if self.machine.has_timed_out(now) && security.door_closed() == Some(true) {
                    warn!("Return timed out");
                    self.set_lock(true);
                    let subject = self.session.last_subject().cloned();
                    self.emit(LogKind::Timeout, subject, time);
                    self.notify("TIMEOUT");
                    self.go(TransactionState::IdleOccupied, now);
                }
            }

            TransactionState::ReturnCompleting => match security {
                SecurityState::ClosedPresent => {
                    self.set_lock(true);
                    let subject = self.session.take_last_subject();
                    if let Some(id) = &subject {
                        self.send(Directive::Return(id.clone()));
                    }
                    self.emit(LogKind::Return, subject, time);
                    self.notify("THANK YOU");
                    self.go(TransactionState::IdleAvailable, now);
                }
                SecurityState::ClosedAbsent => {
                    info!("Item removed again, return not completed");
                    self.set_lock(true);
                    self.go(TransactionState::IdleOccupied, now);
                }
                _ => {}
            },

            TransactionState::IdleAvailable
            | TransactionState::IdleOccupied
            | TransactionState::ErrorState
            | TransactionState::Maintenance => {}
        }
    }

    fn go(&mut self, to: TransactionState, now: Timestamp) {
        match self.machine.transition_to(to, now) {
            Ok(transition) => {
                info!(from = %transition.from, to = %transition.to, "Transaction state changed");
                self.out.transitions.push(transition);
            }
            Err(e) => error!("{}", e),
        }
    }

    fn set_lock(&mut self, locked: bool) {
        if let Err(e) = self.lock.set(locked) {
            error!(locked, "Lock actuator failed: {}", e);
        }
    }

    fn emit(&mut self, kind: LogKind, subject: Option<SubjectId>, time: TickTime) {
        let record = TransactionLogRecord::new(kind, subject, time.wall);
        info!(kind = %kind, "Transaction record: {}", record.to_line());
        self.send(Directive::Record(record.clone()));
        self.out.records.push(record);
    }

    fn send(&mut self, directive: Directive) {
        if let Err(e) = self.outbox.try_send(directive) {
            warn!("Outbox full, directive dropped: {}", e);
        }
    }

    fn notify(&self, text: &str) {
        if self.notices.try_send(Notice::new(text)).is_err() {
            debug!("Notice channel full, dropped {:?}", text);
        }
    }
}

impl std::fmt::Debug for TransactionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionController")
            .field("state", &self.state())
            .field("security", &self.security.state)
            .field("alert", &self.alert)
            .field("input_len", &self.session.input_len())
            .finish()
    }
}

/// The idle state a locker at rest belongs in.
fn derive_rest_state(security: SecurityState) -> TransactionState {
    match security {
        SecurityState::SensorError => TransactionState::ErrorState,
        state if state.item_present() == Some(true) => TransactionState::IdleAvailable,
        _ => TransactionState::IdleOccupied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{AuthResponder, pending_auth};
    use crate::security::RawSample;
    use chrono::{DateTime, Utc};
    use locker_hardware::mock::{MockActuator, MockActuatorHandle};
    use rstest::rstest;

    struct Fixture {
        controller: TransactionController,
        responder: AuthResponder,
        lock: MockActuatorHandle,
        outbox: mpsc::Receiver<Directive>,
        notices: mpsc::Receiver<Notice>,
    }

    fn snap(state: SecurityState) -> SecuritySnapshot {
        SecuritySnapshot {
            state,
            raw: RawSample { door: 3000, item: 3000 },
        }
    }

    fn at(millis: u64) -> TickTime {
        TickTime {
            now: Timestamp::from_millis(millis),
            wall: DateTime::<Utc>::default(),
        }
    }

    fn fixture(initial: SecurityState) -> Fixture {
        let (lock, lock_handle) = MockActuator::new("lock", true);
        let (auth, responder) = pending_auth();
        let (outbox_tx, outbox) = mpsc::channel(32);
        let (notice_tx, notices) = mpsc::channel(32);
        let controller = TransactionController::new(
            ControllerOutputs {
                lock: Box::new(lock),
                auth,
                outbox: outbox_tx,
                notices: notice_tx,
            },
            TimingConfig::default(),
            IdentifierPolicy::default(),
            snap(initial),
            Timestamp::ZERO,
        );
        Fixture {
            controller,
            responder,
            lock: lock_handle,
            outbox,
            notices,
        }
    }

    impl Fixture {
        fn key(&mut self, millis: u64, key: Key, security: SecurityState) -> Evaluation {
            self.controller.evaluate(at(millis), Some(key), snap(security))
        }

        fn tick(&mut self, millis: u64, security: SecurityState) -> Evaluation {
            let mut eval = self.controller.evaluate(at(millis), None, snap(security));
            eval.extend(self.controller.check_faults(at(millis), snap(security)));
            eval
        }

        fn type_id(&mut self, millis: u64, id: &str) {
            for c in id.chars() {
                let key = Key::from_char(c).unwrap();
                self.key(millis, key, SecurityState::ClosedPresent);
            }
        }

        fn notices(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(notice) = self.notices.try_recv() {
                out.push(notice.text);
            }
            out
        }

        fn directives(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(directive) = self.outbox.try_recv() {
                out.push(directive.to_line());
            }
            out
        }

        fn authenticate(&mut self) {
            self.key(0, Key::Hash, SecurityState::ClosedPresent);
            self.type_id(100, "12345678");
            self.key(200, Key::Hash, SecurityState::ClosedPresent);
            assert_eq!(self.controller.state(), TransactionState::Authenticating);
        }

        fn grant(&mut self) {
            let request = self.responder.pending_request().unwrap();
            assert!(self.responder.resolve(request.generation, Decision::Granted));
        }
    }

    #[rstest]
    #[case(SecurityState::ClosedPresent, TransactionState::IdleAvailable)]
    #[case(SecurityState::ClosedAbsent, TransactionState::IdleOccupied)]
    #[case(SecurityState::SensorError, TransactionState::ErrorState)]
    fn test_initial_state_from_security(#[case] security: SecurityState, #[case] expected: TransactionState) {
        let f = fixture(security);
        assert_eq!(f.controller.state(), expected);
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_start_requires_item() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(f.notices(), ["EMPTY"]);

        f.key(10, Key::Hash, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::AwaitingId);
    }

    #[test]
    fn test_identifier_entry_and_backspace() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedPresent);
        f.type_id(10, "1234");
        f.key(20, Key::Star, SecurityState::ClosedPresent);
        assert_eq!(f.controller.session().input(), "123");
        assert_eq!(f.controller.view(true).input_len, 3);
    }

    #[test]
    fn test_star_on_empty_buffer_cancels() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedPresent);
        f.type_id(10, "1");
        f.key(20, Key::Star, SecurityState::ClosedPresent);
        f.key(30, Key::Star, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
    }

    #[rstest]
    #[case("1234567", false)]
    #[case("12345678", true)]
    #[case("123456789", true)]
    fn test_identifier_length_policy(#[case] id: &str, #[case] accepted: bool) {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedPresent);
        f.type_id(10, id);
        f.key(20, Key::Hash, SecurityState::ClosedPresent);

        if accepted {
            assert_eq!(f.controller.state(), TransactionState::Authenticating);
            assert_eq!(f.controller.pending_auth().subject.unwrap().as_str(), id);
        } else {
            assert_eq!(f.controller.state(), TransactionState::AwaitingId);
            assert_eq!(f.controller.session().input(), "");
            assert!(!f.controller.pending_auth().requested);
            assert_eq!(f.notices(), ["ID: 8-9 DIGITS"]);
        }
    }

    #[test]
    fn test_extra_digits_are_ignored() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedPresent);
        f.type_id(10, "1234567890");
        assert_eq!(f.controller.session().input(), "123456789");
    }

    #[test]
    fn test_input_timeout_returns_to_idle_without_record() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::Hash, SecurityState::ClosedPresent);
        f.type_id(5_000, "123");

        assert!(f.tick(19_999, SecurityState::ClosedPresent).is_empty());
        let eval = f.tick(20_000, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert!(eval.records.is_empty());
    }

    #[test]
    fn test_grant_unlocks_in_same_tick() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        f.grant();

        let eval = f.tick(300, SecurityState::ClosedPresent);
        let path: Vec<_> = eval.transitions.iter().map(|t| t.to).collect();
        assert_eq!(path, [TransactionState::BorrowAuthorized, TransactionState::BorrowInProgress]);
        assert!(!f.lock.is_active());
        assert!(f.controller.is_unlocked());
    }

    #[test]
    fn test_denied_logs_record() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        let request = f.responder.pending_request().unwrap();
        f.responder.resolve(request.generation, Decision::Denied);

        let eval = f.tick(300, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(eval.records.len(), 1);
        assert_eq!(eval.records[0].kind, LogKind::Denied);
        assert_eq!(eval.records[0].subject.as_ref().unwrap().as_str(), "12345678");
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_unreachable_bridge_logs_timeout() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        let request = f.responder.pending_request().unwrap();
        assert!(f.responder.deny_unreachable(request.generation));

        let eval = f.tick(300, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(eval.records.len(), 1);
        assert_eq!(eval.records[0].kind, LogKind::Timeout);
        assert_eq!(eval.records[0].subject.as_ref().unwrap().as_str(), "12345678");
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_auth_timeout_logs_timeout() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();

        assert!(f.tick(10_199, SecurityState::ClosedPresent).is_empty());
        let eval = f.tick(10_200, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(eval.records[0].kind, LogKind::Timeout);
        assert!(f.responder.pending_request().is_none());
    }

    #[test]
    fn test_auth_timeout_after_anomaly_logs_denied() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        let request = f.responder.pending_request().unwrap();
        f.responder.note_anomaly(request.generation, "WHAT");

        let eval = f.tick(10_200, SecurityState::ClosedPresent);
        assert_eq!(eval.records[0].kind, LogKind::Denied);
    }

    #[test]
    fn test_late_grant_after_timeout_is_ignored() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        let request = f.responder.pending_request().unwrap();
        f.tick(10_200, SecurityState::ClosedPresent);

        assert!(!f.responder.resolve(request.generation, Decision::Granted));
        f.tick(10_300, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
    }

    #[test]
    fn test_full_borrow() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        f.grant();
        f.tick(300, SecurityState::ClosedPresent);

        f.tick(1_000, SecurityState::OpenPresent);
        assert_eq!(f.controller.state(), TransactionState::BorrowInProgress);
        f.tick(1_500, SecurityState::OpenAbsent);
        assert_eq!(f.controller.state(), TransactionState::BorrowCompleting);

        let eval = f.tick(2_000, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleOccupied);
        assert_eq!(eval.records.len(), 1);
        assert_eq!(eval.records[0].kind, LogKind::Borrow);
        assert!(f.lock.is_active());
        assert_eq!(f.controller.session().last_subject().unwrap().as_str(), "12345678");
        assert!(!f.controller.is_alert());
    }

    #[test]
    fn test_item_put_back_cancels_without_record() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        f.grant();
        f.tick(300, SecurityState::ClosedPresent);
        f.tick(1_000, SecurityState::OpenAbsent);
        f.tick(1_500, SecurityState::OpenPresent);

        let eval = f.tick(2_000, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert!(eval.records.is_empty());
        assert!(f.notices().contains(&"CANCELLED".to_string()));
    }

    #[test]
    fn test_borrow_timeout_waits_for_closed_door() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        f.grant();
        f.tick(300, SecurityState::ClosedPresent);

        f.tick(10_000, SecurityState::OpenPresent);
        f.tick(30_300, SecurityState::OpenPresent);
        assert_eq!(f.controller.state(), TransactionState::BorrowInProgress);

        let eval = f.tick(31_000, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(eval.records[0].kind, LogKind::Timeout);
        assert!(f.lock.is_active());
        assert!(!f.controller.is_alert());
    }

    #[test]
    fn test_return_needs_no_authorization() {
        let mut f = fixture(SecurityState::ClosedAbsent);
        f.key(0, Key::Hash, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::ReturnInProgress);
        assert!(!f.lock.is_active());
        assert!(!f.controller.pending_auth().requested);

        f.tick(500, SecurityState::OpenAbsent);
        f.tick(1_000, SecurityState::OpenPresent);
        assert_eq!(f.controller.state(), TransactionState::ReturnCompleting);

        let eval = f.tick(1_500, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);
        assert_eq!(eval.records.len(), 1);
        assert_eq!(eval.records[0].kind, LogKind::Return);
        assert!(eval.records[0].subject.is_none());
    }

    #[test]
    fn test_return_after_borrow_announces_subject() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();
        f.grant();
        f.tick(300, SecurityState::ClosedPresent);
        f.tick(1_000, SecurityState::OpenAbsent);
        f.tick(1_500, SecurityState::ClosedAbsent);
        f.directives();

        f.key(2_000, Key::Hash, SecurityState::ClosedAbsent);
        f.tick(2_500, SecurityState::OpenPresent);
        f.tick(3_000, SecurityState::ClosedPresent);

        let lines = f.directives();
        assert_eq!(lines[0], "RETURN,12345678");
        assert!(lines[1].starts_with("RETURN,12345678,"));
        assert!(f.controller.session().last_subject().is_none());
    }

    #[test]
    fn test_item_removed_again_during_return() {
        let mut f = fixture(SecurityState::ClosedAbsent);
        f.key(0, Key::Hash, SecurityState::ClosedAbsent);
        f.tick(500, SecurityState::OpenPresent);
        f.tick(800, SecurityState::OpenAbsent);

        let eval = f.tick(1_000, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleOccupied);
        assert!(eval.records.is_empty());
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_return_timeout() {
        let mut f = fixture(SecurityState::ClosedAbsent);
        f.key(0, Key::Hash, SecurityState::ClosedAbsent);

        let eval = f.tick(30_000, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleOccupied);
        assert_eq!(eval.records[0].kind, LogKind::Timeout);
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_forced_entry_and_recovery() {
        let mut f = fixture(SecurityState::ClosedPresent);

        let eval = f.tick(100, SecurityState::OpenPresent);
        assert!(f.controller.is_alert());
        assert_eq!(eval.records.len(), 1);
        assert_eq!(eval.records[0].kind, LogKind::SecurityBreach);
        assert!(eval.records[0].subject.is_none());

        // Once per breach, and keys are ignored meanwhile.
        assert!(f.tick(200, SecurityState::OpenAbsent).records.is_empty());
        f.key(250, Key::Hash, SecurityState::OpenAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleAvailable);

        let eval = f.tick(300, SecurityState::ClosedAbsent);
        assert!(!f.controller.is_alert());
        assert_eq!(f.controller.state(), TransactionState::IdleOccupied);
        assert_eq!(eval.transitions.len(), 1);
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_sensor_fault_forces_error_state() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.authenticate();

        f.tick(300, SecurityState::SensorError);
        assert_eq!(f.controller.state(), TransactionState::ErrorState);
        assert!(f.responder.pending_request().is_none());

        // Only the maintenance key leaves the error state.
        f.key(400, Key::Hash, SecurityState::ClosedPresent);
        f.tick(500, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::ErrorState);

        f.key(600, Key::D, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::Maintenance);
    }

    #[test]
    fn test_maintenance_commands() {
        let mut f = fixture(SecurityState::ClosedPresent);
        f.key(0, Key::D, SecurityState::ClosedPresent);
        assert_eq!(f.controller.state(), TransactionState::Maintenance);

        f.key(10, Key::A, SecurityState::ClosedPresent);
        assert!(!f.lock.is_active());
        f.key(20, Key::B, SecurityState::ClosedPresent);
        assert!(f.lock.is_active());
        f.key(30, Key::C, SecurityState::ClosedPresent);
        assert_eq!(f.notices(), ["UNLOCKED", "LOCKED", "D:3000 I:3000\nClosedPresent"]);

        // Door open in maintenance is not a breach, but blocks the exit.
        f.key(40, Key::A, SecurityState::ClosedPresent);
        assert!(f.tick(50, SecurityState::OpenAbsent).records.is_empty());
        f.key(60, Key::D, SecurityState::OpenAbsent);
        assert_eq!(f.controller.state(), TransactionState::Maintenance);

        f.key(70, Key::D, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::IdleOccupied);
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_maintenance_exit_with_fault_returns_to_error() {
        let mut f = fixture(SecurityState::SensorError);
        f.key(0, Key::D, SecurityState::SensorError);
        f.tick(10, SecurityState::SensorError);
        assert_eq!(f.controller.state(), TransactionState::Maintenance);

        f.key(20, Key::D, SecurityState::SensorError);
        assert_eq!(f.controller.state(), TransactionState::ErrorState);
    }

    #[test]
    fn test_actuator_failure_does_not_block_transition() {
        let mut f = fixture(SecurityState::ClosedAbsent);
        f.lock.set_failing(true);
        f.key(0, Key::Hash, SecurityState::ClosedAbsent);
        assert_eq!(f.controller.state(), TransactionState::ReturnInProgress);
        assert!(f.lock.is_active());
    }

    #[test]
    fn test_stable_input_is_idempotent() {
        let mut f = fixture(SecurityState::ClosedPresent);
        for t in (0..5_000).step_by(20) {
            assert!(f.tick(t, SecurityState::ClosedPresent).is_empty());
        }
        assert!(f.controller.machine().history().is_empty());
        assert!(f.directives().is_empty());
    }
}
