//! End-to-end locker scenarios on mock hardware.
//!
//! Each test drives the physical world (keypad, door, item) and the mock
//! bridge through a [`common::Harness`] and checks the resulting state
//! path, log records and outputs.

mod common;

use std::time::Duration;

use common::{Harness, SUBJECT, Setup};
use locker_controller::{LinkState, SecurityState, TransactionState};
use locker_protocol::LogKind;

// ============================================================================
// Borrow
// ============================================================================

#[test]
fn borrow_success_path() {
    let mut h = Harness::new();
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    h.request_borrow(SUBJECT);
    assert_eq!(h.state(), TransactionState::Authenticating);
    assert_eq!(h.bridge.take_sent(), [format!("BORROW,{SUBJECT}")]);

    h.bridge.push_reply("OK");
    h.ticks(2);
    assert_eq!(h.state(), TransactionState::BorrowInProgress);
    assert!(!h.hw.is_locked());
    assert!(h.hw.indicator.is_active());

    h.world(false, false);
    assert_eq!(h.state(), TransactionState::BorrowCompleting);

    h.world(true, false);
    assert_eq!(h.state(), TransactionState::IdleOccupied);
    assert!(h.hw.is_locked());
    assert!(!h.hw.indicator.is_active());

    assert_eq!(
        h.path(),
        [
            TransactionState::AwaitingId,
            TransactionState::Authenticating,
            TransactionState::BorrowAuthorized,
            TransactionState::BorrowInProgress,
            TransactionState::BorrowCompleting,
            TransactionState::IdleOccupied,
        ]
    );

    let borrows = h.records_of(LogKind::Borrow);
    assert_eq!(borrows.len(), 1);
    assert_eq!(borrows[0].subject.as_ref().map(|s| s.as_str()), Some(SUBJECT));
    assert_eq!(h.records().len(), 1);

    let sent = h.bridge.take_sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("BORROW,12345678,1970-01-01T"));
}

#[test]
fn denied_borrow_returns_to_idle() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);
    h.bridge.push_reply("denied");
    h.ticks(2);

    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.hw.is_locked());
    assert_eq!(h.records_of(LogKind::Denied).len(), 1);
    assert!(h.hw.display.text().contains("DENIED"));
}

#[test]
fn borrow_then_return_round_trip() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);
    h.bridge.push_reply("GRANTED");
    h.ticks(2);
    h.world(false, false);
    h.world(true, false);
    assert_eq!(h.state(), TransactionState::IdleOccupied);
    h.bridge.take_sent();

    h.press("#");
    assert_eq!(h.state(), TransactionState::ReturnInProgress);
    h.world(false, true);
    h.world(true, true);
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    let sent = h.bridge.take_sent();
    assert_eq!(sent[0], format!("RETURN,{SUBJECT}"));
    assert!(sent[1].starts_with(&format!("RETURN,{SUBJECT},")));

    // The return acknowledgement is consumed, not taken as a grant.
    h.bridge.push_reply("OK");
    h.ticks(2);
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.locker.link_state(), LinkState::Idle);
}

// ============================================================================
// Offline
// ============================================================================

#[test]
fn offline_return_without_authorization() {
    let mut h = Setup::default().item_absent().offline().build();
    assert_eq!(h.state(), TransactionState::IdleOccupied);

    h.run_for(Duration::from_millis(2_500));
    assert_eq!(h.locker.link_state(), LinkState::Offline);

    h.press("#");
    assert_eq!(h.state(), TransactionState::ReturnInProgress);
    h.world(false, true);
    assert_eq!(h.state(), TransactionState::ReturnCompleting);
    h.world(true, true);
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    assert_eq!(h.records_of(LogKind::Return).len(), 1);
    assert_eq!(h.records().len(), 1);
    assert_eq!(h.locker.controller().pending_auth().generation, 0);
    assert!(h.bridge.sent_lines().is_empty());
    assert_eq!(h.locker.link().queued(), 1);

    // Queued records go out on the first successful reconnect.
    h.bridge.set_reachable(true);
    h.run_for(Duration::from_millis(5_500));
    assert_eq!(h.locker.link_state(), LinkState::Idle);
    let sent = h.bridge.take_sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("RETURN,,"));
}

#[test]
fn offline_borrow_is_denied_locally() {
    let mut h = Setup::default().offline().build();
    h.run_for(Duration::from_millis(2_500));
    assert_eq!(h.locker.link_state(), LinkState::Offline);

    h.request_borrow(SUBJECT);
    h.ticks(1);
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.records_of(LogKind::Timeout).len(), 1);
    assert!(h.records_of(LogKind::Denied).is_empty());
    assert!(h.hw.is_locked());
    assert!(h.hw.display.text().contains("DENIED"));
    assert!(h.bridge.sent_lines().is_empty());

    // The outage is reported once the bridge is back.
    h.bridge.set_reachable(true);
    h.run_for(Duration::from_millis(5_500));
    let sent = h.bridge.take_sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with(&format!("TIMEOUT,{SUBJECT},")));
}

#[test]
fn connect_window_expiry_times_out_pending_request() {
    let mut h = Setup::default().offline().build();
    h.request_borrow(SUBJECT);
    assert_eq!(h.state(), TransactionState::Authenticating);

    h.run_for(Duration::from_millis(2_500));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.records_of(LogKind::Timeout).len(), 1);
    assert!(h.records_of(LogKind::Denied).is_empty());
}

// ============================================================================
// Authorization timeout
// ============================================================================

#[test]
fn authorization_timeout_without_reply() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);

    h.run_for(Duration::from_millis(9_800));
    assert_eq!(h.state(), TransactionState::Authenticating);

    h.run_for(Duration::from_millis(400));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.records_of(LogKind::Timeout).len(), 1);
    assert!(h.records_of(LogKind::Denied).is_empty());
    assert!(h.hw.is_locked());
}

#[test]
fn authorization_timeout_after_anomaly_is_denial() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);
    h.bridge.push_reply("PENDING");

    h.run_for(Duration::from_millis(10_200));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.records_of(LogKind::Denied).len(), 1);
    assert!(h.records_of(LogKind::Timeout).is_empty());
}

#[test]
fn silent_bridge_goes_offline_then_answers_next_borrow() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);

    h.run_for(Duration::from_millis(10_400));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.records_of(LogKind::Timeout).len(), 1);
    assert_eq!(h.locker.link_state(), LinkState::Offline);
    assert!(!h.locker.link().is_available());

    // Reconnects on the next attempt; a prompt reply is not lost.
    h.run_for(Duration::from_millis(5_200));
    assert_eq!(h.locker.link_state(), LinkState::Idle);
    assert!(h.locker.link().is_available());
    h.bridge.take_sent();

    h.request_borrow("87654321");
    assert_eq!(h.bridge.take_sent(), ["BORROW,87654321"]);
    h.bridge.push_reply("OK");
    h.ticks(2);
    assert_eq!(h.state(), TransactionState::BorrowInProgress);
    assert_eq!(h.records_of(LogKind::Timeout).len(), 1);
}

#[test]
fn late_grant_after_timeout_is_discarded() {
    let mut h = Harness::new();
    h.request_borrow(SUBJECT);
    h.run_for(Duration::from_millis(10_200));
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    h.bridge.push_reply("OK");
    h.run_for(Duration::from_millis(200));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.hw.is_locked());
}

// ============================================================================
// Forced entry
// ============================================================================

#[test]
fn forced_entry_raises_alert_and_recovers() {
    let mut h = Harness::new();

    h.world(false, true);
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.locker.view().alert);
    assert!(h.hw.buzzer.is_active());
    assert!(h.hw.display.text().contains("SECURITY ALERT"));

    let breaches = h.records_of(LogKind::SecurityBreach);
    assert_eq!(breaches.len(), 1);
    assert!(breaches[0].subject.is_none());

    // Item taken during the breach: the locker re-derives its idle state.
    h.world(false, false);
    h.world(true, false);
    assert!(!h.locker.view().alert);
    assert!(!h.hw.buzzer.is_active());
    assert_eq!(h.state(), TransactionState::IdleOccupied);
    assert!(h.hw.is_locked());
    assert_eq!(h.records_of(LogKind::SecurityBreach).len(), 1);
}

#[test]
fn keypad_is_ignored_during_breach() {
    let mut h = Harness::new();
    h.world(false, true);
    h.press("#12345678#");
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert_eq!(h.locker.controller().pending_auth().generation, 0);
}

// ============================================================================
// Sensor fault and maintenance
// ============================================================================

#[test]
fn sensor_fault_requires_maintenance() {
    let mut h = Harness::new();

    h.hw.set_raw(10, 10);
    h.run_for(Duration::from_millis(1_500));
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    h.run_for(Duration::from_millis(1_000));
    assert_eq!(h.locker.security(), SecurityState::SensorError);
    assert_eq!(h.state(), TransactionState::ErrorState);
    assert!(h.hw.is_locked());

    h.press("#A1");
    assert_eq!(h.state(), TransactionState::ErrorState);

    h.press("D");
    assert_eq!(h.state(), TransactionState::Maintenance);

    // Still faulted: leaving maintenance goes straight back.
    h.press("D");
    assert_eq!(h.state(), TransactionState::ErrorState);

    h.hw.set_raw(3500, 3500);
    h.run_for(common::SETTLE);
    assert_eq!(h.locker.security(), SecurityState::ClosedPresent);
    assert_eq!(h.state(), TransactionState::ErrorState);

    h.press("D");
    h.press("D");
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    // A fault is a notice, not a transaction record.
    assert!(h.records().is_empty());
    assert!(h.bridge.sent_lines().is_empty());
}

#[test]
fn maintenance_readout_and_manual_lock() {
    let mut h = Harness::new();
    h.press("D");
    assert_eq!(h.state(), TransactionState::Maintenance);

    h.press("A");
    assert!(!h.hw.is_locked());
    h.press("C");
    assert!(h.hw.display.text().contains("D:3500 I:3500"));

    h.world(false, true);
    assert!(h.records().is_empty());
    h.press("D");
    assert_eq!(h.state(), TransactionState::Maintenance);

    h.world(true, true);
    h.press("D");
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.hw.is_locked());
}

// ============================================================================
// Identifier entry
// ============================================================================

#[test]
fn input_timeout_abandons_entry() {
    let mut h = Harness::new();
    h.press("#1234");
    assert_eq!(h.state(), TransactionState::AwaitingId);

    h.run_for(Duration::from_millis(15_100));
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.records().is_empty());
}

#[test]
fn start_key_on_empty_compartment_is_refused() {
    let mut h = Harness::new();
    h.world(true, false);
    assert_eq!(h.state(), TransactionState::IdleAvailable);

    h.press("#");
    assert_eq!(h.state(), TransactionState::IdleAvailable);
    assert!(h.hw.display.text().contains("EMPTY"));
    assert!(h.records().is_empty());
}

#[test]
fn start_key_on_occupied_locker_begins_return() {
    let mut h = Setup::default().item_absent().build();
    assert_eq!(h.state(), TransactionState::IdleOccupied);

    h.press("#");
    assert_eq!(h.state(), TransactionState::ReturnInProgress);
    assert!(!h.hw.is_locked());
    assert!(!h.locker.controller().pending_auth().requested);
}

#[test]
fn display_follows_entry() {
    let mut h = Harness::new();
    h.press("#123");
    h.run_for(Duration::from_millis(300));
    assert_eq!(h.hw.display.text(), "ENTER ID|123");
}
