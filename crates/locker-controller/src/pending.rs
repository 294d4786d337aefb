//! The pending authorization request.
//!
//! One request can be outstanding at a time. The transaction controller
//! raises and cancels it through an [`AuthRequester`]; the auth link answers
//! it through an [`AuthResponder`]. Each handle can only perform its own
//! half of the protocol, so the link can never raise a request and the
//! controller can never fabricate a decision.
//!
//! Every request carries a generation number. Cancelling bumps the
//! generation, which turns any answer still in flight for the old request
//! into a no-op.

use std::cell::RefCell;
use std::rc::Rc;

use locker_core::{SubjectId, Timestamp};
use locker_protocol::Decision;
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    requested: bool,
    generation: u64,
    subject: Option<SubjectId>,
    requested_at: Option<Timestamp>,
    result: Option<Decision>,
    anomaly: Option<String>,
    link_unavailable: bool,
}

/// Point-in-time copy of the pending request, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuth {
    pub requested: bool,
    pub generation: u64,
    pub subject: Option<SubjectId>,
    pub requested_at: Option<Timestamp>,
    pub result: Option<Decision>,
}

/// A request the link has not answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub generation: u64,
    pub subject: SubjectId,
    pub requested_at: Timestamp,
}

/// Create the two handles onto one empty slot.
pub fn pending_auth() -> (AuthRequester, AuthResponder) {
    let slot = Rc::new(RefCell::new(Slot::default()));
    (AuthRequester { slot: Rc::clone(&slot) }, AuthResponder { slot })
}

/// The controller's half.
#[derive(Debug)]
pub struct AuthRequester {
    slot: Rc<RefCell<Slot>>,
}

impl AuthRequester {
    /// Raise a new request, replacing any previous one.
    pub fn request(&self, subject: SubjectId, now: Timestamp) -> u64 {
        let mut slot = self.slot.borrow_mut();
        slot.generation = slot.generation.wrapping_add(1);
        slot.requested = true;
        slot.subject = Some(subject);
        slot.requested_at = Some(now);
        slot.result = None;
        slot.anomaly = None;
        slot.link_unavailable = false;
        slot.generation
    }

    pub fn is_requested(&self) -> bool {
        self.slot.borrow().requested
    }

    /// Consume a published decision. Clears the request.
    pub fn take_result(&self) -> Option<Decision> {
        let mut slot = self.slot.borrow_mut();
        let result = slot.result.take()?;
        slot.requested = false;
        Some(result)
    }

    /// Cancel the current request. A later answer for it is ignored.
    pub fn abandon(&self) {
        let mut slot = self.slot.borrow_mut();
        if slot.requested || slot.result.is_some() {
            debug!(generation = slot.generation, "Authorization request abandoned");
        }
        slot.requested = false;
        slot.result = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// `true` when the last decision was a local denial because the bridge
    /// could not be reached, rather than an answer from the authority.
    pub fn link_unavailable(&self) -> bool {
        self.slot.borrow().link_unavailable
    }

    /// Text of an unrecognized reply seen for the current request.
    pub fn anomaly(&self) -> Option<String> {
        self.slot.borrow().anomaly.clone()
    }

    pub fn snapshot(&self) -> PendingAuth {
        let slot = self.slot.borrow();
        PendingAuth {
            requested: slot.requested,
            generation: slot.generation,
            subject: slot.subject.clone(),
            requested_at: slot.requested_at,
            result: slot.result,
        }
    }
}

/// The auth link's half.
#[derive(Debug)]
pub struct AuthResponder {
    slot: Rc<RefCell<Slot>>,
}

impl AuthResponder {
    /// The outstanding request, if one is waiting for a decision.
    pub fn pending_request(&self) -> Option<PendingRequest> {
        let slot = self.slot.borrow();
        if !slot.requested || slot.result.is_some() {
            return None;
        }
        Some(PendingRequest {
            generation: slot.generation,
            subject: slot.subject.clone()?,
            requested_at: slot.requested_at?,
        })
    }

    /// Publish a decision for `generation`. Returns `false` if that request
    /// is no longer current.
    pub fn resolve(&self, generation: u64, decision: Decision) -> bool {
        let mut slot = self.slot.borrow_mut();
        if !slot.requested || slot.generation != generation || slot.result.is_some() {
            debug!(generation, current = slot.generation, "Stale authorization decision dropped");
            return false;
        }
        slot.result = Some(decision);
        true
    }

    /// Deny `generation` locally because the bridge is unreachable.
    pub fn deny_unreachable(&self, generation: u64) -> bool {
        if !self.resolve(generation, Decision::Denied) {
            return false;
        }
        self.slot.borrow_mut().link_unavailable = true;
        true
    }

    /// Record an unrecognized reply against `generation`.
    pub fn note_anomaly(&self, generation: u64, text: &str) -> bool {
        let mut slot = self.slot.borrow_mut();
        if !slot.requested || slot.generation != generation {
            return false;
        }
        slot.anomaly = Some(text.to_string());
        true
    }
}
