//! Remote authorization link.
//!
//! [`AuthLink`] owns the exchange with the host bridge. It answers the
//! controller's [`PendingAuth`](crate::PendingAuth) request, relays the
//! controller's outbound [`Directive`]s, and tracks whether the bridge is
//! reachable at all.
//!
//! ```text
//! Idle ──link down──> Connecting ──link up──> SendingRequest ──sent──> AwaitingResponse
//!  ^                    │                         │                        │
//!  │                    │ window expired          │ send failed            │ reply
//!  │                    v                         v                        v
//!  │                 Offline <──── Idle <──── Error                   Processing
//!  └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While `Offline` every borrow request is denied locally and outbound
//! directives are held in a bounded queue until a periodic reconnect
//! succeeds, at which point they are flushed in order.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use locker_core::{LinkSettings, TimingConfig, Timestamp};
use locker_protocol::{Decision, Directive, Reply};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::pending::AuthResponder;
use crate::transport::{LinkError, LinkTransport};

/// Upper bound on state steps taken in one evaluation.
const MAX_STEPS_PER_TICK: usize = 8;

/// State of the authorization link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Idle,
    Connecting,
    SendingRequest,
    AwaitingResponse,
    Processing,
    Offline,
    Error,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Idle => "Idle",
            LinkState::Connecting => "Connecting",
            LinkState::SendingRequest => "SendingRequest",
            LinkState::AwaitingResponse => "AwaitingResponse",
            LinkState::Processing => "Processing",
            LinkState::Offline => "Offline",
            LinkState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// A reply line the bridge still owes, in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Acknowledgement of a `RETURN`; content is irrelevant.
    Ack,
    /// Decision for the borrow request of this generation.
    Decision(u64),
}

/// The authorization link state machine.
pub struct AuthLink {
    transport: Box<dyn LinkTransport>,
    responder: AuthResponder,
    outbox: mpsc::Receiver<Directive>,
    queue: VecDeque<Directive>,
    queue_capacity: usize,
    expected: VecDeque<Expect>,
    state: LinkState,
    entered_at: Timestamp,
    available: bool,
    in_flight: Option<u64>,
    in_flight_since: Timestamp,
    received: Option<(u64, Decision)>,
    last_connect_attempt: Timestamp,
    connect_window: Duration,
    auth_timeout: Duration,
    reconnect_interval: Duration,
}

impl AuthLink {
    pub fn new(
        transport: Box<dyn LinkTransport>,
        responder: AuthResponder,
        outbox: mpsc::Receiver<Directive>,
        timing: &TimingConfig,
        settings: &LinkSettings,
        now: Timestamp,
    ) -> Self {
        Self {
            transport,
            responder,
            outbox,
            queue: VecDeque::with_capacity(settings.queue_capacity),
            queue_capacity: settings.queue_capacity,
            expected: VecDeque::new(),
            state: LinkState::Idle,
            entered_at: now,
            available: true,
            in_flight: None,
            in_flight_since: now,
            received: None,
            last_connect_attempt: now,
            connect_window: timing.connect_window(),
            auth_timeout: timing.auth_timeout(),
            reconnect_interval: timing.reconnect_interval(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// `false` once the bridge has been found unreachable, until the next
    /// successful connect.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Directives held for the next connection.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Run one evaluation: take new directives from the outbox, read any
    /// replies, then step the state machine until it settles.
    pub fn evaluate(&mut self, now: Timestamp) -> LinkState {
        self.drain_outbox(now);
        self.read_replies(now);

        for _ in 0..MAX_STEPS_PER_TICK {
            match self.step(now) {
                Some(next) if next != self.state => self.enter(next, now),
                _ => break,
            }
        }

        self.state
    }

    fn step(&mut self, now: Timestamp) -> Option<LinkState> {
        match self.state {
            LinkState::Idle => {
                if !self.available {
                    return Some(LinkState::Offline);
                }

                if !self.transport.is_connected() {
                    return Some(self.start_connect(now));
                }
                if !self.queue.is_empty() && self.flush_queue().is_err() {
                    return Some(LinkState::Error);
                }
                self.responder
                    .pending_request()
                    .is_some()
                    .then_some(LinkState::SendingRequest)
            }

            LinkState::Connecting => {
                if self.transport.is_connected() {
                    info!("Link to bridge is up");
                    self.available = true;
                    if self.flush_queue().is_err() {
                        return Some(LinkState::Error);
                    }
                    if self.responder.pending_request().is_some() {
                        Some(LinkState::SendingRequest)
                    } else {
                        Some(LinkState::Idle)
                    }
                } else if now.has_elapsed(self.entered_at, self.connect_window) {
                    warn!("Connect attempt timed out after {}ms", self.connect_window.as_millis());
                    self.transport.disconnect();
                    Some(LinkState::Offline)
                } else {
                    None
                }
            }

            LinkState::SendingRequest => {
                let Some(request) = self.responder.pending_request() else {
                    return Some(LinkState::Idle);
                };

                let directive = Directive::Borrow(request.subject);
                match self.transport.send_line(&directive.to_line()) {
                    Ok(()) => {
                        debug!(generation = request.generation, "Authorization request sent");
                        self.expected.push_back(Expect::Decision(request.generation));
                        self.in_flight = Some(request.generation);
                        self.in_flight_since = request.requested_at;
                        Some(LinkState::AwaitingResponse)
                    }
                    Err(e) => {
                        error!("Failed to send authorization request: {}", e);
                        Some(LinkState::Error)
                    }
                }
            }

            LinkState::AwaitingResponse => {
                if self.received.is_some() {
                    return Some(LinkState::Processing);
                }

                let current = self.responder.pending_request().map(|r| r.generation);
                if current.is_none() || current != self.in_flight {
                    let generation = self.in_flight.take();
                    self.transport.disconnect();
                    if now.has_elapsed(self.in_flight_since, self.auth_timeout) {
                        warn!("No reply from bridge within {}ms", self.auth_timeout.as_millis());
                        return Some(LinkState::Offline);
                    }
                    // A late reply would be read as the answer to the next request.
                    debug!(?generation, "Request abandoned, resetting bridge connection");
                    self.expected.clear();
                    return Some(LinkState::Idle);
                }

                if !self.transport.is_connected() {
                    warn!("Link dropped while awaiting authorization");
                    Some(LinkState::Error)
                } else if now.has_elapsed(self.entered_at, self.auth_timeout) {
                    warn!("No reply from bridge within {}ms", self.auth_timeout.as_millis());
                    self.transport.disconnect();
                    Some(LinkState::Offline)
                } else {
                    None
                }
            }

            LinkState::Processing => {
                if let Some((generation, decision)) = self.received.take() {
                    if self.responder.resolve(generation, decision) {
                        info!(generation, %decision, "Authorization answered");
                    }
                }
                self.in_flight = None;
                Some(LinkState::Idle)
            }

            LinkState::Error => {
                self.transport.disconnect();
                self.deny_locally("link error");
                self.available = false;
                Some(LinkState::Idle)
            }

            LinkState::Offline => {
                self.deny_locally("link offline");
                if now.has_elapsed(self.last_connect_attempt, self.reconnect_interval) {
                    debug!("Attempting reconnect to bridge");
                    Some(self.start_connect(now))
                } else {
                    None
                }
            }
        }
    }

    fn enter(&mut self, next: LinkState, now: Timestamp) {
        info!(from = %self.state, to = %next, "Link state changed");

        match next {
            LinkState::Offline | LinkState::Error => {
                self.available = false;
                self.expected.clear();
                self.in_flight = None;
                self.received = None;
            }
            _ => {}
        }

        if next == LinkState::Offline {
            self.last_connect_attempt = now;
        }

        self.state = next;
        self.entered_at = now;
    }

    fn start_connect(&mut self, now: Timestamp) -> LinkState {
        self.last_connect_attempt = now;
        match self.transport.begin_connect() {
            Ok(()) => LinkState::Connecting,
            Err(e) => {
                warn!("Failed to start connect: {}", e);
                LinkState::Offline
            }
        }
    }

    fn deny_locally(&mut self, reason: &str) {
        if let Some(request) = self.responder.pending_request() {
            if self.responder.deny_unreachable(request.generation) {
                warn!(subject = %request.subject, reason, "Borrow denied locally");
            }
        }
    }

    fn drain_outbox(&mut self, now: Timestamp) {
        while let Ok(directive) = self.outbox.try_recv() {
            let usable = self.available
                && self.queue.is_empty()
                && self.state != LinkState::Connecting
                && self.transport.is_connected();

            if !usable {
                self.enqueue(directive);
                continue;
            }

            if let Err(e) = self.send_directive(&directive) {
                error!("Failed to send {}: {}", directive, e);
                self.queue.push_front(directive);
                if self.state != LinkState::Error {
                    self.enter(LinkState::Error, now);
                }
            }
        }
    }

    fn enqueue(&mut self, directive: Directive) {
        if self.queue_capacity == 0 {
            warn!("Dropping {}: offline queue disabled", directive);
            return;
        }
        if self.queue.len() >= self.queue_capacity {
            if let Some(dropped) = self.queue.pop_front() {
                warn!("Offline queue full, dropping oldest directive {}", dropped);
            }
        }
        debug!(queued = self.queue.len() + 1, "Directive queued: {}", directive);
        self.queue.push_back(directive);
    }

    fn flush_queue(&mut self) -> Result<(), LinkError> {
        if !self.queue.is_empty() {
            info!("Flushing {} queued directive(s)", self.queue.len());
        }

        while let Some(directive) = self.queue.pop_front() {
            if let Err(e) = self.send_directive(&directive) {
                error!("Failed to flush {}: {}", directive, e);
                self.queue.push_front(directive);
                return Err(e);
            }
        }
        Ok(())
    }

    fn send_directive(&mut self, directive: &Directive) -> Result<(), LinkError> {
        self.transport.send_line(&directive.to_line())?;
        if let Directive::Return(_) = directive {
            self.expected.push_back(Expect::Ack);
        }
        debug!("Sent {}", directive);
        Ok(())
    }

    fn read_replies(&mut self, now: Timestamp) {
        if !self.transport.is_connected() {
            return;
        }

        loop {
            match self.transport.poll_line() {
                Ok(Some(line)) => self.handle_reply(&line),
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read from bridge: {}", e);
                    if self.state != LinkState::Error {
                        self.enter(LinkState::Error, now);
                    }
                    break;
                }
            }
        }
    }

    fn handle_reply(&mut self, line: &str) {
        let reply = Reply::classify(line);

        match self.expected.pop_front() {
            Some(Expect::Ack) => debug!("Return acknowledged: {}", reply),
            Some(Expect::Decision(generation)) => match reply {
                Reply::Unrecognized(text) => {
                    warn!(generation, "Unrecognized reply from bridge: {:?}", text);
                    self.responder.note_anomaly(generation, &text);
                    self.expected.push_front(Expect::Decision(generation));
                }
                reply => {
                    let Some(decision) = reply.decision() else {
                        return;
                    };
                    if self.state == LinkState::AwaitingResponse && self.in_flight == Some(generation) {
                        self.received = Some((generation, decision));
                    } else {
                        debug!(generation, "Stale reply discarded: {}", decision);
                    }
                }
            },
            None => debug!("Unsolicited reply discarded: {:?}", line),
        }
    }
}

impl fmt::Debug for AuthLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLink")
            .field("state", &self.state)
            .field("available", &self.available)
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
