//! Locker transaction state machine.
//!
//! This module holds the transaction states, the table of legal
//! transitions between them and a [`StateMachine`] that enforces the table
//! and keeps a bounded transition history.
//!
//! # Valid Transitions
//!
//! - IdleAvailable → AwaitingId → Authenticating → BorrowAuthorized → BorrowInProgress
//!   → BorrowCompleting → IdleOccupied (or back to IdleAvailable if the item is put back)
//! - IdleOccupied → ReturnInProgress → ReturnCompleting → IdleAvailable (or back to IdleOccupied)
//! - Timeouts and denials fall back to the idle state the transaction started from
//! - Any state but Maintenance → ErrorState on a sensor fault
//! - Idle states and ErrorState → Maintenance → re-derived idle state
//!
//! # Examples
//!
//! ```
//! use locker_controller::{StateMachine, TransactionState};
//! use locker_core::Timestamp;
//!
//! let mut machine = StateMachine::new(TransactionState::IdleAvailable, Timestamp::ZERO);
//!
//! machine
//!     .transition_to(TransactionState::AwaitingId, Timestamp::from_millis(40))
//!     .unwrap();
//! assert_eq!(machine.current_state(), TransactionState::AwaitingId);
//!
//! // Skipping authentication is rejected.
//! let result = machine.transition_to(TransactionState::BorrowAuthorized, Timestamp::from_millis(60));
//! assert!(result.is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use locker_core::{Error, Result, Timestamp};

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

/// Every phase of a locker transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Locked, item in the compartment, ready to lend.
    IdleAvailable,

    /// Locked, item out on loan, ready to accept a return.
    IdleOccupied,

    /// Collecting the subject identifier from the keypad.
    AwaitingId,

    /// Waiting for the remote authority.
    Authenticating,

    /// Granted; the lock is released on the next evaluation.
    BorrowAuthorized,

    /// Unlocked, waiting for the door to open and the item to leave.
    BorrowInProgress,

    /// Item taken, waiting for the door to close.
    BorrowCompleting,

    /// Unlocked for a return, waiting for the door to open and the item to arrive.
    ReturnInProgress,

    /// Item placed, waiting for the door to close.
    ReturnCompleting,

    /// Hard fault; only maintenance clears it.
    ErrorState,

    /// Operator mode with direct lock control.
    Maintenance,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            TransactionState::IdleAvailable => "IdleAvailable",
            TransactionState::IdleOccupied => "IdleOccupied",
            TransactionState::AwaitingId => "AwaitingId",
            TransactionState::Authenticating => "Authenticating",
            TransactionState::BorrowAuthorized => "BorrowAuthorized",
            TransactionState::BorrowInProgress => "BorrowInProgress",
            TransactionState::BorrowCompleting => "BorrowCompleting",
            TransactionState::ReturnInProgress => "ReturnInProgress",
            TransactionState::ReturnCompleting => "ReturnCompleting",
            TransactionState::ErrorState => "ErrorState",
            TransactionState::Maintenance => "Maintenance",
        };
        write!(f, "{}", state_str)
    }
}

impl TransactionState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker_controller::TransactionState;
    ///
    /// assert!(TransactionState::IdleOccupied.can_transition_to(&TransactionState::ReturnInProgress));
    /// assert!(!TransactionState::IdleOccupied.can_transition_to(&TransactionState::AwaitingId));
    /// assert!(!TransactionState::Maintenance.can_transition_to(&TransactionState::Maintenance));
    /// ```
    pub fn can_transition_to(&self, target: &TransactionState) -> bool {
        use TransactionState::*;

        // A fault may interrupt any state.
        if *target == ErrorState {
            return !matches!(self, ErrorState);
        }

        matches!(
            (self, target),
            (IdleAvailable, AwaitingId | IdleOccupied | Maintenance)
                | (IdleOccupied, ReturnInProgress | IdleAvailable | Maintenance)
                | (AwaitingId, Authenticating | IdleAvailable)
                | (Authenticating, BorrowAuthorized | IdleAvailable)
                | (BorrowAuthorized, BorrowInProgress)
                | (BorrowInProgress, BorrowCompleting | IdleAvailable)
                | (BorrowCompleting, IdleOccupied | IdleAvailable)
                | (ReturnInProgress, ReturnCompleting | IdleOccupied)
                | (ReturnCompleting, IdleAvailable | IdleOccupied)
                | (ErrorState, Maintenance)
                | (Maintenance, IdleAvailable | IdleOccupied)
        )
    }

    /// Idle states are the only ones in which an open door is unauthorized.
    pub fn is_idle(&self) -> bool {
        matches!(self, TransactionState::IdleAvailable | TransactionState::IdleOccupied)
    }

    /// States in which the controller has released the lock for a transaction.
    pub fn is_lock_open(&self) -> bool {
        matches!(
            self,
            TransactionState::BorrowInProgress
                | TransactionState::BorrowCompleting
                | TransactionState::ReturnInProgress
                | TransactionState::ReturnCompleting
        )
    }
}

/// Represents a single state transition with timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state transitioned from.
    pub from: TransactionState,

    /// The state transitioned to.
    pub to: TransactionState,

    /// When the transition occurred.
    pub at: Timestamp,
}

impl StateTransition {
    pub fn new(from: TransactionState, to: TransactionState, at: Timestamp) -> Self {
        Self { from, to, at }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} @ {}", self.from, self.to, self.at)
    }
}

/// Validating state holder with bounded history.
///
/// The machine never reads a clock; every call that depends on time takes
/// the current tick's timestamp.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Current state.
    current_state: TransactionState,

    /// When the current state was entered.
    state_entered_at: Timestamp,

    /// History of state transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,

    /// Optional dwell limit for the current state.
    current_timeout: Option<Duration>,
}

impl StateMachine {
    /// Create a machine in `initial` entered at `now`.
    pub fn new(initial: TransactionState, now: Timestamp) -> Self {
        Self {
            current_state: initial,
            state_entered_at: now,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            current_timeout: None,
        }
    }

    /// Create a builder for restoring a machine with a given state and history.
    ///
    /// # Examples
    ///
    /// ```
    /// use locker_controller::{StateMachine, TransactionState};
    /// use locker_core::Timestamp;
    /// use std::time::Duration;
    ///
    /// let machine = StateMachine::builder()
    ///     .with_initial_state(TransactionState::BorrowInProgress)
    ///     .with_entered_at(Timestamp::from_millis(1_000))
    ///     .with_timeout(Duration::from_secs(30))
    ///     .build();
    ///
    /// assert!(!machine.has_timed_out(Timestamp::from_millis(30_999)));
    /// assert!(machine.has_timed_out(Timestamp::from_millis(31_000)));
    /// ```
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::default()
    }

    pub fn current_state(&self) -> TransactionState {
        self.current_state
    }

    /// When the current state was entered.
    pub fn entered_at(&self) -> Timestamp {
        self.state_entered_at
    }

    /// Get the time elapsed in the current state.
    pub fn time_in_current_state(&self, now: Timestamp) -> Duration {
        now.since(self.state_entered_at)
    }

    /// Returns `true` if a timeout is set and has been reached.
    pub fn has_timed_out(&self, now: Timestamp) -> bool {
        self.current_timeout
            .is_some_and(|timeout| self.time_in_current_state(now) >= timeout)
    }

    /// Remaining time before timeout, `None` without a timeout or once reached.
    pub fn time_remaining(&self, now: Timestamp) -> Option<Duration> {
        self.current_timeout.and_then(|timeout| {
            timeout
                .checked_sub(self.time_in_current_state(now))
                .filter(|remaining| !remaining.is_zero())
        })
    }

    /// Set a dwell limit for the current state. Cleared by the next transition.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.current_timeout = Some(timeout);
    }

    /// Get a reference to the state transition history, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last N state transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// On success the entry time becomes `now`, any timeout is cleared and
    /// the transition is recorded.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the table does not allow
    /// the move; the machine is left untouched.
    pub fn transition_to(&mut self, new_state: TransactionState, now: Timestamp) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state, now);

        self.current_state = new_state;
        self.state_entered_at = now;
        self.current_timeout = None;
        self.add_to_history(transition);

        Ok(transition)
    }

    fn add_to_history(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

/// Builder for constructing `StateMachine` instances with custom configuration.
#[derive(Debug)]
pub struct StateMachineBuilder {
    initial_state: TransactionState,
    entered_at: Timestamp,
    history: VecDeque<StateTransition>,
    timeout: Option<Duration>,
}

impl StateMachineBuilder {
    pub fn with_initial_state(mut self, state: TransactionState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_entered_at(mut self, at: Timestamp) -> Self {
        self.entered_at = at;
        self
    }

    pub fn with_history(mut self, history: VecDeque<StateTransition>) -> Self {
        self.history = history;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> StateMachine {
        let mut history = self.history;
        while history.len() > MAX_HISTORY_SIZE {
            history.pop_front();
        }

        StateMachine {
            current_state: self.initial_state,
            state_entered_at: self.entered_at,
            history,
            current_timeout: self.timeout,
        }
    }
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self {
            initial_state: TransactionState::IdleAvailable,
            entered_at: Timestamp::ZERO,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            timeout: None,
        }
    }
}
