//! The smart locker controller.
//!
//! Four cooperating state machines under one tick scheduler:
//!
//! - [`SecurityMonitor`]: debounced door and item sensing, the only writer of
//!   [`SecurityState`].
//! - [`TransactionController`]: borrow and return flows, the lock, and the
//!   transaction log.
//! - [`AuthLink`]: the exchange with the remote authority over a
//!   [`LinkTransport`], with offline fallback.
//! - [`FeedbackCoordinator`]: LCD text, indicator and buzzer.
//!
//! [`Locker`] wires them together; [`LockerBuilder`] assembles one from a
//! [`LockerConfig`](locker_core::LockerConfig), a set of
//! [`Peripherals`](locker_hardware::Peripherals), a transport and a
//! [`Clock`].

pub mod auth_link;
pub mod clock;
pub mod feedback;
pub mod locker;
pub mod pending;
pub mod security;
pub mod session;
pub mod state_machine;
pub mod status_display;
pub mod transaction;
pub mod transport;

pub use auth_link::{AuthLink, LinkState};
pub use clock::{Clock, ManualClock, SystemClock, TickTime};
pub use feedback::{FeedbackCoordinator, FeedbackDevices, FeedbackInput, Notice};
pub use locker::{Locker, LockerBuilder, TickReport};
pub use pending::{AuthRequester, AuthResponder, PendingAuth, PendingRequest, pending_auth};
pub use security::{RawSample, SecurityChange, SecurityMonitor, SecuritySnapshot, SecurityState};
pub use session::SessionContext;
pub use state_machine::{StateMachine, StateMachineBuilder, StateTransition, TransactionState};
pub use status_display::{Alignment, StatusDisplay, align_text, truncate_text};
pub use transaction::{ControllerOutputs, ControllerView, Evaluation, TransactionController};
pub use transport::{LinkError, LinkTransport, MockBridgeHandle, MockTransport};
