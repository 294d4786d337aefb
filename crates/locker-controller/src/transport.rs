//! The byte pipe under the auth link.
//!
//! [`LinkTransport`] is everything [`AuthLink`](crate::AuthLink) needs from a
//! connection to the host bridge. Every call returns immediately; a connect
//! is started with [`begin_connect`](LinkTransport::begin_connect) and then
//! observed through [`is_connected`](LinkTransport::is_connected) on later
//! ticks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Failures reported by a [`LinkTransport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Link is not connected")]
    NotConnected,

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Link closed by peer")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport backlog full")]
    Backlog,
}

/// Non-blocking, line-oriented connection to the bridge.
pub trait LinkTransport {
    /// Start connecting. Returns once the attempt is under way.
    fn begin_connect(&mut self) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;

    /// Queue one line for sending, without terminator.
    fn send_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Next complete received line, if any.
    fn poll_line(&mut self) -> Result<Option<String>, LinkError>;

    fn disconnect(&mut self);
}

impl<T: LinkTransport + ?Sized> LinkTransport for Box<T> {
    fn begin_connect(&mut self) -> Result<(), LinkError> {
        (**self).begin_connect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        (**self).send_line(line)
    }

    fn poll_line(&mut self) -> Result<Option<String>, LinkError> {
        (**self).poll_line()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}

#[derive(Debug)]
struct MockLink {
    reachable: bool,
    connected: bool,
    connect_attempts: usize,
    fail_sends: bool,
    sent: Vec<String>,
    incoming: VecDeque<String>,
}

/// In-memory transport for tests and the console emulator.
///
/// Connecting succeeds immediately while the bridge is "reachable" and
/// never completes otherwise.
///
/// # Examples
///
/// ```
/// use locker_controller::{LinkTransport, MockTransport};
///
/// let (mut transport, bridge) = MockTransport::new();
/// transport.begin_connect().unwrap();
/// transport.send_line("BORROW,12345678").unwrap();
/// bridge.push_reply("OK");
///
/// assert_eq!(bridge.sent_lines(), ["BORROW,12345678"]);
/// assert_eq!(transport.poll_line().unwrap().as_deref(), Some("OK"));
/// ```
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<MockLink>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockBridgeHandle) {
        let shared = Arc::new(Mutex::new(MockLink {
            reachable: true,
            connected: false,
            connect_attempts: 0,
            fail_sends: false,
            sent: Vec::new(),
            incoming: VecDeque::new(),
        }));

        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockBridgeHandle { shared },
        )
    }

    fn link(&self) -> MutexGuard<'_, MockLink> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LinkTransport for MockTransport {
    fn begin_connect(&mut self) -> Result<(), LinkError> {
        let mut link = self.link();
        link.connect_attempts += 1;
        if link.reachable {
            link.connected = true;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link().connected
    }

    fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        let mut link = self.link();
        if !link.connected {
            return Err(LinkError::NotConnected);
        }
        if link.fail_sends {
            return Err(LinkError::SendFailed("mock send failure".to_string()));
        }
        link.sent.push(line.to_string());
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, LinkError> {
        let mut link = self.link();
        if !link.connected {
            return Ok(None);
        }
        Ok(link.incoming.pop_front())
    }

    fn disconnect(&mut self) {
        let mut link = self.link();
        link.connected = false;
        // Lines still in flight die with the connection.
        link.incoming.clear();
    }
}

/// The bridge side of a [`MockTransport`]. Cloneable.
#[derive(Debug, Clone)]
pub struct MockBridgeHandle {
    shared: Arc<Mutex<MockLink>>,
}

impl MockBridgeHandle {
    fn link(&self) -> MutexGuard<'_, MockLink> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the bridge (un)reachable. Going unreachable drops the
    /// current connection.
    pub fn set_reachable(&self, reachable: bool) {
        let mut link = self.link();
        link.reachable = reachable;
        if !reachable {
            link.connected = false;
        }
    }

    /// Queue a reply line for the locker to read.
    pub fn push_reply(&self, line: impl Into<String>) {
        self.link().incoming.push_back(line.into());
    }

    /// Make every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.link().fail_sends = fail;
    }

    pub fn is_connected(&self) -> bool {
        self.link().connected
    }

    pub fn connect_attempts(&self) -> usize {
        self.link().connect_attempts
    }

    /// Every line sent so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.link().sent.clone()
    }

    /// Drain the lines sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.link().sent)
    }
}
