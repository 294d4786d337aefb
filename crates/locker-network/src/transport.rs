//! Bridge client task and its non-blocking handle.
//!
//! The locker's tick never awaits. [`spawn_bridge`] moves a [`BridgeClient`]
//! onto its own tokio task and returns a [`ChannelTransport`], which
//! implements [`LinkTransport`] with `try_send` / `try_recv` on bounded
//! channels and a `watch` for the connection status.
//!
//! ```text
//! Locker tick ──ChannelTransport──(commands)──> bridge task ──TCP──> bridge
//!      ^                                            │
//!      └───────────(lines, status watch)────────────┘
//! ```
//!
//! Every connect request carries a session number. Status updates and
//! received lines are tagged with it, so nothing from an older connection
//! is ever mistaken for the current one.

use locker_controller::{LinkError, LinkTransport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{BridgeClient, BridgeClientConfig, BridgeError};

/// Requests from the tick side to the task.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Connect(u64),
    Send(String),
    Disconnect,
}

/// Spawn the bridge task on the current tokio runtime.
///
/// `capacity` bounds both the command and the received-line channels.
/// The task ends when the returned transport is dropped.
pub fn spawn_bridge(config: BridgeClientConfig, capacity: usize) -> (ChannelTransport, JoinHandle<()>) {
    let capacity = capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (line_tx, line_rx) = mpsc::channel(capacity);
    let (status_tx, status_rx) = watch::channel(None);

    let task = BridgeTask {
        client: BridgeClient::new(config),
        commands: command_rx,
        lines: line_tx,
        status: status_tx,
        session: 0,
    };
    let handle = tokio::spawn(task.run());

    let transport = ChannelTransport {
        commands: command_tx,
        lines: line_rx,
        status: status_rx,
        session: 0,
    };
    (transport, handle)
}

/// Non-blocking [`LinkTransport`] backed by the bridge task.
#[derive(Debug)]
pub struct ChannelTransport {
    commands: mpsc::Sender<Command>,
    lines: mpsc::Receiver<(u64, String)>,
    status: watch::Receiver<Option<u64>>,
    session: u64,
}

impl ChannelTransport {
    fn command(&self, command: Command) -> Result<(), LinkError> {
        self.commands.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LinkError::Backlog,
            mpsc::error::TrySendError::Closed(_) => LinkError::Closed,
        })
    }
}

impl LinkTransport for ChannelTransport {
    fn begin_connect(&mut self) -> Result<(), LinkError> {
        self.session += 1;
        self.command(Command::Connect(self.session))
    }

    fn is_connected(&self) -> bool {
        *self.status.borrow() == Some(self.session)
    }

    fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.command(Command::Send(line.to_string()))
    }

    fn poll_line(&mut self) -> Result<Option<String>, LinkError> {
        loop {
            match self.lines.try_recv() {
                Ok((session, line)) if session == self.session => return Ok(Some(line)),
                Ok((session, line)) => debug!(session, "Dropping line from old session: {:?}", line),
                Err(mpsc::error::TryRecvError::Empty) => return Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(LinkError::Closed),
            }
        }
    }

    fn disconnect(&mut self) {
        // Orphan the current session before the task has acted on it.
        self.session += 1;
        if let Err(e) = self.command(Command::Disconnect) {
            debug!("Disconnect not delivered: {}", e);
        }
    }
}

/// Owns the TCP connection on its own task.
struct BridgeTask {
    client: BridgeClient,
    commands: mpsc::Receiver<Command>,
    lines: mpsc::Sender<(u64, String)>,
    status: watch::Sender<Option<u64>>,
    session: u64,
}

impl BridgeTask {
    async fn run(mut self) {
        info!(bridge = %self.client.bridge_addr(), "Bridge task started");

        loop {
            if self.client.is_connected() {
                tokio::select! {
                    command = self.commands.recv() => match command {
                        Some(command) => self.handle(command).await,
                        None => break,
                    },
                    line = self.client.next_line() => self.deliver(line).await,
                }
            } else {
                match self.commands.recv().await {
                    Some(command) => self.handle(command).await,
                    None => break,
                }
            }
        }

        self.drop_connection().await;
        info!("Bridge task stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect(session) => {
                self.drop_connection().await;
                self.session = session;
                match self.client.connect().await {
                    Ok(()) => {
                        self.status.send_replace(Some(session));
                    }
                    Err(e) => warn!(session, "Bridge connect failed: {}", e),
                }
            }
            Command::Send(line) => {
                if let Err(e) = self.client.send_line(&line).await {
                    warn!("Send to bridge failed: {}", e);
                    self.drop_connection().await;
                }
            }
            Command::Disconnect => self.drop_connection().await,
        }
    }

    async fn deliver(&mut self, line: Result<String, BridgeError>) {
        match line {
            Ok(line) => {
                if self.lines.try_send((self.session, line)).is_err() {
                    warn!("Received-line channel full, reply dropped");
                }
            }
            Err(e) => {
                warn!("Bridge connection ended: {}", e);
                self.drop_connection().await;
            }
        }
    }

    async fn drop_connection(&mut self) {
        self.status.send_replace(None);
        if let Err(e) = self.client.close().await {
            debug!("Close failed: {}", e);
        }
    }
}
