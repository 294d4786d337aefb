//! TCP client for the host bridge.
//!
//! A thin async wrapper around a `Framed<TcpStream, LineCodec>`: connect,
//! send a line, receive a line, close. Every operation is bounded by the
//! configured timeout. Retry and offline handling live in the locker's
//! auth link, not here.
//!
//! # Example
//!
//! ```no_run
//! use locker_network::{BridgeClient, BridgeClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = BridgeClient::new(BridgeClientConfig {
//!     bridge_addr: "127.0.0.1:7878".to_string(),
//!     timeout: Duration::from_millis(2000),
//! });
//!
//! client.connect().await?;
//! client.send_line("BORROW,12345678").await?;
//! let reply = client.recv().await?;
//! println!("bridge replied {reply}");
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use locker_core::constants::DEFAULT_BRIDGE_ADDR;
use locker_core::{LinkSettings, TimingConfig};
use locker_protocol::LineCodec;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

/// Time allowed for each step of a graceful close.
const CLOSE_STEP_TIMEOUT: Duration = Duration::from_millis(500);

/// Where the bridge is and how long to wait on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeClientConfig {
    /// `host:port` of the bridge.
    pub bridge_addr: String,

    /// Timeout for connect, send and receive.
    pub timeout: Duration,
}

impl BridgeClientConfig {
    /// Address from the link settings, timeout from the connect window.
    pub fn from_settings(link: &LinkSettings, timing: &TimingConfig) -> Self {
        Self {
            bridge_addr: link.bridge_addr.clone(),
            timeout: timing.connect_window(),
        }
    }
}

impl Default for BridgeClientConfig {
    fn default() -> Self {
        Self {
            bridge_addr: DEFAULT_BRIDGE_ADDR.to_string(),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Errors from talking to the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Not connected to bridge")]
    NotConnected,

    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Framing failure from the line codec.
    #[error("Protocol error: {0}")]
    Protocol(#[from] locker_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One connection to the host bridge.
pub struct BridgeClient {
    bridge_addr: String,
    framed: Option<Framed<TcpStream, LineCodec>>,
    timeout: Duration,
}

impl BridgeClient {
    /// Create a client. It does not connect until [`connect`](Self::connect).
    ///
    /// ```
    /// use locker_network::{BridgeClient, BridgeClientConfig};
    ///
    /// let client = BridgeClient::new(BridgeClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: BridgeClientConfig) -> Self {
        debug!("Creating bridge client for {}", config.bridge_addr);

        Self {
            bridge_addr: config.bridge_addr,
            framed: None,
            timeout: config.timeout,
        }
    }

    pub fn bridge_addr(&self) -> &str {
        &self.bridge_addr
    }

    /// Open the TCP connection, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionTimeout` if the bridge does not accept within the
    /// timeout, or `Io` if the connection is refused or the address does not
    /// resolve.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.framed.is_some() {
            self.close().await?;
        }

        info!("Connecting to bridge at {}", self.bridge_addr);

        let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(self.bridge_addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Connection to {} failed: {}", self.bridge_addr, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", self.timeout.as_millis());
                return Err(BridgeError::ConnectionTimeout(millis(self.timeout)));
            }
        };

        // Short request/reply lines, send immediately.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(stream, LineCodec::new()));
        info!("Connected to bridge at {}", self.bridge_addr);
        Ok(())
    }

    /// Send one line. The codec appends the terminator.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected`, `WriteTimeout`, or `Protocol` if the line
    /// cannot be framed.
    pub async fn send_line(&mut self, line: &str) -> Result<(), BridgeError> {
        let framed = self.framed.as_mut().ok_or(BridgeError::NotConnected)?;
        trace!(line, "Sending line to bridge");

        match tokio::time::timeout(self.timeout, framed.send(line.to_string())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Failed to send line: {}", e);
                Err(BridgeError::Protocol(e))
            }
            Err(_) => {
                warn!("Send timeout after {}ms", self.timeout.as_millis());
                Err(BridgeError::WriteTimeout(millis(self.timeout)))
            }
        }
    }

    /// Wait for the next line, bounded by the timeout.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` if nothing arrives in time, plus everything
    /// [`next_line`](Self::next_line) returns.
    pub async fn recv(&mut self) -> Result<String, BridgeError> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.next_line()).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::ReadTimeout(millis(timeout))),
        }
    }

    /// Wait for the next line with no timeout. Cancel safe.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected`, `ConnectionLost` when the bridge closes the
    /// connection, or `Protocol` on a framing error.
    pub async fn next_line(&mut self) -> Result<String, BridgeError> {
        let framed = self.framed.as_mut().ok_or(BridgeError::NotConnected)?;

        match framed.next().await {
            Some(Ok(line)) => {
                trace!(line = %line, "Received line from bridge");
                Ok(line)
            }
            Some(Err(e)) => {
                error!("Failed to decode line: {}", e);
                Err(BridgeError::Protocol(e))
            }
            None => {
                warn!("Connection closed by bridge");
                Err(BridgeError::ConnectionLost("bridge closed connection".to_string()))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Flush and shut the connection down. Idempotent.
    ///
    /// # Errors
    ///
    /// Never fails at present; flush and shutdown problems are logged and the
    /// connection is dropped regardless.
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        let Some(mut framed) = self.framed.take() else {
            return Ok(());
        };
        info!("Closing connection to {}", self.bridge_addr);

        match tokio::time::timeout(CLOSE_STEP_TIMEOUT, SinkExt::<String>::flush(&mut framed)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error flushing during close: {}", e),
            Err(_) => warn!("Flush timeout during close ({}ms)", CLOSE_STEP_TIMEOUT.as_millis()),
        }

        let mut stream = framed.into_inner();
        match tokio::time::timeout(CLOSE_STEP_TIMEOUT, stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error during shutdown: {}", e),
            Err(_) => warn!("Shutdown timeout during close ({}ms)", CLOSE_STEP_TIMEOUT.as_millis()),
        }

        debug!("Connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("bridge_addr", &self.bridge_addr)
            .field("connected", &self.is_connected())
            .field("timeout", &self.timeout)
            .finish()
    }
}
