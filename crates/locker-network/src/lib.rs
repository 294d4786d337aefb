//! Network side of the locker/bridge link.
//!
//! The host bridge is reached over TCP with newline-framed lines
//! ([`LineCodec`](locker_protocol::LineCodec)).
//!
//! # Components
//!
//! - **BridgeClient**: async connect/send/recv/close with timeouts
//! - **ChannelTransport**: the locker-facing, non-blocking
//!   [`LinkTransport`](locker_controller::LinkTransport) backed by a
//!   bridge task started with [`spawn_bridge`]
//!
//! # Example
//!
//! ```no_run
//! use locker_controller::LinkTransport;
//! use locker_network::{BridgeClientConfig, spawn_bridge};
//!
//! # async fn example() {
//! let (mut transport, _task) = spawn_bridge(BridgeClientConfig::default(), 64);
//! transport.begin_connect().unwrap();
//! // ... later, from the tick loop:
//! if transport.is_connected() {
//!     transport.send_line("BORROW,12345678").unwrap();
//! }
//! # }
//! ```

mod client;
mod transport;

pub use client::{BridgeClient, BridgeClientConfig, BridgeError};
pub use transport::{ChannelTransport, spawn_bridge};
