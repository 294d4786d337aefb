//! Line-oriented wire protocol between the locker and its host bridge.
//!
//! Every exchange is one ASCII line terminated by `\n`:
//!
//! - [`Directive`]: what the locker sends (`BORROW,<id>`, `RETURN,<id>`, log records).
//! - [`Reply`]: the bridge's answer, normalized into a closed enum.
//! - [`TransactionLogRecord`]: the `KIND,<id>,<timestamp>` audit line.
//! - [`LineCodec`]: tokio-util framing for all of the above.

pub mod codec;
pub mod directive;
pub mod record;
pub mod reply;

pub use codec::LineCodec;
pub use directive::Directive;
pub use record::{LogKind, TransactionLogRecord};
pub use reply::{Decision, Reply};
