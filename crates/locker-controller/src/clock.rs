//! Time sources for the tick scheduler.
//!
//! The scheduler reads the clock once per tick and hands the resulting
//! [`TickTime`] to every component, so all comparisons inside one tick see
//! the same instant.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use locker_core::Timestamp;

/// The instant a tick runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    /// Monotonic time, used for every timeout.
    pub now: Timestamp,

    /// Wall-clock time, used only to stamp log records.
    pub wall: DateTime<Utc>,
}

/// A source of monotonic and wall-clock time.
pub trait Clock {
    fn now(&self) -> Timestamp;

    fn wall_time(&self) -> DateTime<Utc>;

    /// Read both clocks for one tick.
    fn tick_time(&self) -> TickTime {
        TickTime {
            now: self.now(),
            wall: self.wall_time(),
        }
    }
}

/// Real time: monotonic milliseconds since construction plus UTC wall time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis(millis)
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations.
///
/// Clones share the same time, so a test keeps one clone and hands another
/// to the locker.
///
/// ```
/// use locker_controller::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let shared = clock.clone();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(shared.now().as_millis(), 250);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Start at zero with the wall clock pinned to the Unix epoch.
    pub fn new() -> Self {
        Self::with_epoch(DateTime::<Utc>::default())
    }

    /// Start at zero with wall time `epoch`.
    pub fn with_epoch(epoch: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(millis, Ordering::Relaxed);
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_millis(), Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::Relaxed))
    }

    fn wall_time(&self) -> DateTime<Utc> {
        let offset = i64::try_from(self.millis.load(Ordering::Relaxed)).unwrap_or(i64::MAX);
        self.epoch + chrono::Duration::milliseconds(offset)
    }
}
