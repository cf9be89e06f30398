//! Frame budgets
//!
//! Cooperative work (resource preparation, object construction) runs in small
//! units and checks a [`FrameBudget`] between them. The budget reads time from
//! a [`Clock`], so tests can drive it with a [`ManualClock`] instead of real
//! time.
//!
//! ```ignore
//! let budget = FrameBudget::from_millis(&clock, 50);
//! loop {
//!     do_one_unit();
//!     if budget.exhausted() {
//!         break;
//!     }
//! }
//! ```

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::time::Instant;

/// Source of monotonic time
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: Duration) {
        self.nanos.store(to.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// A time limit measured from the moment the budget was started
#[derive(Clone, Copy)]
pub struct FrameBudget<'c> {
    clock: &'c dyn Clock,
    start: Duration,
    limit: Duration,
}

impl<'c> FrameBudget<'c> {
    /// Start a budget of `limit` on `clock`
    pub fn new(clock: &'c dyn Clock, limit: Duration) -> Self {
        Self {
            clock,
            start: clock.now(),
            limit,
        }
    }

    /// Start a budget of `millis` milliseconds
    pub fn from_millis(clock: &'c dyn Clock, millis: u64) -> Self {
        Self::new(clock, Duration::from_millis(millis))
    }

    /// Budget that is exhausted after the first unit of work
    pub fn zero(clock: &'c dyn Clock) -> Self {
        Self::new(clock, Duration::ZERO)
    }

    /// Budget that never runs out
    pub fn unlimited(clock: &'c dyn Clock) -> Self {
        Self::new(clock, Duration::MAX)
    }

    /// The configured limit
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Time spent since the budget started
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.start)
    }

    /// Time left before the limit is reached
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    /// Whether the limit has been reached
    pub fn exhausted(&self) -> bool {
        self.elapsed() >= self.limit
    }
}

impl core::fmt::Debug for FrameBudget<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBudget")
            .field("start", &self.start)
            .field("limit", &self.limit)
            .finish()
    }
}
