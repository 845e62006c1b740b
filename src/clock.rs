//! Time source abstraction.
//!
//! Both the rate limiter and the expiring cache are pure functions of their
//! internal state plus a millisecond clock, so the clock is injected rather
//! than read from ambient global state. Tests (and downstream crates, via
//! the `testing` feature) substitute [`ManualClock`] for determinism.

use chrono::Utc;

/// A monotonically non-decreasing source of wall-clock time.
///
/// Implementations report milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// The default clock, backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // timestamp_millis is negative only for pre-epoch clocks.
        Utc::now().timestamp_millis().max(0) as u64
    }
}

#[cfg(any(test, feature = "testing"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "testing"))]
mod manual {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// A hand-driven clock for deterministic tests.
    ///
    /// Clones share the same underlying instant, so a clock handed to a
    /// limiter or cache can still be advanced from the test body.
    #[derive(Debug, Clone, Default)]
    pub struct ManualClock {
        now: Arc<AtomicU64>,
    }

    impl ManualClock {
        /// Create a clock frozen at the given millisecond timestamp.
        pub fn new(now_millis: u64) -> Self {
            Self {
                now: Arc::new(AtomicU64::new(now_millis)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, millis: u64) {
            self.now.fetch_add(millis, Ordering::Relaxed);
        }

        /// Jump the clock to an absolute instant.
        pub fn set(&self, now_millis: u64) {
            self.now.store(now_millis, Ordering::Relaxed);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.now.load(Ordering::Relaxed)
        }
    }
}
