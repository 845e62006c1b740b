//! Core sliding-window limiter implementation.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

use super::profile::LimiterConfig;

/// Mutable limiter state. Guarded by one mutex so the prune, block check,
/// and append of an admission check are indivisible.
#[derive(Debug, Default)]
struct WindowState {
    /// Accepted-request instants (epoch ms), oldest first
    timestamps: VecDeque<u64>,
    /// While set and in the future, every check is rejected
    blocked_until: Option<u64>,
}

impl WindowState {
    /// Drop every timestamp that has aged out of the window.
    fn prune(&mut self, now: u64, window_ms: u64) {
        while self
            .timestamps
            .front()
            .map_or(false, |&t| now.saturating_sub(t) >= window_ms)
        {
            self.timestamps.pop_front();
        }
    }

    /// Count entries still inside the window without mutating.
    fn in_window(&self, now: u64, window_ms: u64) -> u32 {
        self.timestamps
            .iter()
            .filter(|&&t| now.saturating_sub(t) < window_ms)
            .count() as u32
    }

    /// Oldest entry still inside the window, if any.
    fn oldest_in_window(&self, now: u64, window_ms: u64) -> Option<u64> {
        self.timestamps
            .iter()
            .copied()
            .find(|&t| now.saturating_sub(t) < window_ms)
    }
}

/// A sliding-window rate limiter for one logical operation.
///
/// Tracks the instants of recently admitted requests and rejects a check
/// once `max_requests` of them fall inside the rolling window. Exhausting
/// the quota additionally engages a cooldown: every check fails until
/// `block_duration_ms` has elapsed, after which the caller gets a fresh
/// window rather than a resumed one.
///
/// The limiter never sleeps, queues, or retries. A `false` return means the
/// caller decides whether to wait, drop, or surface an error.
pub struct SlidingWindowLimiter<C = SystemClock>
where
    C: Clock,
{
    config: LimiterConfig,
    state: Mutex<WindowState>,
    clock: C,
}

/// Read-only snapshot of a limiter's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterStatus {
    /// Whether a check issued now would be admitted
    pub can_make_request: bool,
    /// Quota left in the current window, clamped at zero
    pub remaining: u32,
    /// When capacity next frees up (epoch ms): the block expiry while
    /// blocked, otherwise the instant the oldest in-window entry ages out.
    /// Absent when the window is empty.
    pub reset_at: Option<u64>,
    /// Whether the cooldown is currently engaged
    pub blocked: bool,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter on the system clock.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C> SlidingWindowLimiter<C>
where
    C: Clock,
{
    /// Create a limiter with an injected clock.
    pub fn with_clock(config: LimiterConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, clock))
    }

    /// Construct from a config already validated by the caller.
    pub(crate) fn from_parts(config: LimiterConfig, clock: C) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState::default()),
            clock,
        }
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Check whether a request may proceed right now, recording it if so.
    ///
    /// Call this immediately before performing the rate-limited action.
    /// Returns `false` while blocked or when the window quota is exhausted;
    /// exhaustion engages the cooldown as a side effect.
    pub fn check(&self) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        state.prune(now, self.config.window_ms);

        if let Some(until) = state.blocked_until {
            if now < until {
                trace!(until, "Request rejected while blocked");
                return false;
            }
            // Block expiry restores the full quota, not a resumed window.
            state.blocked_until = None;
            state.timestamps.clear();
            debug!("Cooldown elapsed, window restored");
        }

        if state.timestamps.len() as u32 >= self.config.max_requests {
            let until = now + self.config.block_duration_ms;
            state.blocked_until = Some(until);
            debug!(until, "Window quota exhausted, blocking");
            return false;
        }

        state.timestamps.push_back(now);
        trace!(in_window = state.timestamps.len(), "Request admitted");
        true
    }

    /// Unconditionally clear the window and any active block.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.timestamps.clear();
        state.blocked_until = None;
        debug!("Limiter reset");
    }

    /// Snapshot the limiter's observable state without mutating it.
    pub fn status(&self) -> LimiterStatus {
        let now = self.clock.now_millis();
        let state = self.state.lock();

        let in_window = state.in_window(now, self.config.window_ms);
        let blocked = state.blocked_until.map_or(false, |until| now < until);
        let remaining = self.config.max_requests.saturating_sub(in_window);

        let reset_at = if blocked {
            state.blocked_until
        } else {
            state
                .oldest_in_window(now, self.config.window_ms)
                .map(|oldest| oldest + self.config.window_ms)
        };

        let can_make_request = if blocked {
            false
        } else if state.blocked_until.is_some() {
            // An elapsed block clears on the next check, granting a fresh
            // window.
            true
        } else {
            in_window < self.config.max_requests
        };

        LimiterStatus {
            can_make_request,
            remaining,
            reset_at,
            blocked,
        }
    }

    /// Whole seconds until capacity frees up, rounded up. Zero when no
    /// reset time is tracked.
    pub fn time_until_reset(&self) -> u64 {
        let now = self.clock.now_millis();
        match self.status().reset_at {
            Some(at) if at > now => (at - now + 999) / 1000,
            _ => 0,
        }
    }
}
