//! Per-category limiter registry.
//!
//! One limiter instance exists per logical rate-limited operation (an
//! external API category, say "text" or "image"). The registry owns that
//! mapping, creating limiters on first use from configured profiles.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::FloodgateConfig;
use crate::error::{FloodgateError, Result};

use super::limiter::{LimiterStatus, SlidingWindowLimiter};
use super::profile::LimiterConfig;

/// A registry of sliding-window limiters keyed by category name.
///
/// Thread-safe; categories not present in the configured profiles fall back
/// to the default profile.
pub struct LimiterRegistry<C = SystemClock>
where
    C: Clock + Clone,
{
    /// Limiters indexed by category, created lazily
    limiters: DashMap<String, Arc<SlidingWindowLimiter<C>>>,
    /// Configured profiles (category -> limiter config)
    profiles: HashMap<String, LimiterConfig>,
    /// Profile applied to categories without an explicit entry
    default_profile: LimiterConfig,
    clock: C,
}

impl LimiterRegistry<SystemClock> {
    /// Create a registry on the system clock with no configured profiles.
    pub fn new() -> Self {
        Self {
            limiters: DashMap::new(),
            profiles: HashMap::new(),
            default_profile: LimiterConfig::default(),
            clock: SystemClock,
        }
    }

    /// Create a registry from crate configuration.
    pub fn from_config(config: &FloodgateConfig) -> Result<Self> {
        Self::with_clock(
            config.profiles.clone(),
            LimiterConfig::default(),
            SystemClock,
        )
    }
}

impl<C> LimiterRegistry<C>
where
    C: Clock + Clone,
{
    /// Create a registry with explicit profiles, default profile, and clock.
    pub fn with_clock(
        profiles: HashMap<String, LimiterConfig>,
        default_profile: LimiterConfig,
        clock: C,
    ) -> Result<Self> {
        default_profile.validate()?;
        for (category, profile) in &profiles {
            profile.validate().map_err(|e| {
                FloodgateError::Config(format!("profile '{}': {}", category, e))
            })?;
        }

        Ok(Self {
            limiters: DashMap::new(),
            profiles,
            default_profile,
            clock,
        })
    }

    /// Check the rate limit for a category, recording the request if
    /// admitted.
    pub fn check_rate_limit(&self, category: &str) -> bool {
        self.limiter(category).check()
    }

    /// Snapshot a category's limiter state.
    ///
    /// Returns `None` for categories that have never been checked.
    pub fn status(&self, category: &str) -> Option<LimiterStatus> {
        self.limiters.get(category).map(|l| l.status())
    }

    /// Whole seconds until a category's capacity frees up. Zero for
    /// categories with no reset time tracked.
    pub fn time_until_reset(&self, category: &str) -> u64 {
        self.limiters
            .get(category)
            .map(|l| l.time_until_reset())
            .unwrap_or(0)
    }

    /// Restore a single category to full quota.
    pub fn reset(&self, category: &str) {
        self.limiters.remove(category);
    }

    /// Restore every category to full quota.
    pub fn reset_all(&self) {
        self.limiters.clear();
    }

    /// Number of categories with an active limiter.
    pub fn limiter_count(&self) -> usize {
        self.limiters.len()
    }

    /// Get or create the limiter for a category.
    fn limiter(&self, category: &str) -> Arc<SlidingWindowLimiter<C>> {
        self.limiters
            .entry(category.to_string())
            .or_insert_with(|| {
                // Profiles were validated when the registry was built.
                let config = self
                    .profiles
                    .get(category)
                    .cloned()
                    .unwrap_or_else(|| self.default_profile.clone());
                debug!(
                    category,
                    max_requests = config.max_requests,
                    window_ms = config.window_ms,
                    "Creating limiter for category"
                );
                Arc::new(SlidingWindowLimiter::from_parts(config, self.clock.clone()))
            })
            .value()
            .clone()
    }
}

impl Default for LimiterRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}
