//! Admission control: sliding-window rate limiting with cooldown.

mod limiter;
mod profile;
mod registry;

pub use limiter::{LimiterStatus, SlidingWindowLimiter};
pub use profile::LimiterConfig;
pub use registry::LimiterRegistry;
