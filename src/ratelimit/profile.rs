//! Limiter configuration profiles.
//!
//! A profile fixes the three knobs of a sliding-window limiter: how many
//! requests fit in the window, how long the window is, and how long a
//! violator stays blocked. Profiles are plain serde structs so they can be
//! embedded in the crate configuration file.

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};

/// Default cooldown applied after the window quota is exhausted.
const DEFAULT_BLOCK_DURATION_MS: u64 = 60_000;

/// Configuration for a single sliding-window limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum requests admitted within any rolling window
    pub max_requests: u32,
    /// Window duration in milliseconds
    pub window_ms: u64,
    /// Cooldown in milliseconds once the quota is exhausted
    #[serde(default = "default_block_duration_ms")]
    pub block_duration_ms: u64,
}

fn default_block_duration_ms() -> u64 {
    DEFAULT_BLOCK_DURATION_MS
}

impl LimiterConfig {
    /// Create a config with the default cooldown.
    pub fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            block_duration_ms: DEFAULT_BLOCK_DURATION_MS,
        }
    }

    /// Set a non-default cooldown.
    pub fn with_block_duration(mut self, block_duration_ms: u64) -> Self {
        self.block_duration_ms = block_duration_ms;
        self
    }

    /// Profile for text-generation calls: 15 requests per minute, one
    /// minute of cooldown on violation.
    pub fn text_generation() -> Self {
        Self {
            max_requests: 15,
            window_ms: 60_000,
            block_duration_ms: 60_000,
        }
    }

    /// Profile for image-generation calls: 2 requests per minute, five
    /// minutes of cooldown on violation.
    pub fn image_generation() -> Self {
        Self {
            max_requests: 2,
            window_ms: 60_000,
            block_duration_ms: 300_000,
        }
    }

    /// Validate the configuration.
    ///
    /// A limiter needs a positive quota and a positive window; the cooldown
    /// may be zero, in which case a violation only costs the failed check.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(FloodgateError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(FloodgateError::Config(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::text_generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_block_duration() {
        let config = LimiterConfig::new(10, 1_000);
        assert_eq!(config.max_requests, 10);
        assert_eq!(config.window_ms, 1_000);
        assert_eq!(config.block_duration_ms, 60_000);
    }

    #[test]
    fn test_with_block_duration() {
        let config = LimiterConfig::new(10, 1_000).with_block_duration(5_000);
        assert_eq!(config.block_duration_ms, 5_000);
    }

    #[test]
    fn test_text_generation_preset() {
        let config = LimiterConfig::text_generation();
        assert_eq!(config.max_requests, 15);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.block_duration_ms, 60_000);
    }

    #[test]
    fn test_image_generation_preset() {
        let config = LimiterConfig::image_generation();
        assert_eq!(config.max_requests, 2);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.block_duration_ms, 300_000);
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let config = LimiterConfig::new(0, 1_000);
        assert!(matches!(
            config.validate(),
            Err(FloodgateError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = LimiterConfig::new(5, 0);
        assert!(matches!(
            config.validate(),
            Err(FloodgateError::Config(_))
        ));
    }

    #[test]
    fn test_validate_accepts_zero_block_duration() {
        let config = LimiterConfig::new(5, 1_000).with_block_duration(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserializes_with_default_block_duration() {
        let yaml = r#"
max_requests: 8
window_ms: 30000
"#;
        let config: LimiterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_requests, 8);
        assert_eq!(config.window_ms, 30_000);
        assert_eq!(config.block_duration_ms, 60_000);
    }
}
