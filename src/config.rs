//! Configuration management for floodgate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::cache::{DEFAULT_PREFIX, DEFAULT_TTL_MS};
use crate::error::{FloodgateError, Result};
use crate::ratelimit::LimiterConfig;

/// Main configuration for floodgate consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Limiter profiles by category name
    #[serde(default)]
    pub profiles: HashMap<String, LimiterConfig>,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Key namespace prepended to every entry
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Entry time-to-live in milliseconds
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

impl FloodgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading floodgate configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FloodgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_ms == 0 {
            return Err(FloodgateError::Config(
                "cache ttl_ms must be greater than zero".to_string(),
            ));
        }
        for (category, profile) in &self.profiles {
            profile.validate().map_err(|e| {
                FloodgateError::Config(format!("profile '{}': {}", category, e))
            })?;
        }
        Ok(())
    }
}
