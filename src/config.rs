//! Configuration management for Floodgate limiters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// Default number of permits granted per refresh period.
const DEFAULT_LIMIT_FOR_PERIOD: u32 = 50;
/// Default refresh period in milliseconds.
const DEFAULT_LIMIT_REFRESH_PERIOD_MS: u64 = 500;
/// Default acquisition timeout in milliseconds.
const DEFAULT_TIMEOUT_DURATION_MS: u64 = 5000;

/// Configuration for a single rate limiter.
///
/// A config is an immutable snapshot: limiters hold it behind an `Arc` and
/// replace the whole snapshot on change, never mutating fields in place.
/// Construct one through [`RateLimiterConfig::builder`], which validates at
/// build time so a bad config can never reach a live limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    limit_for_period: u32,
    limit_refresh_period: Duration,
    timeout_duration: Duration,
}

impl RateLimiterConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::default()
    }

    /// Number of permits granted per refresh period.
    pub fn limit_for_period(&self) -> u32 {
        self.limit_for_period
    }

    /// Duration between permit pool refreshes.
    ///
    /// Fixed for the lifetime of any limiter constructed from this config;
    /// runtime config changes replace the capacity or timeout, never the
    /// period.
    pub fn limit_refresh_period(&self) -> Duration {
        self.limit_refresh_period
    }

    /// Maximum duration a caller is willing to wait for a permit.
    ///
    /// A zero timeout means "fail immediately if no permit is free".
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Copy of this config with a different acquisition timeout.
    pub fn with_timeout_duration(&self, timeout: Duration) -> Self {
        Self {
            timeout_duration: timeout,
            ..self.clone()
        }
    }

    /// Copy of this config with a different per-period capacity.
    pub fn with_limit_for_period(&self, limit: u32) -> Result<Self> {
        Self::builder()
            .limit_for_period(limit)
            .limit_refresh_period(self.limit_refresh_period)
            .timeout_duration(self.timeout_duration)
            .build()
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: DEFAULT_LIMIT_FOR_PERIOD,
            limit_refresh_period: Duration::from_millis(DEFAULT_LIMIT_REFRESH_PERIOD_MS),
            timeout_duration: Duration::from_millis(DEFAULT_TIMEOUT_DURATION_MS),
        }
    }
}

/// Builder for [`RateLimiterConfig`].
#[derive(Debug, Clone)]
pub struct RateLimiterConfigBuilder {
    limit_for_period: u32,
    limit_refresh_period: Duration,
    timeout_duration: Duration,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        let defaults = RateLimiterConfig::default();
        Self {
            limit_for_period: defaults.limit_for_period,
            limit_refresh_period: defaults.limit_refresh_period,
            timeout_duration: defaults.timeout_duration,
        }
    }
}

impl RateLimiterConfigBuilder {
    /// Set the number of permits granted per refresh period. Must be >= 1.
    pub fn limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Set the duration between permit pool refreshes. Must be non-zero.
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Set the maximum duration a caller will wait for a permit.
    pub fn timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<RateLimiterConfig> {
        if self.limit_for_period == 0 {
            return Err(FloodgateError::Config(
                "limit_for_period must be at least 1".to_string(),
            ));
        }
        if self.limit_refresh_period.is_zero() {
            return Err(FloodgateError::Config(
                "limit_refresh_period must be greater than zero".to_string(),
            ));
        }
        Ok(RateLimiterConfig {
            limit_for_period: self.limit_for_period,
            limit_refresh_period: self.limit_refresh_period,
            timeout_duration: self.timeout_duration,
        })
    }
}

/// Declarative spec for one limiter, as it appears in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSpec {
    /// Number of permits granted per refresh period
    #[serde(default = "default_limit_for_period")]
    pub limit_for_period: u32,

    /// Refresh period in milliseconds
    #[serde(default = "default_limit_refresh_period_ms")]
    pub limit_refresh_period_ms: u64,

    /// Acquisition timeout in milliseconds
    #[serde(default = "default_timeout_duration_ms")]
    pub timeout_duration_ms: u64,
}

impl Default for LimiterSpec {
    fn default() -> Self {
        Self {
            limit_for_period: default_limit_for_period(),
            limit_refresh_period_ms: default_limit_refresh_period_ms(),
            timeout_duration_ms: default_timeout_duration_ms(),
        }
    }
}

fn default_limit_for_period() -> u32 {
    DEFAULT_LIMIT_FOR_PERIOD
}

fn default_limit_refresh_period_ms() -> u64 {
    DEFAULT_LIMIT_REFRESH_PERIOD_MS
}

fn default_timeout_duration_ms() -> u64 {
    DEFAULT_TIMEOUT_DURATION_MS
}

impl TryFrom<&LimiterSpec> for RateLimiterConfig {
    type Error = FloodgateError;

    fn try_from(spec: &LimiterSpec) -> Result<Self> {
        RateLimiterConfig::builder()
            .limit_for_period(spec.limit_for_period)
            .limit_refresh_period(Duration::from_millis(spec.limit_refresh_period_ms))
            .timeout_duration(Duration::from_millis(spec.timeout_duration_ms))
            .build()
    }
}

/// A set of named limiter specs loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Map of limiter name to its spec
    #[serde(default)]
    pub limiters: HashMap<String, LimiterSpec>,
}

impl RegistryConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    ///
    /// Every spec is validated up front; one bad entry fails the whole load.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RegistryConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse limiter config: {}", e)))?;

        for (name, spec) in &config.limiters {
            RateLimiterConfig::try_from(spec).map_err(|e| {
                FloodgateError::Config(format!("Invalid spec for limiter '{}': {}", name, e))
            })?;
        }

        Ok(config)
    }

    /// Get the spec for a named limiter.
    pub fn get(&self, name: &str) -> Option<&LimiterSpec> {
        self.limiters.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RateLimiterConfig::builder().build().unwrap();
        assert_eq!(config.limit_for_period(), 50);
        assert_eq!(config.limit_refresh_period(), Duration::from_millis(500));
        assert_eq!(config.timeout_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_rejects_zero_limit() {
        let result = RateLimiterConfig::builder().limit_for_period(0).build();
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_zero_period() {
        let result = RateLimiterConfig::builder()
            .limit_refresh_period(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_builder_allows_zero_timeout() {
        let config = RateLimiterConfig::builder()
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.timeout_duration(), Duration::ZERO);
    }

    #[test]
    fn test_copy_on_write_updates() {
        let config = RateLimiterConfig::builder().build().unwrap();

        let updated = config.with_timeout_duration(Duration::from_millis(10));
        assert_eq!(updated.timeout_duration(), Duration::from_millis(10));
        assert_eq!(updated.limit_for_period(), config.limit_for_period());

        let updated = config.with_limit_for_period(7).unwrap();
        assert_eq!(updated.limit_for_period(), 7);
        assert_eq!(updated.limit_refresh_period(), config.limit_refresh_period());

        assert!(config.with_limit_for_period(0).is_err());
    }

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
limiters:
  search-api:
    limit_for_period: 10
    limit_refresh_period_ms: 1000
    timeout_duration_ms: 25
"#;
        let config = RegistryConfig::from_yaml(yaml).unwrap();
        let spec = config.get("search-api").unwrap();
        assert_eq!(spec.limit_for_period, 10);
        assert_eq!(spec.limit_refresh_period_ms, 1000);
        assert_eq!(spec.timeout_duration_ms, 25);
    }

    #[test]
    fn test_parse_config_with_defaults() {
        let yaml = r#"
limiters:
  bulk-export: {}
"#;
        let config = RegistryConfig::from_yaml(yaml).unwrap();
        let spec = config.get("bulk-export").unwrap();
        assert_eq!(spec.limit_for_period, 50);
        assert_eq!(spec.limit_refresh_period_ms, 500);
        assert_eq!(spec.timeout_duration_ms, 5000);
    }

    #[test]
    fn test_parse_rejects_invalid_spec() {
        let yaml = r#"
limiters:
  broken:
    limit_for_period: 0
"#;
        let result = RegistryConfig::from_yaml(yaml);
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_spec_conversion() {
        let spec = LimiterSpec {
            limit_for_period: 3,
            limit_refresh_period_ms: 250,
            timeout_duration_ms: 0,
        };
        let config = RateLimiterConfig::try_from(&spec).unwrap();
        assert_eq!(config.limit_for_period(), 3);
        assert_eq!(config.limit_refresh_period(), Duration::from_millis(250));
        assert_eq!(config.timeout_duration(), Duration::ZERO);
    }
}
