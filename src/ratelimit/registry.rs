//! Registry of named rate limiter instances.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::{RateLimiterConfig, RegistryConfig};
use crate::error::Result;

use super::limiter::RateLimiter;

/// A concurrent store of rate limiters indexed by name.
///
/// Limiters are created on first use with the registry's default config and
/// live until explicitly removed. Each limiter is independently configured;
/// changing the default config affects only limiters created afterwards.
pub struct RateLimiterRegistry {
    /// Config applied to limiters created without an explicit one
    default_config: RwLock<Arc<RateLimiterConfig>>,
    /// Limiter instances indexed by name
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    /// Create a registry with the given default config.
    pub fn new(default_config: RateLimiterConfig) -> Self {
        Self {
            default_config: RwLock::new(Arc::new(default_config)),
            limiters: DashMap::new(),
        }
    }

    /// Build a registry from a parsed configuration, eagerly creating one
    /// limiter per declared spec.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let registry = Self::default();
        for (name, spec) in &config.limiters {
            let limiter_config = RateLimiterConfig::try_from(spec)?;
            registry.rate_limiter_with_config(name, limiter_config);
        }
        Ok(registry)
    }

    /// Build a registry from a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = RegistryConfig::from_file(path)?;
        Self::from_config(&config)
    }

    /// Build a registry from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = RegistryConfig::from_yaml(yaml)?;
        Self::from_config(&config)
    }

    /// Get the limiter with the given name, creating it with the default
    /// config if it does not exist yet.
    pub fn rate_limiter(&self, name: &str) -> Arc<RateLimiter> {
        self.limiters
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self.default_config.read().as_ref().clone();
                debug!(name = %name, "Creating rate limiter from registry defaults");
                Arc::new(RateLimiter::new(name, config))
            })
            .clone()
    }

    /// Get the limiter with the given name, creating it with `config` if it
    /// does not exist yet. An existing limiter keeps its own config.
    pub fn rate_limiter_with_config(
        &self,
        name: &str,
        config: RateLimiterConfig,
    ) -> Arc<RateLimiter> {
        self.limiters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(name, config)))
            .clone()
    }

    /// Remove a limiter from the registry.
    ///
    /// Existing holders of the instance keep using it; the registry simply
    /// forgets the name.
    pub fn remove(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.remove(name).map(|(_, limiter)| limiter)
    }

    /// Replace the default config used for subsequently created limiters.
    pub fn set_default_config(&self, config: RateLimiterConfig) {
        let mut default_config = self.default_config.write();
        *default_config = Arc::new(config);
    }

    /// Current default config.
    pub fn default_config(&self) -> Arc<RateLimiterConfig> {
        self.default_config.read().clone()
    }

    /// Snapshot of all registered limiters.
    pub fn all(&self) -> Vec<Arc<RateLimiter>> {
        self.limiters.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether the registry holds no limiters.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
