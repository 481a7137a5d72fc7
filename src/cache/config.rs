//! Configuration for the query cache

use crate::error::{DocStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable holding the cache capacity
pub const CAPACITY_ENV: &str = "DOCSTORE_CACHE_CAPACITY";

/// Environment variable holding the eviction policy (`fifo` or `lru`)
pub const EVICTION_ENV: &str = "DOCSTORE_CACHE_EVICTION";

/// Which entry makes room when the cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the entry that was inserted first; hits do not reorder
    #[default]
    InsertionOrder,

    /// Evict the entry that was hit least recently
    LeastRecentlyUsed,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::InsertionOrder => write!(f, "fifo"),
            EvictionPolicy::LeastRecentlyUsed => write!(f, "lru"),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = DocStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fifo" | "insertion" | "insertion_order" => Ok(EvictionPolicy::InsertionOrder),
            "lru" | "least_recently_used" => Ok(EvictionPolicy::LeastRecentlyUsed),
            other => Err(DocStoreError::ConfigError(format!(
                "unknown eviction policy: {}",
                other
            ))),
        }
    }
}

/// Configuration for a table's query cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of distinct cached predicates. Zero disables caching.
    pub capacity: usize,

    /// Eviction order once `capacity` is reached
    pub eviction: EvictionPolicy,

    /// Enable counter collection in [`CacheStats`](crate::cache::CacheStats)
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            eviction: EvictionPolicy::InsertionOrder,
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Configuration with caching turned off; every query scans
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            ..Default::default()
        }
    }

    /// Load configuration from the environment (and a `.env` file if present).
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let capacity = std::env::var(CAPACITY_ENV).ok();
        let eviction = std::env::var(EVICTION_ENV).ok();
        Self::from_values(capacity.as_deref(), eviction.as_deref())
    }

    fn from_values(capacity: Option<&str>, eviction: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(raw) = capacity {
            let parsed = raw.trim().parse::<usize>().map_err(|e| {
                DocStoreError::ConfigError(format!("{} must be a count: {}", CAPACITY_ENV, e))
            })?;
            builder = builder.capacity(parsed);
        }

        if let Some(raw) = eviction {
            builder = builder.eviction(raw.parse()?);
        }

        Ok(builder.build())
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    capacity: Option<usize>,
    eviction: Option<EvictionPolicy>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set maximum number of cached predicates
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the eviction policy
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            capacity: self.capacity.unwrap_or(defaults.capacity),
            eviction: self.eviction.unwrap_or(defaults.eviction),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.eviction, EvictionPolicy::InsertionOrder);
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .capacity(2)
            .eviction(EvictionPolicy::LeastRecentlyUsed)
            .enable_metrics(false)
            .build();

        assert_eq!(config.capacity, 2);
        assert_eq!(config.eviction, EvictionPolicy::LeastRecentlyUsed);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_disabled_preset() {
        assert_eq!(CacheConfig::disabled().capacity, 0);
    }

    #[test]
    fn test_eviction_policy_parsing() {
        assert_eq!("fifo".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::InsertionOrder);
        assert_eq!(" LRU ".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::LeastRecentlyUsed);
        assert!("random".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::LeastRecentlyUsed.to_string(), "lru");
    }

    #[test]
    fn test_from_values() {
        let config = CacheConfig::from_values(Some("25"), Some("lru")).unwrap();
        assert_eq!(config.capacity, 25);
        assert_eq!(config.eviction, EvictionPolicy::LeastRecentlyUsed);

        let config = CacheConfig::from_values(None, None).unwrap();
        assert_eq!(config, CacheConfig::default());

        let err = CacheConfig::from_values(Some("lots"), None).unwrap_err();
        assert!(matches!(err, DocStoreError::ConfigError(_)));
        assert!(CacheConfig::from_values(None, Some("mru")).is_err());
    }

    #[test]
    fn test_config_serde() {
        let config = CacheConfig::builder().capacity(3).build();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"eviction\":\"insertion_order\""));
        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
