use std::env;
use std::time::Duration;

const DEFAULT_EXPIRATION_SECS: u64 = 600; // 10 minutes, sliding
const STALE_CONTENT_EXPIRATION_SECS: u64 = 60; // 1 minute, absolute
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Expiration and sizing for a [`crate::DependencyCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Sliding window for fresh content, reset on every read
    pub default_expiration: Duration,
    /// Absolute lifetime for content flagged as stale-tolerant
    pub stale_content_expiration: Duration,
    /// Upper bound on cached values; tag tokens are not counted
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_expiration: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
            stale_content_expiration: Duration::from_secs(STALE_CONTENT_EXPIRATION_SECS),
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Parse configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_expiration = env::var("CACHE_DEFAULT_EXPIRATION_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_expiration);

        let stale_content_expiration = env::var("CACHE_STALE_EXPIRATION_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.stale_content_expiration);

        let max_capacity = env::var("CACHE_MAX_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_capacity);

        Self {
            default_expiration,
            stale_content_expiration,
            max_capacity,
        }
    }

    pub fn with_default_expiration(mut self, expiration: Duration) -> Self {
        self.default_expiration = expiration;
        self
    }

    pub fn with_stale_content_expiration(mut self, expiration: Duration) -> Self {
        self.stale_content_expiration = expiration;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}
