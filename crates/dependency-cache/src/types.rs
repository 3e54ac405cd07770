//! Cache types

use serde::Serialize;

/// Outcome of invalidating a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Invalidation {
    /// The key named a live tag; every dependent entry is now unreadable
    TokenRevoked,
    /// The key named a cached value, which was removed
    EntryRemoved,
    /// Nothing live under the key
    NotFound,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Reads that found nothing, including `get_or_add` callers later
    /// served by another caller's fetch (see `coalesced`)
    pub misses: u64,
    /// Misses answered by the locked re-check without fetching
    pub coalesced: u64,
    /// Upstream fetches started, successful or not
    pub fetches: u64,
    pub fetch_failures: u64,
    /// Fetched values that were returned but not cached
    pub uncached: u64,
    /// Invalidations that revoked a token or removed an entry
    pub invalidations: u64,
    /// Keys that have ever been populated (population locks held)
    pub tracked_keys: usize,
    /// Tags that have ever had a token created
    pub tracked_tags: usize,
    /// Approximate entries in the store, tokens included
    pub entries: u64,
}

impl CacheStats {
    /// Fraction of reads served from cache (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.coalesced, 0);
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.tracked_keys, 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_stats_serialization() {
        let stats = CacheStats {
            hits: 500,
            misses: 50,
            fetches: 50,
            ..Default::default()
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"hits\":500"));
        assert!(json.contains("\"fetch_failures\":0"));
        assert!(json.contains("\"coalesced\":0"));
    }

    #[test]
    fn test_invalidation_serialization() {
        let json = serde_json::to_string(&Invalidation::TokenRevoked).unwrap();
        assert_eq!(json, "\"token_revoked\"");
    }
}
