//! Stampede-safe response cache with tag-based invalidation

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::locks::KeyedLocks;
use crate::moka_store::MokaStore;
use crate::registry::TagRegistry;
use crate::store::{EntryPolicy, ExpiringStore, StoreEntry};
use crate::types::{CacheStats, Invalidation};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

type Predicate<V> = Box<dyn Fn(&V) -> bool + Send + Sync>;
type TagsOf<V> = Box<dyn Fn(&V) -> Vec<String> + Send + Sync>;

/// Per-call options for [`DependencyCache::get_or_add`].
///
/// By default every fetched value is cached, has no dependency tags and is
/// treated as fresh content.
pub struct PopulateOptions<V> {
    should_cache: Option<Predicate<V>>,
    tags_of: Option<TagsOf<V>>,
    is_stale: Option<Predicate<V>>,
}

impl<V> Default for PopulateOptions<V> {
    fn default() -> Self {
        Self {
            should_cache: None,
            tags_of: None,
            is_stale: None,
        }
    }
}

impl<V> PopulateOptions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only cache values for which `predicate` returns true
    pub fn should_cache<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.should_cache = Some(Box::new(predicate));
        self
    }

    /// Tags the fetched value depends on. Revoking any of them hides the entry.
    pub fn depends_on<F, I, S>(mut self, tags_of: F) -> Self
    where
        F: Fn(&V) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_of = Some(Box::new(move |value| {
            tags_of(value).into_iter().map(Into::into).collect()
        }));
        self
    }

    /// Marks degraded content, which gets the absolute stale-content expiration
    pub fn stale_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.is_stale = Some(Box::new(predicate));
        self
    }

    fn wants_cache(&self, value: &V) -> bool {
        self.should_cache.as_ref().map_or(true, |f| f(value))
    }

    fn is_stale(&self, value: &V) -> bool {
        self.is_stale.as_ref().is_some_and(|f| f(value))
    }

    fn tags(&self, value: &V) -> Vec<String> {
        self.tags_of.as_ref().map(|f| f(value)).unwrap_or_default()
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    uncached: AtomicU64,
    invalidations: AtomicU64,
}

/// Response cache in front of an upstream fetch.
///
/// At most one fetch per key is in flight at any time: callers that miss
/// wait on the key's population lock and then re-check the store before
/// fetching. Cached values may depend on tags; invalidating a tag makes
/// every dependent entry unreadable.
///
/// Population locks and tag tokens are never pruned, so memory held by the
/// lock registries grows with the number of distinct keys and tags.
pub struct DependencyCache<V> {
    config: CacheConfig,
    store: Arc<dyn ExpiringStore<V>>,
    tags: TagRegistry<V>,
    population_locks: KeyedLocks,
    counters: Counters,
}

impl<V> DependencyCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache backed by an in-memory moka store
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(MokaStore::new(config.max_capacity));
        Self::with_store(config, store)
    }

    /// Create a cache over a caller-provided store
    pub fn with_store(config: CacheConfig, store: Arc<dyn ExpiringStore<V>>) -> Self {
        Self {
            config,
            tags: TagRegistry::new(store.clone()),
            store,
            population_locks: KeyedLocks::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, fetching and caching it on a miss.
    ///
    /// A failed fetch is returned to this caller only and nothing is cached.
    /// Callers that were waiting on the same key run their own fetch once
    /// they get the lock.
    pub async fn get_or_add<F, Fut, E>(
        &self,
        key: &str,
        fetch: F,
        options: PopulateOptions<V>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.try_get(key).await.map_err(|err| err.widen())? {
            return Ok(value);
        }

        self.population_locks
            .with_lock(key, self.populate(key, fetch, options))
            .await
    }

    async fn populate<F, Fut, E>(
        &self,
        key: &str,
        fetch: F,
        options: PopulateOptions<V>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        match self.store.get(key).await {
            Some(StoreEntry::Value(value)) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Populated by another caller while waiting");
                return Ok(value);
            }
            Some(StoreEntry::Token(token)) if !token.is_revoked() => {
                warn!(key = %key, "Cache key collides with a live tag token; caching will replace it");
            }
            _ => {}
        }

        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        let value = match fetch().await {
            Ok(value) => value,
            Err(err) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, "Upstream fetch failed, nothing cached");
                return Err(CacheError::Fetch(err));
            }
        };

        if !options.wants_cache(&value) {
            self.counters.uncached.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Fetched value not cacheable");
            return Ok(value);
        }

        let stale = options.is_stale(&value);
        let mut policy = if stale {
            // A deadline past what Instant can represent means no deadline
            match Instant::now().checked_add(self.config.stale_content_expiration) {
                Some(deadline) => EntryPolicy::absolute(deadline),
                None => EntryPolicy::unbounded(),
            }
        } else {
            EntryPolicy::sliding(self.config.default_expiration)
        };

        let tags = options.tags(&value);
        for tag in &tags {
            policy = policy.attach(self.tags.token_for(tag).await);
        }

        self.store
            .set(key, StoreEntry::Value(value.clone()), policy)
            .await;
        debug!(key = %key, stale, tags = ?tags, "Cached fetched value");

        Ok(value)
    }

    /// Read without populating. Expired and revoked entries read as `None`.
    pub async fn try_get(&self, key: &str) -> Result<Option<V>> {
        if key.is_empty() {
            return Err(CacheError::empty_key("try_get"));
        }

        let value = self.store.get(key).await.and_then(StoreEntry::into_value);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache miss");
        }
        Ok(value)
    }

    /// Invalidate `key`: revoke it if it names a tag, otherwise remove the
    /// value cached under it. Unknown keys are a no-op.
    pub async fn invalidate_dependency(&self, key: &str) -> Result<Invalidation> {
        if key.is_empty() {
            return Err(CacheError::empty_key("invalidate_dependency"));
        }

        let outcome = self.tags.invalidate(key).await;
        match outcome {
            Invalidation::TokenRevoked | Invalidation::EntryRemoved => {
                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                info!(key = %key, outcome = ?outcome, "Invalidated");
            }
            Invalidation::NotFound => debug!(key = %key, "Nothing to invalidate"),
        }
        Ok(outcome)
    }

    /// Remove every value this cache has populated through `get_or_add`.
    ///
    /// Best effort: tag tokens and values written to the store by other
    /// means are left in place. Returns the number of keys visited.
    pub async fn clear(&self) -> usize {
        let keys = self.population_locks.keys().await;
        for key in &keys {
            self.store.remove(key).await;
        }
        info!(keys = keys.len(), "Cleared cached values");
        keys.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            uncached: self.counters.uncached.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            tracked_keys: self.population_locks.len().await,
            tracked_tags: self.tags.tag_count().await,
            entries: self.store.entry_count(),
        }
    }
}
