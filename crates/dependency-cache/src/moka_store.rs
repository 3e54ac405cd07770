//! In-memory expiring store backed by moka

use crate::store::{EntryPolicy, Expiration, ExpiringStore, Priority, StoreEntry};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone)]
struct StoredItem<V> {
    entry: StoreEntry<V>,
    policy: EntryPolicy,
}

/// Per-entry expiration driven by the item's own policy
struct PolicyExpiry;

impl<V> Expiry<String, StoredItem<V>> for PolicyExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredItem<V>,
        created_at: Instant,
    ) -> Option<Duration> {
        value.policy.expiration.remaining(created_at)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &StoredItem<V>,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.policy.expiration {
            Expiration::Sliding(window) => Some(window),
            Expiration::Absolute(_) | Expiration::Never => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredItem<V>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.policy.expiration.remaining(updated_at)
    }
}

/// Expiring store with two partitions: a size-bounded one for normal
/// entries and an unbounded one for [`Priority::NeverEvict`] entries.
/// A key lives in at most one partition at a time.
pub struct MokaStore<V> {
    values: Cache<String, StoredItem<V>>,
    pinned: Cache<String, StoredItem<V>>,
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        let values = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PolicyExpiry)
            .build();

        let pinned = Cache::builder().expire_after(PolicyExpiry).build();

        Self { values, pinned }
    }

    async fn lookup(&self, key: &str) -> Option<StoredItem<V>> {
        match self.pinned.get(key).await {
            Some(item) => Some(item),
            None => self.values.get(key).await,
        }
    }
}

#[async_trait]
impl<V> ExpiringStore<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<StoreEntry<V>> {
        let item = self.lookup(key).await?;
        if item.policy.is_revoked() {
            debug!(key = %key, "Entry hidden by revoked dependency");
            return None;
        }
        Some(item.entry)
    }

    async fn set(&self, key: &str, entry: StoreEntry<V>, policy: EntryPolicy) {
        let priority = policy.priority;
        let item = StoredItem { entry, policy };

        match priority {
            Priority::NeverEvict => {
                self.values.invalidate(key).await;
                self.pinned.insert(key.to_string(), item).await;
            }
            Priority::Normal => {
                self.pinned.invalidate(key).await;
                self.values.insert(key.to_string(), item).await;
            }
        }
    }

    async fn remove(&self, key: &str) {
        self.values.invalidate(key).await;
        self.pinned.invalidate(key).await;
    }

    fn entry_count(&self) -> u64 {
        self.values.entry_count() + self.pinned.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RevocationToken;
    use tokio::time::sleep;

    fn value(entry: Option<StoreEntry<String>>) -> Option<String> {
        entry.and_then(StoreEntry::into_value)
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MokaStore::new(100);
        store
            .set(
                "a",
                StoreEntry::Value("one".to_string()),
                EntryPolicy::sliding(Duration::from_secs(60)),
            )
            .await;

        assert_eq!(value(store.get("a").await), Some("one".to_string()));

        store.remove("a").await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store: MokaStore<String> = MokaStore::new(100);
        assert!(store.get("nothing").await.is_none());
    }

    #[tokio::test]
    async fn test_revoked_attachment_hides_entry() {
        let store = MokaStore::new(100);
        let token = RevocationToken::new();
        store
            .set(
                "a",
                StoreEntry::Value("one".to_string()),
                EntryPolicy::sliding(Duration::from_secs(60)).attach(token.clone()),
            )
            .await;

        assert!(store.get("a").await.is_some());
        token.revoke();
        assert!(store.get("a").await.is_none());

        // Overwriting without the dead attachment makes the key readable again
        store
            .set(
                "a",
                StoreEntry::Value("two".to_string()),
                EntryPolicy::sliding(Duration::from_secs(60)),
            )
            .await;
        assert_eq!(value(store.get("a").await), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_sliding_expiration_resets_on_read() {
        let store = MokaStore::new(100);
        store
            .set(
                "a",
                StoreEntry::Value("one".to_string()),
                EntryPolicy::sliding(Duration::from_millis(300)),
            )
            .await;

        for _ in 0..6 {
            sleep(Duration::from_millis(100)).await;
            assert!(store.get("a").await.is_some());
        }

        sleep(Duration::from_millis(700)).await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_absolute_expiration_ignores_reads() {
        let store = MokaStore::new(100);
        store
            .set(
                "a",
                StoreEntry::Value("one".to_string()),
                EntryPolicy::absolute(Instant::now() + Duration::from_millis(300)),
            )
            .await;

        assert!(store.get("a").await.is_some());
        sleep(Duration::from_millis(100)).await;
        assert!(store.get("a").await.is_some());

        sleep(Duration::from_millis(600)).await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_pinned_entry_moves_between_partitions() {
        let store: MokaStore<String> = MokaStore::new(100);
        let token = RevocationToken::new();
        store
            .set("tag", StoreEntry::Token(token.clone()), EntryPolicy::pinned())
            .await;

        let found = store.get("tag").await.and_then(StoreEntry::into_live_token);
        assert!(found.is_some_and(|t| t.ptr_eq(&token)));

        store
            .set(
                "tag",
                StoreEntry::Value("plain".to_string()),
                EntryPolicy::sliding(Duration::from_secs(60)),
            )
            .await;
        assert_eq!(value(store.get("tag").await), Some("plain".to_string()));
    }

    #[tokio::test]
    async fn test_pinned_entries_survive_size_pressure() {
        let store = MokaStore::new(4);
        let token = RevocationToken::new();
        store
            .set("tag", StoreEntry::Token(token), EntryPolicy::pinned())
            .await;

        for i in 0..200 {
            store
                .set(
                    &format!("key-{i}"),
                    StoreEntry::Value(format!("v{i}")),
                    EntryPolicy::sliding(Duration::from_secs(60)),
                )
                .await;
        }
        store.values.run_pending_tasks().await;

        assert!(store.get("tag").await.is_some());
        assert!(store.values.entry_count() <= 4);
    }
}
