//! Tag token registry
//!
//! Maps tag names to live [`RevocationToken`]s stored alongside cached values.
//! Reads are lock-free; creating a token takes the tag's registration lock
//! and re-checks the store so concurrent populations agree on one token.

use crate::locks::KeyedLocks;
use crate::store::{EntryPolicy, ExpiringStore, StoreEntry};
use crate::token::RevocationToken;
use crate::types::Invalidation;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TagRegistry<V> {
    store: Arc<dyn ExpiringStore<V>>,
    locks: KeyedLocks,
}

impl<V> TagRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn ExpiringStore<V>>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Current live token for `tag`, creating one if it is missing or revoked
    pub async fn token_for(&self, tag: &str) -> RevocationToken {
        if let Some(token) = self.live_token(tag).await {
            return token;
        }

        self.locks
            .with_lock(tag, async {
                match self.store.get(tag).await {
                    Some(StoreEntry::Token(token)) if !token.is_revoked() => return token,
                    Some(StoreEntry::Value(_)) => {
                        warn!(tag = %tag, "Tag name collides with a cached value; replacing it with a token");
                    }
                    _ => {}
                }

                let token = RevocationToken::new();
                self.store
                    .set(tag, StoreEntry::Token(token.clone()), EntryPolicy::pinned())
                    .await;
                debug!(tag = %tag, "Created revocation token");
                token
            })
            .await
    }

    async fn live_token(&self, tag: &str) -> Option<RevocationToken> {
        self.store
            .get(tag)
            .await
            .and_then(StoreEntry::into_live_token)
    }

    /// Revoke the token under `key`, or remove the value stored there
    pub async fn invalidate(&self, key: &str) -> Invalidation {
        match self.store.get(key).await {
            Some(StoreEntry::Token(token)) => {
                if token.revoke() {
                    Invalidation::TokenRevoked
                } else {
                    Invalidation::NotFound
                }
            }
            Some(StoreEntry::Value(_)) => {
                self.store.remove(key).await;
                Invalidation::EntryRemoved
            }
            None => Invalidation::NotFound,
        }
    }

    /// Number of tags that have ever had a token created
    pub async fn tag_count(&self) -> usize {
        self.locks.len().await
    }
}
