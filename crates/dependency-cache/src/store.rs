//! Expiring store seam
//!
//! The cache shares one key namespace between cached values and the tokens
//! that back dependency tags. [`StoreEntry`] keeps the two apart by type so a
//! lookup can always tell which one it found.

use crate::token::RevocationToken;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// What lives under a key in the store
#[derive(Debug, Clone)]
pub enum StoreEntry<V> {
    Value(V),
    Token(RevocationToken),
}

impl<V> StoreEntry<V> {
    pub fn into_value(self) -> Option<V> {
        match self {
            StoreEntry::Value(value) => Some(value),
            StoreEntry::Token(_) => None,
        }
    }

    /// The token under this key, if it is one and still live
    pub fn into_live_token(self) -> Option<RevocationToken> {
        match self {
            StoreEntry::Token(token) if !token.is_revoked() => Some(token),
            _ => None,
        }
    }
}

/// How long an entry stays readable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires after this long without a read
    Sliding(Duration),
    /// Expires at a fixed instant regardless of reads
    Absolute(Instant),
    Never,
}

impl Expiration {
    /// Time left from `now`, or `None` if the entry never expires
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match *self {
            Expiration::Sliding(window) => Some(window),
            Expiration::Absolute(deadline) => Some(deadline.saturating_duration_since(now)),
            Expiration::Never => None,
        }
    }
}

/// Eviction hint under size pressure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    NeverEvict,
}

/// Storage policy for a single entry
#[derive(Debug, Clone)]
pub struct EntryPolicy {
    pub expiration: Expiration,
    pub priority: Priority,
    /// The entry is unreadable once any of these is revoked
    pub revocations: Vec<RevocationToken>,
}

impl EntryPolicy {
    pub fn sliding(window: Duration) -> Self {
        Self {
            expiration: Expiration::Sliding(window),
            priority: Priority::Normal,
            revocations: Vec::new(),
        }
    }

    pub fn absolute(deadline: Instant) -> Self {
        Self {
            expiration: Expiration::Absolute(deadline),
            priority: Priority::Normal,
            revocations: Vec::new(),
        }
    }

    /// Never expires; still evictable for size
    pub fn unbounded() -> Self {
        Self {
            expiration: Expiration::Never,
            priority: Priority::Normal,
            revocations: Vec::new(),
        }
    }

    /// Never expires and is never evicted for size
    pub fn pinned() -> Self {
        Self {
            expiration: Expiration::Never,
            priority: Priority::NeverEvict,
            revocations: Vec::new(),
        }
    }

    pub fn attach(mut self, token: RevocationToken) -> Self {
        self.revocations.push(token);
        self
    }

    pub fn is_revoked(&self) -> bool {
        self.revocations.iter().any(RevocationToken::is_revoked)
    }
}

/// Key-value store with per-entry expiration and revocation.
///
/// `get` must report a miss for expired entries and for entries with a
/// revoked attachment, and must not mutate the store while doing so.
#[async_trait]
pub trait ExpiringStore<V>: Send + Sync {
    async fn get(&self, key: &str) -> Option<StoreEntry<V>>;

    async fn set(&self, key: &str, entry: StoreEntry<V>, policy: EntryPolicy);

    async fn remove(&self, key: &str);

    /// Approximate number of physically stored entries
    fn entry_count(&self) -> u64;
}
