//! Dependency Cache
//!
//! A response cache that sits in front of an upstream fetch. Concurrent
//! misses for the same key share a single fetch, and cached values can
//! declare dependency tags so that invalidating one tag hides every entry
//! that depends on it.
//!
//! Values and tag tokens share one moka-backed key namespace. Fresh content
//! uses a sliding expiration; content flagged as stale uses a shorter
//! absolute one.

mod cache;
mod config;
mod error;
mod locks;
mod moka_store;
mod registry;
mod store;
mod token;
mod types;

pub use cache::{DependencyCache, PopulateOptions};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use moka_store::MokaStore;
pub use store::{EntryPolicy, Expiration, ExpiringStore, Priority, StoreEntry};
pub use token::RevocationToken;
pub use types::{CacheStats, Invalidation};
