//! Dependency cache demo
//!
//! Drives the cache against a simulated slow upstream: a burst of concurrent
//! callers on one key, tag invalidation, degraded content and a clear.

use dependency_cache::{CacheConfig, CacheError, DependencyCache, PopulateOptions};
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Clone, Serialize)]
struct Response {
    resource: String,
    revision: u64,
    degraded: bool,
}

#[derive(Debug)]
struct UpstreamError(String);

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upstream error: {}", self.0)
    }
}

impl std::error::Error for UpstreamError {}

/// Slow in-process upstream; every call is counted
struct SimulatedUpstream {
    calls: AtomicUsize,
    revision: AtomicU64,
    delay: Duration,
}

impl SimulatedUpstream {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            revision: AtomicU64::new(1),
            delay,
        }
    }

    async fn fetch(&self, resource: &str) -> Result<Response, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if resource.starts_with("missing/") {
            return Err(UpstreamError(format!("{resource} not found")));
        }

        Ok(Response {
            resource: resource.to_string(),
            revision: self.revision.load(Ordering::SeqCst),
            degraded: resource.starts_with("feed/"),
        })
    }

    fn publish(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn report_options() -> PopulateOptions<Response> {
    PopulateOptions::new()
        .depends_on(|_: &Response| ["reports"])
        .stale_when(|r: &Response| r.degraded)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("dependency_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    let callers = std::env::var("DEMO_CALLERS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(50);
    let delay = std::env::var("DEMO_FETCH_DELAY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100));

    let cache: Arc<DependencyCache<Response>> =
        Arc::new(DependencyCache::new(CacheConfig::from_env()));
    let config = cache.config();
    info!("Default expiration: {:?} (sliding)", config.default_expiration);
    info!("Stale content expiration: {:?} (absolute)", config.stale_content_expiration);
    info!("Max capacity: {}", config.max_capacity);

    let upstream = Arc::new(SimulatedUpstream::new(delay));

    // Burst of concurrent misses on one key
    let results = join_all((0..callers).map(|_| {
        let cache = cache.clone();
        let upstream = upstream.clone();
        tokio::spawn(async move {
            cache
                .get_or_add(
                    "reports/daily",
                    || upstream.fetch("reports/daily"),
                    report_options(),
                )
                .await
        })
    }))
    .await;
    let served = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    info!(callers, served, fetches = upstream.calls(), "Concurrent burst done");

    // New revision published upstream; the cached copy is still served
    let revision = upstream.publish();
    let cached = cache
        .get_or_add("reports/daily", || upstream.fetch("reports/daily"), report_options())
        .await?;
    info!(published = revision, served = cached.revision, "Before invalidation");

    cache.invalidate_dependency("reports").await?;
    let fresh = cache
        .get_or_add("reports/daily", || upstream.fetch("reports/daily"), report_options())
        .await?;
    info!(served = fresh.revision, fetches = upstream.calls(), "After invalidating tag");

    // Degraded content gets the absolute stale-content expiration
    let feed = cache
        .get_or_add("feed/home", || upstream.fetch("feed/home"), report_options())
        .await?;
    info!(degraded = feed.degraded, "Cached degraded feed");

    // Failed fetches surface to the caller and are not cached
    match cache
        .get_or_add("missing/page", || upstream.fetch("missing/page"), PopulateOptions::new())
        .await
    {
        Ok(_) => warn!("Expected the missing page to fail"),
        Err(CacheError::Fetch(err)) => info!(error = %err, "Fetch failure propagated"),
        Err(err) => return Err(err.into()),
    }

    let cleared = cache.clear().await;
    info!(keys = cleared, "Cleared populated keys");

    let stats = cache.stats().await;
    info!("Cache stats: {}", serde_json::to_string(&stats)?);
    info!("Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
