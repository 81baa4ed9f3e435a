//! Dashboard-data provider: the read-through consumer of the cache.
//!
//! Each request reads the cache first. A fresh hit is returned as is. A stale
//! hit is returned immediately while at most one background task recomputes
//! it. A miss is computed inline and stored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::keys::{dashboard_key, dashboard_prefix};

/// The expensive aggregation behind the dashboard.
pub trait DashboardSource: Send + Sync + 'static {
    type Data: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Error: fmt::Display + Send + 'static;

    /// Aggregate telemetry over the last `window_days` for `source`.
    fn fetch(
        &self,
        window_days: u32,
        source: &str,
    ) -> impl Future<Output = Result<Self::Data, Self::Error>> + Send;
}

/// How a dashboard response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh cache entry.
    Hit,
    /// Served from a stale entry; a refresh may be running in the background.
    Stale,
    /// Computed for this request.
    Miss,
}

impl CacheStatus {
    /// Value for an `X-Cache` style response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }

    /// Whether the response came from the cache.
    pub fn is_cached(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dashboard data together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub status: CacheStatus,
}

/// Serves dashboard aggregations through the cache.
pub struct DashboardProvider<S: DashboardSource> {
    cache: Cache,
    source: Arc<S>,
    ttl: Duration,
}

impl<S: DashboardSource> Clone for DashboardProvider<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            source: Arc::clone(&self.source),
            ttl: self.ttl,
        }
    }
}

impl<S: DashboardSource> DashboardProvider<S> {
    /// Create a provider storing results with the cache's default TTL.
    pub fn new(cache: Cache, source: S) -> Self {
        Self {
            cache,
            source: Arc::new(source),
            ttl: Duration::ZERO,
        }
    }

    /// Store results with `ttl` instead of the cache default.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Load the dashboard for a window and source.
    ///
    /// Only a miss can fail: stale and fresh hits never wait on the source.
    pub async fn load(&self, window_days: u32, source: &str) -> Result<Loaded<S::Data>, S::Error> {
        let key = dashboard_key(window_days, source);

        if let Some((data, stale)) = self.cache.get_with_staleness::<S::Data>(&key).await {
            if !stale {
                return Ok(Loaded {
                    data,
                    status: CacheStatus::Hit,
                });
            }

            self.spawn_refresh(key, window_days, source.to_string());
            return Ok(Loaded {
                data,
                status: CacheStatus::Stale,
            });
        }

        let data = self.source.fetch(window_days, source).await?;
        if let Err(e) = self.cache.set(&key, &data, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "failed to cache dashboard data");
        }

        Ok(Loaded {
            data,
            status: CacheStatus::Miss,
        })
    }

    /// Drop every cached dashboard. Returns the number of removed keys.
    pub async fn invalidate(&self) -> usize {
        self.cache.invalidate_by_prefix(&dashboard_prefix()).await
    }

    /// Recompute `key` in the background unless someone already is.
    fn spawn_refresh(&self, key: String, window_days: u32, source: String) {
        let Some(guard) = self.cache.claim_refresh(&key) else {
            tracing::debug!(key = %key, "refresh already running, serving stale");
            return;
        };

        let cache = self.cache.clone();
        let fetcher = Arc::clone(&self.source);
        let ttl = self.ttl;
        tokio::spawn(async move {
            let _guard = guard;
            match fetcher.fetch(window_days, &source).await {
                Ok(data) => {
                    if let Err(e) = cache.set(&key, &data, ttl).await {
                        tracing::warn!(key = %key, error = %e, "failed to store refreshed dashboard data");
                    } else {
                        tracing::debug!(key = %key, "dashboard data refreshed");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "dashboard refresh failed, keeping stale data");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Summary {
        window_days: u32,
        version: u64,
    }

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicU64,
    }

    impl DashboardSource for CountingSource {
        type Data = Summary;
        type Error = String;

        async fn fetch(&self, window_days: u32, source: &str) -> Result<Summary, String> {
            if source == "broken" {
                return Err("query failed".to_string());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            let version = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Summary {
                window_days,
                version,
            })
        }
    }

    fn provider() -> DashboardProvider<CountingSource> {
        let cache = Cache::in_process(CacheConfig::new().cleanup_interval(Duration::ZERO).build());
        DashboardProvider::new(cache, CountingSource::default()).with_ttl(Duration::from_secs(60))
    }

    fn calls(provider: &DashboardProvider<CountingSource>) -> u64 {
        provider.source.calls.load(Ordering::SeqCst)
    }

    async fn wait_for_refresh(cache: &Cache, key: &str) {
        while cache.is_refreshing(key) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit() {
        let provider = provider();

        let first = provider.load(7, "all").await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.data.version, 1);

        let second = provider.load(7, "all").await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.data, first.data);
        assert_eq!(calls(&provider), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_served_while_refreshing_once() {
        let provider = provider();
        provider.load(7, "all").await.unwrap();

        tokio::time::advance(Duration::from_secs(65)).await;

        // Concurrent stale readers all get version 1 immediately
        let loads = load_concurrently(&provider, 8).await;
        for loaded in &loads {
            assert_eq!(loaded.status, CacheStatus::Stale);
            assert_eq!(loaded.data.version, 1);
        }

        wait_for_refresh(provider.cache(), "dashboard:7:all").await;
        assert_eq!(calls(&provider), 2);

        let refreshed = provider.load(7, "all").await.unwrap();
        assert_eq!(refreshed.status, CacheStatus::Hit);
        assert_eq!(refreshed.data.version, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_follows_the_lookup() {
        let provider = provider();
        provider.load(7, "all").await.unwrap();

        tokio::time::advance(Duration::from_secs(65)).await;
        let loaded = provider.load(7, "all").await.unwrap();
        assert_eq!(loaded.status, CacheStatus::Stale);

        // One read per load: the stale hit is the only hit recorded
        let stats = provider.cache().stats();
        assert_eq!((stats.hits, stats.stale_hits, stats.misses), (0, 1, 1));
        assert_eq!(stats.refreshes_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_entry_recomputed_inline() {
        let provider = provider();
        provider.load(1, "x").await.unwrap();

        tokio::time::advance(Duration::from_secs(125)).await;
        let loaded = provider.load(1, "x").await.unwrap();
        assert_eq!(loaded.status, CacheStatus::Miss);
        assert_eq!(loaded.data.version, 2);
    }

    #[tokio::test]
    async fn test_source_error_on_miss() {
        let provider = provider();
        assert_eq!(provider.load(1, "broken").await.unwrap_err(), "query failed");
        assert_eq!(provider.cache().len(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_drops_dashboards_only() {
        let provider = provider();
        provider.load(1, "x").await.unwrap();
        provider.load(7, "y").await.unwrap();
        provider
            .cache()
            .set("alerts:last", &true, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(provider.invalidate().await, 2);
        assert_eq!(provider.cache().len(), Some(1));
        assert_eq!(provider.load(1, "x").await.unwrap().status, CacheStatus::Miss);
    }

    #[test]
    fn test_status_header_values() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        assert_eq!(CacheStatus::Stale.as_str(), "STALE");
        assert!(!CacheStatus::Miss.is_cached());
        assert!(CacheStatus::Stale.is_cached());
    }

    async fn load_concurrently(
        provider: &DashboardProvider<CountingSource>,
        n: usize,
    ) -> Vec<Loaded<Summary>> {
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.load(7, "all").await.unwrap() })
            })
            .collect();

        let mut loads = Vec::with_capacity(n);
        for handle in handles {
            loads.push(handle.await.unwrap());
        }
        loads
    }
}
