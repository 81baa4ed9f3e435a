//! The main cache interface.
//!
//! This module provides the `Cache` facade that consumers use. It owns the
//! backend chosen at construction, the refresh coordinator and, for the
//! in-process backend, the cleanup sweeper.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::{Backend, BackendKind};
use crate::config::{CacheConfig, MAX_TTL};
use crate::entry::EntryState;
use crate::error::{CacheError, CacheResult};
use crate::external::ExternalStore;
use crate::refresh::{RefreshCoordinator, RefreshGuard};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::storage::InProcessStore;
use crate::sweeper::Sweeper;

/// A read-through cache with stale-while-revalidate support.
///
/// Values are encoded as JSON; the cache itself only sees bytes.
///
/// # Backends
/// - **External** (Redis): one hard expiry per record, owned by the server.
///   Entries are never reported stale.
/// - **In-process**: an entry is fresh for `ttl`, stale but still served
///   until `2 * ttl`, then dead.
///
/// The backend is picked once in [`Cache::new`] and never changes. Cloning a
/// `Cache` yields another handle to the same backend, refresh claims and
/// sweeper.
///
/// # Example
/// ```
/// use telemetry_cache::{Cache, CacheConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), telemetry_cache::CacheError> {
/// let cache = Cache::new(CacheConfig::default()).await;
///
/// cache.set("dashboard:7:all", &vec![1, 2, 3], Duration::from_secs(60)).await?;
/// let hit: Option<Vec<u32>> = cache.get("dashboard:7:all").await;
/// assert_eq!(hit, Some(vec![1, 2, 3]));
/// assert!(!cache.is_stale("dashboard:7:all"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    backend: Backend,
    refresh: Arc<RefreshCoordinator>,
    stats: Arc<CacheStats>,
    default_ttl: Duration,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Cache {
    /// Build a cache, selecting the backend from `config`.
    ///
    /// When the external store is enabled and addressed, its pool is created
    /// and probed within the probe timeout. Any failure falls back to the
    /// in-process store with a warning, so construction always succeeds.
    pub async fn new(config: CacheConfig) -> Self {
        if config.uses_external_store() {
            match ExternalStore::connect(&config).await {
                Ok(store) => {
                    tracing::info!("connected to external store for caching");
                    return Self::assemble(
                        Backend::External(store),
                        Arc::new(CacheStats::new()),
                        config.default_ttl,
                        None,
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "external cache store unavailable, using in-process cache"
                    );
                }
            }
        } else {
            tracing::info!("external cache store disabled, using in-process cache");
        }

        Self::in_process(config)
    }

    /// Build a cache on the in-process store without consulting the
    /// external store settings.
    ///
    /// The cleanup sweeper starts if a cleanup interval is configured and a
    /// tokio runtime is running.
    pub fn in_process(config: CacheConfig) -> Self {
        let stats = Arc::new(CacheStats::new());
        let store = Arc::new(InProcessStore::new(Arc::clone(&stats)));
        let sweeper = config
            .cleanup_interval
            .and_then(|interval| Sweeper::spawn(&store, Arc::clone(&stats), interval));

        Self::assemble(
            Backend::InProcess(store),
            stats,
            config.default_ttl,
            sweeper,
        )
    }

    fn assemble(
        backend: Backend,
        stats: Arc<CacheStats>,
        default_ttl: Duration,
        sweeper: Option<Sweeper>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                refresh: Arc::new(RefreshCoordinator::new(Arc::clone(&stats))),
                stats,
                default_ttl,
                sweeper: Mutex::new(sweeper),
            }),
        }
    }

    /// Look up and decode a value.
    ///
    /// Returns `None` when the key is absent, dead, unreadable or fails to
    /// decode. Stale in-process entries are still returned; use
    /// [`is_stale`](Self::is_stale) to decide whether to refresh.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with_staleness(key).await.map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), but also reports whether the value was stale,
    /// observed in the same lookup. Always `false` on the external store.
    pub async fn get_with_staleness<T: DeserializeOwned>(&self, key: &str) -> Option<(T, bool)> {
        let stats = &self.inner.stats;

        let lookup = match self.inner.backend.get(key).await {
            Ok(Some(lookup)) => lookup,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                stats.record_miss();
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                stats.record_miss();
                return None;
            }
        };

        match serde_json::from_slice(&lookup.value) {
            Ok(value) => {
                if lookup.stale {
                    tracing::debug!(key = %key, "cache hit (stale)");
                    stats.record_stale_hit();
                } else {
                    tracing::debug!(key = %key, "cache hit");
                    stats.record_hit();
                }
                Some((value, lookup.stale))
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "cached value could not be decoded, treating as miss"
                );
                stats.record_decode_failure();
                stats.record_miss();
                None
            }
        }
    }

    /// Whether the key exists but is past its soft expiry.
    ///
    /// Always `false` on the external store, which has no soft expiry.
    pub fn is_stale(&self, key: &str) -> bool {
        self.inner.backend.is_stale(key)
    }

    /// Encode and store a value.
    ///
    /// A zero `ttl` uses the configured default; TTLs above [`MAX_TTL`] are
    /// clamped. Encoding and backend write failures are returned; nothing is
    /// retried.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
    {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }

        let ttl = if ttl.is_zero() {
            self.inner.default_ttl
        } else {
            ttl.min(MAX_TTL)
        };
        let encoded = Bytes::from(serde_json::to_vec(value)?);

        self.inner.backend.set(key, encoded, ttl).await?;
        self.inner.stats.record_set();
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        Ok(())
    }

    /// Remove a key. Returns `true` if it existed.
    ///
    /// An external store failure is logged and reported as `false`.
    pub async fn delete(&self, key: &str) -> bool {
        match self.inner.backend.delete(key).await {
            Ok(existed) => {
                if existed {
                    self.inner.stats.record_delete();
                }
                existed
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Remove every key starting with `prefix`, e.g. `"dashboard:"`.
    ///
    /// Returns the number of removed keys; an external store failure is
    /// logged and reported as `0`.
    pub async fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        match self.inner.backend.remove_prefix(prefix).await {
            Ok(removed) => {
                self.inner.stats.record_invalidated(removed);
                tracing::debug!(prefix = %prefix, removed, "cache prefix invalidated");
                removed
            }
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "cache prefix invalidation failed");
                0
            }
        }
    }

    /// Keys currently stored under `prefix`.
    ///
    /// In-process results may include dead entries not yet removed.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.inner.backend.scan_prefix(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "cache prefix scan failed");
                Vec::new()
            }
        }
    }

    /// Claim the refresh of `key`.
    ///
    /// Returns `true` to exactly one caller until
    /// [`finish_refresh`](Self::finish_refresh) is called; everyone else
    /// should keep serving the stale value.
    pub fn try_start_refresh(&self, key: &str) -> bool {
        self.inner.refresh.try_start(key)
    }

    /// Release a refresh claim, whoever holds it.
    pub fn finish_refresh(&self, key: &str) {
        self.inner.refresh.finish(key);
    }

    /// Claim the refresh of `key`, releasing it when the guard drops.
    pub fn claim_refresh(&self, key: &str) -> Option<RefreshGuard> {
        RefreshGuard::claim(&self.inner.refresh, key)
    }

    /// Whether some caller holds the refresh claim for `key`.
    pub fn is_refreshing(&self, key: &str) -> bool {
        self.inner.refresh.is_refreshing(key)
    }

    /// The backend selected at construction.
    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// Check that the backend answers within the operation timeout.
    pub async fn ping(&self) -> CacheResult<()> {
        self.inner.backend.ping().await
    }

    /// TTL applied when `set` receives a zero TTL.
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Lifetime state of an in-process entry. `None` on the external store
    /// or when the key is absent.
    pub fn entry_state(&self, key: &str) -> Option<EntryState> {
        self.inner
            .backend
            .in_process()
            .and_then(|store| store.state(key))
    }

    /// Number of physically present in-process entries, dead ones included.
    /// `None` on the external store.
    pub fn len(&self) -> Option<usize> {
        self.inner.backend.in_process().map(|store| store.len())
    }

    /// Run one sweep immediately. Returns the number of removed entries
    /// (always `0` on the external store).
    pub fn sweep_now(&self) -> usize {
        match self.inner.backend.in_process() {
            Some(store) => {
                let removed = store.cleanup_expired();
                self.inner.stats.record_sweep();
                removed
            }
            None => 0,
        }
    }

    /// Get a snapshot of the cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stop the cleanup sweeper and wait for it to exit.
    ///
    /// The cache stays usable afterwards; dead entries are then only removed
    /// on lookup or by [`sweep_now`](Self::sweep_now). Dropping the last
    /// handle also stops the sweeper.
    pub async fn shutdown(&self) {
        let sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            tracing::debug!("cache shut down");
        }
    }

    /// Whether the cleanup sweeper is running.
    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const TTL: Duration = Duration::from_secs(60);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Summary {
        installs: u64,
        failures: u64,
    }

    fn cache() -> Cache {
        Cache::in_process(CacheConfig::new().cleanup_interval(Duration::ZERO).build())
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = cache();
        let summary = Summary {
            installs: 10,
            failures: 1,
        };

        cache.set("dashboard:1:x", &summary, TTL).await.unwrap();
        assert_eq!(cache.get::<Summary>("dashboard:1:x").await, Some(summary));

        assert!(cache.delete("dashboard:1:x").await);
        assert_eq!(cache.get::<Summary>("dashboard:1:x").await, None);
        assert!(!cache.delete("dashboard:1:x").await);
    }

    #[tokio::test]
    async fn test_cache_is_clone() {
        let cache1 = cache();
        cache1.set("key", "value", TTL).await.unwrap();

        let cache2 = cache1.clone();
        assert_eq!(cache2.get::<String>("key").await, Some("value".to_string()));

        assert!(cache2.try_start_refresh("key"));
        assert!(!cache1.try_start_refresh("key"));
    }

    #[tokio::test]
    async fn test_decode_failure_is_a_miss() {
        let cache = cache();
        cache.set("key", "not a summary", TTL).await.unwrap();

        assert_eq!(cache.get::<Summary>("key").await, None);

        let stats = cache.stats();
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache = cache();
        let err = cache.set("", &1, TTL).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_serialization_failure_returned() {
        use std::collections::HashMap;

        let cache = cache();
        // JSON object keys must be strings
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1u8);

        let err = cache.set("key", &bad, TTL).await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
        assert_eq!(cache.len(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_uses_default() {
        let cache = Cache::in_process(
            CacheConfig::new()
                .default_ttl(Duration::from_secs(10))
                .cleanup_interval(Duration::ZERO)
                .build(),
        );
        cache.set("key", &1, Duration::ZERO).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!cache.is_stale("key"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.is_stale("key"));
        assert_eq!(cache.entry_state("key"), Some(EntryState::Stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_with_staleness() {
        let cache = cache();
        cache.set("key", &1, Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get_with_staleness::<i32>("key").await, Some((1, false)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get_with_staleness::<i32>("key").await, Some((1, true)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get_with_staleness::<i32>("key").await, None);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.stale_hits, stats.misses), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped() {
        let cache = cache();
        cache
            .set("dashboard:1:x", &1u32, Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        assert_eq!(cache.get::<u32>("dashboard:1:x").await, Some(1));
        assert!(!cache.is_stale("dashboard:1:x"));
        assert_eq!(cache.entry_state("dashboard:1:x"), Some(EntryState::Fresh));
    }

    #[tokio::test]
    async fn test_huge_default_ttl_is_clamped() {
        let cache = Cache::in_process(
            CacheConfig::new()
                .default_ttl(Duration::from_secs(u64::MAX / 4))
                .cleanup_interval(Duration::ZERO)
                .build(),
        );
        assert_eq!(cache.default_ttl(), MAX_TTL);

        cache.set("key", &1u32, Duration::ZERO).await.unwrap();
        assert_eq!(cache.get::<u32>("key").await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_now() {
        let cache = cache();
        cache.set("a", &1, Duration::from_secs(1)).await.unwrap();
        cache.set("b", &2, TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep_now(), 1);
        assert_eq!(cache.len(), Some(1));
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeper() {
        let cache = Cache::in_process(CacheConfig::default());
        assert!(cache.is_sweeping());

        cache.shutdown().await;
        assert!(!cache.is_sweeping());

        // Still usable
        cache.set("key", &1, TTL).await.unwrap();
        assert_eq!(cache.get::<i32>("key").await, Some(1));
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let cache = cache();
        cache.set("dashboard:1:a", &1, TTL).await.unwrap();
        cache.set("alerts:1", &2, TTL).await.unwrap();

        assert_eq!(
            cache.keys_with_prefix("dashboard:").await,
            vec!["dashboard:1:a".to_string()]
        );
    }
}
