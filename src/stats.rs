//! Statistics for the cache.
//!
//! Atomic counters recorded by the facade, the in-process store and the
//! sweeper. They are observational only and never feed back into behavior.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache operations.
///
/// All counters are atomic and can be safely updated from multiple tasks.
/// Use `Cache::stats()` to get a snapshot of the current values.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups served a fresh value.
    hits: AtomicU64,

    /// Lookups served a value past its soft expiry.
    stale_hits: AtomicU64,

    /// Lookups that found nothing servable.
    misses: AtomicU64,

    /// Stored bytes that could not be decoded (counted as misses too).
    decode_failures: AtomicU64,

    /// Successful set operations.
    sets: AtomicU64,

    /// Keys removed by explicit delete.
    deletes: AtomicU64,

    /// Keys removed by prefix invalidation.
    invalidated: AtomicU64,

    /// Dead entries removed, lazily or by the sweeper.
    expirations: AtomicU64,

    /// Completed sweeper passes.
    sweeps: AtomicU64,

    /// Refresh claims granted.
    refreshes_started: AtomicU64,

    /// Refresh claims refused because another caller held the key.
    refreshes_contended: AtomicU64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidated(&self, count: usize) {
        self.invalidated.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_started(&self) {
        self.refreshes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_contended(&self) {
        self.refreshes_contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn stale_hits(&self) -> u64 {
        self.stale_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    ///
    /// Stale hits count as hits: the caller was served without waiting on a
    /// recomputation. Returns 0.0 if no lookups have been performed.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits() + self.stale_hits();
        let total = served + self.misses();
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            stale_hits: self.stale_hits(),
            misses: self.misses(),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            expirations: self.expirations(),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refreshes_contended: self.refreshes_contended.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time snapshot of cache statistics.
///
/// Unlike `CacheStats`, this struct contains plain values (not atomics)
/// and can be easily serialized or logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub decode_failures: u64,
    pub sets: u64,
    pub deletes: u64,
    pub invalidated: u64,
    pub expirations: u64,
    pub sweeps: u64,
    pub refreshes_started: u64,
    pub refreshes_contended: u64,
    pub hit_rate: f64,
}
