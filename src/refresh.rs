//! Per-key refresh deduplication.
//!
//! A set of keys currently being recomputed, guarded by its own mutex. The
//! mutex is held only for the check-and-set or the clear, never across the
//! recomputation, and it is separate from the store's lock: losing the race
//! never touches cache data.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::stats::CacheStats;

#[derive(Debug)]
pub struct RefreshCoordinator {
    in_flight: Mutex<HashSet<String>>,
    stats: Arc<CacheStats>,
}

impl RefreshCoordinator {
    pub fn new(stats: Arc<CacheStats>) -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
            stats,
        }
    }

    /// Claim `key`. Returns `true` only to the caller that inserted it; every
    /// other caller gets `false` until [`finish`](Self::finish).
    pub fn try_start(&self, key: &str) -> bool {
        let claimed = self.lock().insert(key.to_string());
        if claimed {
            self.stats.record_refresh_started();
            tracing::debug!(key = %key, "refresh claimed");
        } else {
            self.stats.record_refresh_contended();
        }
        claimed
    }

    /// Release `key` unconditionally.
    pub fn finish(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn is_refreshing(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held refresh claim. Dropping it releases the key, so a recomputation
/// that fails or panics cannot leave the claim behind.
#[derive(Debug)]
#[must_use = "the refresh claim is released as soon as the guard is dropped"]
pub struct RefreshGuard {
    coordinator: Arc<RefreshCoordinator>,
    key: String,
}

impl RefreshGuard {
    pub(crate) fn claim(coordinator: &Arc<RefreshCoordinator>, key: &str) -> Option<Self> {
        coordinator.try_start(key).then(|| Self {
            coordinator: Arc::clone(coordinator),
            key: key.to_string(),
        })
    }

    /// The claimed key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.coordinator.finish(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn coordinator() -> Arc<RefreshCoordinator> {
        Arc::new(RefreshCoordinator::new(Arc::new(CacheStats::new())))
    }

    #[test]
    fn test_claim_and_release() {
        let refresh = coordinator();

        assert!(refresh.try_start("k"));
        assert!(!refresh.try_start("k"));
        assert!(refresh.try_start("other"));

        refresh.finish("k");
        assert!(refresh.try_start("k"));
    }

    #[test]
    fn test_finish_unclaimed_is_noop() {
        let refresh = coordinator();
        refresh.finish("never");
        assert!(!refresh.is_refreshing("never"));
    }

    #[test]
    fn test_exactly_one_concurrent_winner() {
        let refresh = coordinator();
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let refresh = Arc::clone(&refresh);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    refresh.try_start("dashboard:7:all")
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let refresh = coordinator();

        let guard = RefreshGuard::claim(&refresh, "k").unwrap();
        assert_eq!(guard.key(), "k");
        assert!(RefreshGuard::claim(&refresh, "k").is_none());

        drop(guard);
        assert!(!refresh.is_refreshing("k"));
        assert!(RefreshGuard::claim(&refresh, "k").is_some());
    }
}
