//! In-process storage backend.
//!
//! A map guarded by a single reader/writer lock. Lookups take the read lock;
//! writes, deletes, prefix invalidation and sweeper passes take the write
//! lock. Nothing here blocks beyond lock contention, so none of these calls
//! are cancellable or async.

use bytes::Bytes;
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::entry::{Entry, EntryState};
use crate::stats::CacheStats;

/// A servable value found by [`InProcessStore::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: Bytes,
    /// Past soft expiry but not yet dead.
    pub stale: bool,
}

/// Thread-safe in-process key/value store with soft and hard expiry.
///
/// Each instance owns its own map; there is no process-wide singleton, so
/// separate caches never observe each other's entries.
#[derive(Debug)]
pub struct InProcessStore {
    /// Single-key removal swaps the last entry into the hole, so scan order is
    /// insertion order only until the first delete.
    entries: RwLock<IndexMap<String, Entry>>,

    stats: Arc<CacheStats>,
}

impl InProcessStore {
    pub fn new(stats: Arc<CacheStats>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            stats,
        }
    }

    /// Look up a servable entry.
    ///
    /// Returns `None` if the key is absent or dead. A dead entry is removed on
    /// the way out.
    pub fn get(&self, key: &str) -> Option<Lookup> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Lookup> {
        {
            let entries = self.read_lock();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_dead_at(now) => {
                    return Some(Lookup {
                        value: entry.value().clone(),
                        stale: entry.is_stale_at(now),
                    });
                }
                Some(_) => {}
            }
        }

        // Dead entry - need the write lock to remove it
        self.remove_dead(key, now);
        None
    }

    /// Whether the key exists and is past its soft expiry.
    ///
    /// Dead entries still report `true`: they exist until removed.
    pub fn is_stale(&self, key: &str) -> bool {
        let now = Instant::now();
        self.read_lock()
            .get(key)
            .is_some_and(|entry| entry.is_stale_at(now))
    }

    /// Lifetime state of the key, if present.
    pub fn state(&self, key: &str) -> Option<EntryState> {
        let now = Instant::now();
        self.read_lock().get(key).map(|entry| entry.state_at(now))
    }

    /// Store a value: stale after `ttl`, dead after `2 * ttl`.
    pub fn set(&self, key: impl Into<String>, value: Bytes, ttl: Duration) {
        let entry = Entry::new(value, ttl);
        self.write_lock().insert(key.into(), entry);
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.write_lock().swap_remove(key).is_some()
    }

    /// Keys starting with `prefix`. Order is unspecified.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        self.read_lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Remove every key starting with `prefix` in one write-locked pass.
    ///
    /// Returns the number of removed entries.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.write_lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Remove every dead entry. Stale entries are kept; they remain servable.
    ///
    /// Returns the number of removed entries.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.write_lock();
        let before = entries.len();
        let now = Instant::now();

        entries.retain(|_, entry| !entry.is_dead_at(now));

        let removed = before - entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    /// Number of physically present entries, dead ones included.
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, IndexMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, IndexMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `key` if it is still dead; a concurrent `set` may have replaced it.
    fn remove_dead(&self, key: &str, now: Instant) {
        let mut entries = self.write_lock();
        if entries.get(key).is_some_and(|entry| entry.is_dead_at(now)) {
            entries.swap_remove(key);
            self.stats.record_expirations(1);
        }
    }
}
