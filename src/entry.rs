//! In-process cache entry with soft and hard expiry.

use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::MAX_TTL;

/// Where an entry sits in its lifetime at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// `now < soft_expiry`.
    Fresh,
    /// `soft_expiry <= now < hard_expiry`. Still served, but due for a refresh.
    Stale,
    /// `now >= hard_expiry`. Never served; eligible for removal.
    Dead,
}

/// A single in-process cache entry.
///
/// Timestamps use `tokio::time::Instant` so a paused runtime clock drives
/// expiry in tests.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The encoded payload.
    pub(crate) value: Bytes,

    /// After this point the entry is stale: `created + ttl`.
    pub(crate) soft_expiry: Instant,

    /// After this point the entry is dead: `created + 2 * ttl`.
    pub(crate) hard_expiry: Instant,
}

impl Entry {
    /// Create an entry written now with the given TTL.
    pub fn new(value: Bytes, ttl: Duration) -> Self {
        Self::created_at(value, ttl, Instant::now())
    }

    /// Create an entry as if written at `created`.
    ///
    /// `ttl` is clamped to [`MAX_TTL`]; expiries saturate instead of
    /// overflowing the clock.
    pub fn created_at(value: Bytes, ttl: Duration, created: Instant) -> Self {
        let ttl = ttl.min(MAX_TTL);
        let soft_expiry = created.checked_add(ttl).unwrap_or(created);
        let hard_expiry = soft_expiry.checked_add(ttl).unwrap_or(soft_expiry);
        Self {
            value,
            soft_expiry,
            hard_expiry,
        }
    }

    /// Lifetime state at `now`.
    pub fn state_at(&self, now: Instant) -> EntryState {
        if self.is_dead_at(now) {
            EntryState::Dead
        } else if self.is_stale_at(now) {
            EntryState::Stale
        } else {
            EntryState::Fresh
        }
    }

    /// Whether the entry is past its soft expiry at `now` (dead entries included).
    pub fn is_stale_at(&self, now: Instant) -> bool {
        now >= self.soft_expiry
    }

    /// Whether the entry is past its hard expiry at `now`.
    pub fn is_dead_at(&self, now: Instant) -> bool {
        now >= self.hard_expiry
    }

    /// Get a reference to the value.
    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_expiry_is_twice_ttl() {
        let created = Instant::now();
        let ttl = Duration::from_secs(60);
        let entry = Entry::created_at(Bytes::from("v"), ttl, created);

        assert_eq!(entry.soft_expiry, created + ttl);
        assert_eq!(entry.hard_expiry, created + ttl * 2);
    }

    #[test]
    fn test_state_transitions() {
        let created = Instant::now();
        let entry = Entry::created_at(Bytes::from("v"), Duration::from_secs(60), created);

        assert_eq!(entry.state_at(created), EntryState::Fresh);
        assert_eq!(
            entry.state_at(created + Duration::from_secs(59)),
            EntryState::Fresh
        );
        assert_eq!(
            entry.state_at(created + Duration::from_secs(60)),
            EntryState::Stale
        );
        assert_eq!(
            entry.state_at(created + Duration::from_secs(119)),
            EntryState::Stale
        );
        assert_eq!(
            entry.state_at(created + Duration::from_secs(120)),
            EntryState::Dead
        );
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let created = Instant::now();
        let entry = Entry::created_at(Bytes::from("v"), Duration::from_secs(u64::MAX), created);

        assert_eq!(entry.soft_expiry, created + MAX_TTL);
        assert_eq!(entry.hard_expiry, created + MAX_TTL * 2);
        assert_eq!(
            entry.state_at(created + Duration::from_secs(86_400 * 365)),
            EntryState::Fresh
        );
    }

    #[test]
    fn test_dead_entry_is_also_stale() {
        let created = Instant::now();
        let entry = Entry::created_at(Bytes::from("v"), Duration::from_secs(1), created);
        let later = created + Duration::from_secs(5);

        assert!(entry.is_dead_at(later));
        assert!(entry.is_stale_at(later));
    }
}
