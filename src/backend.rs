//! The two storage backends behind one capability set.
//!
//! The variant is picked once when the cache is built and never changes.
//! Enum dispatch keeps the set closed: there are exactly two stores.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheResult;
use crate::external::ExternalStore;
use crate::storage::{InProcessStore, Lookup};

/// Which backend a cache instance selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Networked Redis store; single hard expiry, no staleness.
    External,
    /// Lock-guarded map in this process; soft and hard expiry.
    InProcess,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::External => "external",
            BackendKind::InProcess => "in-process",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Backend {
    External(ExternalStore),
    InProcess(Arc<InProcessStore>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::External(_) => BackendKind::External,
            Backend::InProcess(_) => BackendKind::InProcess,
        }
    }

    /// Fetch a servable value. External records are never stale.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Lookup>> {
        match self {
            Backend::External(store) => Ok(store
                .get(key)
                .await?
                .map(|value| Lookup { value, stale: false })),
            Backend::InProcess(store) => Ok(store.get(key)),
        }
    }

    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        match self {
            Backend::External(store) => store.set(key, &value, ttl).await,
            Backend::InProcess(store) => {
                store.set(key, value, ttl);
                Ok(())
            }
        }
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self {
            Backend::External(store) => store.delete(key).await,
            Backend::InProcess(store) => Ok(store.delete(key)),
        }
    }

    pub async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        match self {
            Backend::External(store) => store.scan_prefix(prefix).await,
            Backend::InProcess(store) => Ok(store.scan_prefix(prefix)),
        }
    }

    /// Remove every key under `prefix`.
    ///
    /// The external store scans then deletes; the in-process map filters in a
    /// single write-locked pass.
    pub async fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        match self {
            Backend::External(store) => {
                let keys = store.scan_prefix(prefix).await?;
                store.delete_many(&keys).await
            }
            Backend::InProcess(store) => Ok(store.remove_prefix(prefix)),
        }
    }

    /// Check the backend answers. Always succeeds in-process.
    pub async fn ping(&self) -> CacheResult<()> {
        match self {
            Backend::External(store) => store.ping().await,
            Backend::InProcess(_) => Ok(()),
        }
    }

    /// Soft expiry only exists in-process.
    pub fn is_stale(&self, key: &str) -> bool {
        match self {
            Backend::External(_) => false,
            Backend::InProcess(store) => store.is_stale(key),
        }
    }

    pub fn in_process(&self) -> Option<&Arc<InProcessStore>> {
        match self {
            Backend::External(_) => None,
            Backend::InProcess(store) => Some(store),
        }
    }
}
