//! External store backend over Redis.
//!
//! Every call is bounded by the configured operation timeout and propagates
//! failures to the caller; deciding whether a failure means "miss" belongs to
//! the facade. Expiry is owned by Redis: a record lives exactly `ttl`.

use bytes::Bytes;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use std::future::Future;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 100;

/// Keys per DEL command when removing a scanned batch.
const DELETE_CHUNK: usize = 500;

/// Redis-backed store.
#[derive(Clone)]
pub struct ExternalStore {
    pool: Pool,
    operation_timeout: Duration,
}

impl std::fmt::Debug for ExternalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalStore")
            .field("pool_status", &self.pool.status())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl ExternalStore {
    /// Build the connection pool and prove the server answers `PING` within
    /// the probe timeout.
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let mut redis_config = Config::from_url(config.external_store_address.trim());
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.operation_timeout);
        pool_config.timeouts.create = Some(config.operation_timeout);
        pool_config.timeouts.recycle = Some(config.operation_timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;
        let store = Self {
            pool,
            operation_timeout: config.operation_timeout,
        };

        match tokio::time::timeout(config.probe_timeout, store.ping_inner()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CacheError::Timeout {
                    operation: "PING",
                    after: config.probe_timeout,
                })
            }
        }

        Ok(store)
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> CacheResult<()> {
        self.run("PING", self.ping_inner()).await
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        self.run("GET", async {
            let mut conn = self.pool.get().await?;
            let data: Option<Vec<u8>> = conn.get(key).await?;
            Ok(data.map(Bytes::from))
        })
        .await
    }

    /// Write `value` with a store-enforced expiry of `ttl`.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        // PSETEX rejects 0, so sub-millisecond TTLs round up
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        self.run("SET", async {
            let mut conn = self.pool.get().await?;
            let _: () = conn.pset_ex(key, value, millis).await?;
            Ok(())
        })
        .await
    }

    /// Returns `true` if the key existed.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.run("DEL", async {
            let mut conn = self.pool.get().await?;
            let removed: usize = conn.del(key).await?;
            Ok(removed > 0)
        })
        .await
    }

    /// Keys starting with `prefix`, collected with a cursor-driven `SCAN`
    /// (never `KEYS`). The prefix is matched literally.
    pub async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        self.run("SCAN", async {
            let mut conn = self.pool.get().await?;
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;
                keys.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            // SCAN may return a key more than once
            keys.sort_unstable();
            keys.dedup();
            Ok(keys)
        })
        .await
    }

    /// Delete the given keys. Returns how many existed.
    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run("DEL", async {
            let mut conn = self.pool.get().await?;
            let mut removed = 0;
            for chunk in keys.chunks(DELETE_CHUNK) {
                let n: usize = conn.del(chunk).await?;
                removed += n;
            }
            Ok(removed)
        })
        .await
    }

    async fn ping_inner(&self) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation,
                after: self.operation_timeout,
            }),
        }
    }
}

/// Escape Redis glob metacharacters so `prefix` matches literally.
pub(crate) fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
