//! Configuration for the telemetry cache.
//!
//! This module provides a builder for choosing the backend (external Redis
//! store or in-process map), the default TTL, and the timing knobs for the
//! connectivity probe, external calls and the cleanup sweeper.

use std::time::Duration;

/// Default TTL applied when `set` is called with a zero TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default period of the in-process cleanup sweeper.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default bound on the construction-time connectivity probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default deadline for a single external store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of pooled connections to the external store.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Longest TTL an entry can carry, roughly 30 years. Longer TTLs are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Configuration for creating a new cache instance.
///
/// Use the builder pattern to construct configuration:
///
/// ```
/// use telemetry_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .external_store_address("redis://127.0.0.1:6379")
///     .enable_external_store(true)
///     .default_ttl(Duration::from_secs(60))
///     .build();
///
/// assert!(config.uses_external_store());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Connection URL of the external store. Empty disables it.
    pub(crate) external_store_address: String,

    /// Whether the external store should be attempted at all.
    pub(crate) enable_external_store: bool,

    /// TTL substituted when a caller passes a zero TTL.
    pub(crate) default_ttl: Duration,

    /// Period of the in-process sweeper. `None` disables it.
    pub(crate) cleanup_interval: Option<Duration>,

    /// Bound on the construction-time probe.
    pub(crate) probe_timeout: Duration,

    /// Deadline applied to every external store call.
    pub(crate) operation_timeout: Duration,

    /// Maximum pooled connections to the external store.
    pub(crate) pool_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            external_store_address: String::new(),
            enable_external_store: false,
            default_ttl: DEFAULT_TTL,
            cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the external store connection URL (e.g. `redis://host:6379/0`).
    ///
    /// An empty address disables the external store regardless of
    /// [`enable_external_store`](Self::enable_external_store).
    pub fn external_store_address(mut self, address: impl Into<String>) -> Self {
        self.external_store_address = address.into();
        self
    }

    /// Enable or disable the external store.
    pub fn enable_external_store(mut self, enabled: bool) -> Self {
        self.enable_external_store = enabled;
        self
    }

    /// Set the default TTL.
    ///
    /// A zero TTL would make every entry stale on arrival, so it is ignored
    /// and the built-in default is kept. TTLs above [`MAX_TTL`] are clamped.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = if ttl.is_zero() {
            DEFAULT_TTL
        } else {
            ttl.min(MAX_TTL)
        };
        self
    }

    /// Set the interval of the in-process cleanup sweeper.
    ///
    /// `Duration::ZERO` disables the sweeper; dead entries are then only
    /// removed when a lookup finds them.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Set the bound on the connectivity probe run at construction.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the deadline applied to each external store call.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the external store connection pool size. Zero keeps the default.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = if size == 0 { DEFAULT_POOL_SIZE } else { size };
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Whether construction should attempt the external store.
    pub fn uses_external_store(&self) -> bool {
        self.enable_external_store && !self.external_store_address.trim().is_empty()
    }

    /// Get the default TTL.
    pub fn get_default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get the cleanup interval, if the sweeper is enabled.
    pub fn get_cleanup_interval(&self) -> Option<Duration> {
        self.cleanup_interval
    }

    /// Get the external store address.
    pub fn get_external_store_address(&self) -> &str {
        &self.external_store_address
    }
}
