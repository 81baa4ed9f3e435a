//! # Telemetry Cache
//!
//! A read-through cache for the telemetry reporting service, sitting in front
//! of the expensive dashboard-aggregation query.
//!
//! ## Features
//!
//! - **Two backends**: Redis when configured and reachable, otherwise an
//!   in-process map. The choice is made once at construction and never fails.
//! - **Stale-while-revalidate**: in-process entries stay servable for twice
//!   their TTL and report staleness after the first TTL.
//! - **Refresh deduplication**: at most one concurrent recomputation per key.
//! - **Background cleanup**: an owned, stoppable sweeper removes dead entries.
//! - **Payload-agnostic**: values go in and out through serde (JSON bytes).
//!
//! ## Quick Start
//!
//! ```rust
//! use telemetry_cache::{keys, Cache, CacheConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), telemetry_cache::CacheError> {
//! let config = CacheConfig::new()
//!     .external_store_address("")
//!     .default_ttl(Duration::from_secs(300))
//!     .build();
//!
//! let cache = Cache::new(config).await;
//! let key = keys::dashboard_key(7, "github");
//!
//! cache.set(&key, &[3, 1, 4], Duration::ZERO).await?;
//! if let Some(values) = cache.get::<Vec<u32>>(&key).await {
//!     println!("Found: {:?}", values);
//! }
//!
//! // Stale-while-revalidate: serve what we have, refresh once in the background
//! if cache.is_stale(&key) && cache.try_start_refresh(&key) {
//!     // ... recompute and `set` ...
//!     cache.finish_refresh(&key);
//! }
//!
//! cache.invalidate_by_prefix(&keys::dashboard_prefix()).await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod provider;
pub mod refresh;
pub mod stats;

pub use backend::BackendKind;
pub use cache::Cache;
pub use config::CacheConfig;
pub use entry::EntryState;
pub use error::{CacheError, CacheResult};
pub use provider::{CacheStatus, DashboardProvider, DashboardSource, Loaded};
pub use refresh::RefreshGuard;
pub use stats::{CacheStats, StatsSnapshot};

// Internal modules - not part of public API
pub(crate) mod entry;
pub(crate) mod external;
pub(crate) mod storage;
pub(crate) mod sweeper;
