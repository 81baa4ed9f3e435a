//! Command-line interface definitions.
//!
//! This module defines the CLI structure for the `telemetry-cache` tool
//! using clap. Backend options may also come from the environment.

use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::config::CacheConfig;

/// Telemetry cache tool.
///
/// Builds a cache exactly as the reporting service would and runs one
/// operation against it. Most useful with an external store, whose contents
/// outlive the process.
#[derive(Parser, Debug)]
#[command(name = "telemetry-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// The command to execute.
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Backend selection options.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// External store URL (e.g. redis://127.0.0.1:6379). Empty disables it.
    #[arg(long, env = "TELEMETRY_CACHE_REDIS_URL", default_value = "", global = true)]
    pub redis_url: String,

    /// Use the external store when an address is configured.
    #[arg(long, env = "TELEMETRY_CACHE_ENABLE_REDIS", global = true)]
    pub enable_redis: bool,

    /// Default TTL in seconds, used when a set passes no TTL.
    #[arg(long, env = "TELEMETRY_CACHE_DEFAULT_TTL_SECS", default_value_t = 300, global = true)]
    pub default_ttl_secs: u64,
}

impl BackendArgs {
    /// Translate the options into a cache configuration.
    pub fn to_config(&self) -> CacheConfig {
        CacheConfig::new()
            .external_store_address(self.redis_url.clone())
            .enable_external_store(self.enable_redis)
            .default_ttl(Duration::from_secs(self.default_ttl_secs))
            .build()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Report which backend the cache selected.
    Probe,

    /// Print the JSON value stored at a key.
    Get {
        /// The key to look up.
        key: String,
    },

    /// Store a JSON value at a key.
    Set {
        /// The key to store the value under.
        key: String,
        /// The value, as JSON.
        value: String,
        /// TTL in seconds; 0 uses the default TTL.
        #[arg(long, default_value_t = 0)]
        ttl_secs: u64,
    },

    /// Delete a key.
    Delete {
        /// The key to delete.
        key: String,
    },

    /// Report whether a key is past its soft expiry.
    Stale {
        /// The key to check.
        key: String,
    },

    /// Delete every key starting with a prefix.
    Invalidate {
        /// Key prefix, e.g. "dashboard:".
        prefix: String,
    },

    /// Print cache statistics as JSON.
    Stats,
}
