//! Telemetry cache tool.
//!
//! Builds a cache from flags or environment and runs a single command:
//!
//! ```bash
//! telemetry-cache --enable-redis --redis-url redis://127.0.0.1:6379 probe
//! telemetry-cache set dashboard:7:all '{"installs":42}' --ttl-secs 60
//! telemetry-cache invalidate dashboard:
//! ```

use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use telemetry_cache::cli::{CacheCommand, Cli};
use telemetry_cache::Cache;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let cache = Cache::new(args.backend.to_config()).await;

    match args.command {
        CacheCommand::Probe => {
            println!("backend: {}", cache.backend_kind());
            match cache.ping().await {
                Ok(()) => println!("status: reachable"),
                Err(e) => println!("status: {}", e),
            }
            println!("default ttl: {}s", cache.default_ttl().as_secs());
        }

        CacheCommand::Get { key } => match cache.get::<serde_json::Value>(&key).await {
            Some(value) => {
                let stale = if cache.is_stale(&key) { " (stale)" } else { "" };
                println!("{}{}", value, stale);
            }
            None => println!("Key '{}' not found", key),
        },

        CacheCommand::Set {
            key,
            value,
            ttl_secs,
        } => {
            let value: serde_json::Value = serde_json::from_str(&value)?;
            cache.set(&key, &value, Duration::from_secs(ttl_secs)).await?;
            println!("Set key '{}'", key);
        }

        CacheCommand::Delete { key } => {
            if cache.delete(&key).await {
                println!("Deleted key '{}'", key);
            } else {
                println!("Key '{}' not found", key);
            }
        }

        CacheCommand::Stale { key } => {
            println!("{}", cache.is_stale(&key));
        }

        CacheCommand::Invalidate { prefix } => {
            let removed = cache.invalidate_by_prefix(&prefix).await;
            println!("Removed {} key(s) under '{}'", removed, prefix);
        }

        CacheCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
    }

    cache.shutdown().await;
    Ok(())
}
