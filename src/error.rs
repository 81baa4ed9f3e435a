//! Error types for the telemetry cache.
//!
//! Only writes surface errors to callers. Read paths (`get`, `delete`,
//! prefix invalidation) degrade to a miss or a no-op and log instead, so the
//! variants here describe what can go wrong while storing a value or while
//! talking to the external store directly.

use std::time::Duration;

use deadpool_redis::redis::RedisError;
use thiserror::Error;

/// The main error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be encoded before storing it.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The external store rejected a command or the connection failed.
    #[error("external store error: {0}")]
    Backend(#[from] RedisError),

    /// No connection could be taken from the external store's pool.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// An external store call did not complete before its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The external store configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The provided key is invalid (empty).
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Pool(err.to_string())
    }
}

impl From<deadpool_redis::CreatePoolError> for CacheError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        CacheError::InvalidConfig(err.to_string())
    }
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidKey("key must not be empty".to_string());
        assert_eq!(format!("{}", err), "invalid key: key must not be empty");

        let err = CacheError::Timeout {
            operation: "GET",
            after: Duration::from_secs(2),
        };
        assert_eq!(format!("{}", err), "GET timed out after 2s");

        let err = CacheError::InvalidConfig("bad url".to_string());
        assert_eq!(format!("{}", err), "invalid configuration: bad url");
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let cache_err: CacheError = json_err.into();
        assert!(matches!(cache_err, CacheError::Serialization(_)));
    }
}
