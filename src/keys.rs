//! Key-naming helpers.
//!
//! Keys are prefix-structured, `"<namespace>:<param1>:<param2>..."`, so a whole
//! logical dataset can be dropped with one prefix invalidation.

use std::fmt::Display;

/// Separator between a namespace and its parameters.
pub const SEPARATOR: char = ':';

/// Namespace of the dashboard aggregation results.
pub const DASHBOARD_NAMESPACE: &str = "dashboard";

/// Join a namespace and its parameters into a cache key.
///
/// # Example
/// ```
/// use telemetry_cache::keys::cache_key;
///
/// assert_eq!(cache_key("dashboard", ["7", "github"]), "dashboard:7:github");
/// ```
pub fn cache_key<I>(namespace: &str, params: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut key = namespace.to_string();
    for param in params {
        key.push(SEPARATOR);
        key.push_str(&param.to_string());
    }
    key
}

/// The prefix covering every key of `namespace`, e.g. `"dashboard:"`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}{}", namespace, SEPARATOR)
}

/// Key of the dashboard aggregation for a time window and repository source.
pub fn dashboard_key(window_days: u32, source: &str) -> String {
    cache_key(DASHBOARD_NAMESPACE, [window_days.to_string().as_str(), source])
}

/// Prefix covering every dashboard aggregation.
pub fn dashboard_prefix() -> String {
    namespace_prefix(DASHBOARD_NAMESPACE)
}
