//! Time-bounded cache for external API payloads
//!
//! Shields the polling loop from redundant requests: analytics and trend
//! payloads are cached under namespaced keys ("analytics_<mint>", "trends")
//! and served until the TTL elapses. Expired and absent entries look the
//! same to callers; stale values stay in memory until the next successful
//! fetch overwrites them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
}

/// TTL-bounded key/value store.
///
/// A single mutex guards both the read-check-return and write paths. The
/// scheduler is the only caller today, so contention is not a concern.
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key. Returns `None` for absent, expired, or undecodable
    /// entries; the stored value is never removed here.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            debug!(key, "cache entry expired");
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "cached value failed to decode");
                None
            }
        }
    }

    /// Store a value under a key, overwriting any previous entry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                debug!(key, error = %e, "value not cacheable");
                return;
            }
        };
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_before_ttl() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("trends", &vec![1.0f64, 2.0]).await;

        let got: Option<Vec<f64>> = cache.get("trends").await;
        assert_eq!(got, Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn test_absent_key_is_miss() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let got: Option<String> = cache.get("analytics_missing").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_but_not_evicted() {
        // Zero TTL: every entry is expired the moment it is read
        let cache = TtlCache::new(Duration::from_secs(0));
        cache.set("analytics_mint", &42u64).await;

        let got: Option<u64> = cache.get("analytics_mint").await;
        assert!(got.is_none());
        // The stale value is untouched until overwritten
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("k", &1u64).await;
        cache.set("k", &2u64).await;

        let got: Option<u64> = cache.get("k").await;
        assert_eq!(got, Some(2));
        assert_eq!(cache.len().await, 1);
    }
}
