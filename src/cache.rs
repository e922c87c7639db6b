//! TTL key-value cache
//!
//! Narrow seam used by the quiz generation workflow to reuse question lists
//! for an hour. Values are JSON so cached content survives type changes at
//! the call site.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Get/put cache with per-entry time-to-live
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a live value, or None when absent or expired
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value for `ttl_secs` seconds
    async fn put(&self, key: &str, value: Value, ttl_secs: u64);
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process cache backed by a mutex-guarded map
///
/// Expired entries are dropped lazily on access.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, value: Value, ttl_secs: u64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = MemoryCache::new();
        cache.put("k", json!({"a": 1}), 60).await;

        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let cache = MemoryCache::new();
        assert!(cache.get("absent").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let cache = MemoryCache::new();
        cache.put("k", json!("v"), 10).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_value() {
        let cache = MemoryCache::new();
        cache.put("k", json!(1), 60).await;
        cache.put("k", json!(2), 60).await;

        assert_eq!(cache.get("k").await, Some(json!(2)));
    }
}
