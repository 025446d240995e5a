//! String-keyed TTL cache
//!
//! Backs the wilaya/commune reference lists and the per-tracking status
//! snapshots. Read-through callers fetch on miss and insert; writes are
//! idempotent overwrites of the same key, so concurrent misses are allowed to
//! both fetch (no single-flight). Time comes from `tokio::time`, so tests can
//! pause and advance the clock.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    cached_at: Instant,
}

/// TTL cache with string keys.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached value if present and unexpired. Expired entries
    /// are evicted on access.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if Instant::now().duration_since(entry.cached_at) < self.ttl {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Stores `value` under `key`, resetting its TTL.
    pub async fn insert(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    /// Removes expired entries, returning how many were dropped.
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| Instant::now().duration_since(entry.cached_at) < self.ttl);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("wilayas", vec![1, 2, 3]).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("wilayas").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_after_expiry() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("TRK1", "en_cours").await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("TRK1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_resets_ttl() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("TRK1", "en_cours").await;

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.insert("TRK1", "livré").await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.get("TRK1").await, Some("livré"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_only_expired() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("old", 1).await;
        tokio::time::advance(Duration::from_secs(20)).await;
        cache.insert("fresh", 2).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.get("fresh").await, Some(2));
    }
}
