//! In-process key/value cache with per-entry TTL.
//!
//! Fronts product-detail fetches and category product-id listings. Absence is
//! silent — a miss just means the caller goes to the network. Expiry is the
//! only eviction; the pipeline's key space is bounded by the catalog size, so
//! no capacity limit is needed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL'd map shared across tasks via `Arc`.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value, or `None` if absent or expired. Expired
    /// entries are removed lazily on access.
    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but has expired; drop it under the write lock.
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|e| e.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        None
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = TtlCache::new();
        cache
            .set("product:zara:1", vec![1i64, 2, 3], Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("product:zara:1").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let cache: TtlCache<String> = TtlCache::new();
        assert_eq!(cache.get("absent").await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let cache = TtlCache::new();
        cache.set("k", 42u32, Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, Duration::from_secs(60)).await;
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn set_overwrites_existing_value_and_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, Duration::from_millis(10)).await;
        cache.set("k", 2u32, Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get("k").await, Some(2));
    }
}
