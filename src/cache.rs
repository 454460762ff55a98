use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory TTL cache with LRU eviction.
///
/// Values are stored JSON-serialized. Expired entries are dropped on access;
/// there is no background sweeper. Injected wherever a short-lived result
/// cache fronts the external lookup or the per-diet totals, and every write
/// that can change a cached answer removes the key first.
#[derive(Clone)]
pub struct Cache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    default_ttl: Duration,
}

impl Cache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let capacity =
            NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1000).expect("nonzero"));
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        let serialized = serde_json::to_vec(value)?;
        self.store
            .write()
            .await
            .push(key.to_string(), CacheEntry::new(serialized, ttl));
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        // LruCache::get is mutable (updates recency), so take the write lock.
        let mut store = self.store.write().await;
        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                None
            }
            Some(entry) => match serde_json::from_slice(&entry.data) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "dropping undecodable cache entry");
                    store.pop(key);
                    None
                }
            },
            None => None,
        }
    }

    pub async fn remove(&self, key: &str) {
        self.store.write().await.pop(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Cache {
        Cache::new(16, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = cache();
        cache
            .set("food_info:apple", &vec!["a", "b"], Duration::from_secs(60))
            .await
            .unwrap();
        let hit: Option<Vec<String>> = cache.get("food_info:apple").await;
        assert_eq!(hit, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let cache = cache();
        cache
            .set("food_info:apple", &1u32, Duration::ZERO)
            .await
            .unwrap();
        let hit: Option<u32> = cache.get("food_info:apple").await;
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn remove_deletes_the_entry() {
        let cache = cache();
        cache
            .set("diet_totals:abc", &42u32, Duration::from_secs(60))
            .await
            .unwrap();
        cache.remove("diet_totals:abc").await;
        let hit: Option<u32> = cache.get("diet_totals:abc").await;
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache = Cache::new(2, Duration::from_secs(600));
        cache.set("a", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2u32, Duration::from_secs(60)).await.unwrap();
        let _: Option<u32> = cache.get("a").await;
        cache.set("c", &3u32, Duration::from_secs(60)).await.unwrap();
        let b: Option<u32> = cache.get("b").await;
        let a: Option<u32> = cache.get("a").await;
        assert_eq!(b, None);
        assert_eq!(a, Some(1));
    }
}
