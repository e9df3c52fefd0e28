//! TTL key-value cache with per-user key-spacing.
//!
//! Grounded in `cache_layer.rs`'s `LRUCache`/`CacheEntry`/`CacheStats` shape, trimmed
//! to the smaller surface the design calls for: `get/set/has/delete/flush/stats`.
//! Failures are swallowed by the caller's perspective — `get`/`set` never return an
//! error, they return `None`/log-and-continue, so callers always fall through to
//! the authoritative source.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL cache. Keys are namespaced per user by convention: `"<prefix>:<user_id>:..."`.
pub struct Cache {
    default_ttl: Duration,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl Cache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Build a namespaced key: `"<prefix>:<user_id>:<rest>"`.
    pub fn key(prefix: &str, user_id: &str, rest: &str) -> String {
        format!("{prefix}:{user_id}:{rest}")
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let parsed = serde_json::from_slice(&entry.value).ok();
                if parsed.is_some() {
                    self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    crate::metrics::track_cache_hit("lookaside").await;
                } else {
                    self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    crate::metrics::track_cache_miss("lookaside").await;
                }
                parsed
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                crate::metrics::track_cache_miss("lookaside").await;
                None
            }
            None => {
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                crate::metrics::track_cache_miss("lookaside").await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let Ok(bytes) = serde_json::to_vec(value) else {
            tracing::warn!(key, "cache set failed to serialize value");
            return;
        };
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value: bytes, expires_at });
    }

    pub async fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        matches!(entries.get(key), Some(e) if !e.is_expired())
    }

    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Remove every key in a user's namespace (`"<prefix>:<user_id>:..."` for any
    /// prefix), used by the categorization engine to flush at the end of a run.
    pub async fn flush_user(&self, user_id: &str) {
        let needle = format!(":{user_id}:");
        let mut entries = self.entries.write().await;
        entries.retain(|k, _| !k.contains(&needle));
    }

    pub async fn flush(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            keys: self.entries.read().await.len(),
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = Cache::new(Duration::from_secs(60));
        let key = Cache::key("importance", "u1", "e1:subj:sender");
        cache.set(&key, &42i32, None).await;
        let value: Option<i32> = cache.get(&key).await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = Cache::new(Duration::from_millis(10));
        cache.set("k", &"v".to_string(), None).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let value: Option<String> = cache.get("k").await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn flush_user_only_clears_that_users_namespace() {
        let cache = Cache::new(Duration::from_secs(60));
        cache.set(&Cache::key("p", "u1", "a"), &1, None).await;
        cache.set(&Cache::key("p", "u2", "a"), &2, None).await;
        cache.flush_user("u1").await;
        assert!(cache.get::<i32>(&Cache::key("p", "u1", "a")).await.is_none());
        assert_eq!(cache.get::<i32>(&Cache::key("p", "u2", "a")).await, Some(2));
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = Cache::new(Duration::from_secs(60));
        cache.set("k", &1, None).await;
        let _: Option<i32> = cache.get("k").await;
        let _: Option<i32> = cache.get("missing").await;
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 1);
    }
}
