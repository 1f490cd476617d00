//! Response cache for generation results.
//!
//! Memoizes the raw model text per (word, eras, example count) so repeated
//! requests skip the network. Only text that already parsed cleanly is
//! stored.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Cache key for one generation request.
///
/// Hashing is the derived `Hash` over all three fields; `eras` keeps the
/// caller's order, so the same eras in a different order are a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Trimmed, lowercased word.
    pub word: String,

    /// Era labels in request order.
    pub eras: Vec<String>,

    /// Requested examples per era.
    pub num_examples: usize,
}

impl CacheKey {
    /// Create a new cache key.
    pub fn new(word: impl Into<String>, eras: &[String], num_examples: usize) -> Self {
        Self {
            word: word.into(),
            eras: eras.to_vec(),
            num_examples,
        }
    }
}

/// Process-wide, bounded, least-recently-used cache of raw responses.
pub struct ResponseCache {
    entries: Mutex<LruCache<CacheKey, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` responses.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a response, marking it as most recently used.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let found = self.entries.lock().await.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Response cache hit for '{}'", key.word);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a response, evicting the least recently used one when full.
    pub async fn put(&self, key: CacheKey, raw: String) {
        let inserted = key.clone();
        // `push` also hands back the previous value when the key was already present
        let displaced = self.entries.lock().await.push(key, raw);
        if let Some((evicted, _)) = displaced.filter(|(old, _)| *old != inserted) {
            debug!("Evicted cached response for '{}'", evicted.word);
        }
    }

    /// Check whether a key is cached, without touching its recency.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().await.contains(key)
    }

    /// Number of cached responses.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
        info!("Cleared response cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub capacity: usize,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that found nothing.
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(word: &str) -> CacheKey {
        CacheKey::new(word, &["1900s".to_string(), "2020s".to_string()], 5)
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = ResponseCache::new(10);
        cache.put(key("privacy"), "{}".to_string()).await;

        assert_eq!(cache.get(&key("privacy")).await, Some("{}".to_string()));
        assert_eq!(cache.get(&key("freedom")).await, None);

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_era_order_is_part_of_the_key() {
        let cache = ResponseCache::new(10);
        cache.put(key("privacy"), "{}".to_string()).await;

        let reversed = CacheKey::new("privacy", &["2020s".to_string(), "1900s".to_string()], 5);
        assert!(!cache.contains(&reversed).await);

        let other_count = CacheKey::new("privacy", &["1900s".to_string(), "2020s".to_string()], 6);
        assert!(!cache.contains(&other_count).await);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let cache = ResponseCache::new(2);
        cache.put(key("a"), "a".to_string()).await;
        cache.put(key("b"), "b".to_string()).await;

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get(&key("a")).await.is_some());
        cache.put(key("c"), "c".to_string()).await;

        assert!(cache.contains(&key("a")).await);
        assert!(!cache.contains(&key("b")).await);
        assert!(cache.contains(&key("c")).await);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_still_holds_one() {
        let cache = ResponseCache::new(0);
        cache.put(key("a"), "a".to_string()).await;
        assert_eq!(cache.stats().await.capacity, 1);
        assert!(!cache.is_empty().await);
    }
}
