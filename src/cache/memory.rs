//! In-memory cache implementation using moka
//!
//! Provides a fast, thread-safe in-memory cache with TTL support.
//!
//! # Features
//! - Bounded capacity with TTL-based eviction
//! - Glob-style pattern matching for bulk deletion
//! - Thread-safe concurrent access

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries (1 hour)
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache entry wrapper that stores serialized JSON data.
/// This allows us to store any serializable type in the cache.
#[derive(Clone)]
struct CacheEntry {
    /// JSON-serialized value
    data: Arc<String>,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// In-memory cache using moka
///
/// Values are stored as JSON strings to support generic types.
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a new memory cache with default settings
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a new memory cache with custom capacity and default TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .support_invalidation_closures()
            .build();

        Self { cache, default_ttl }
    }

    /// Get the default TTL for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Check if a pattern matches a key using glob-style matching
    ///
    /// Supports:
    /// - `*` matches any sequence of characters
    /// - `?` matches any single character
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern_chars: Vec<char> = pattern.chars().collect();
        let key_chars: Vec<char> = key.chars().collect();
        Self::glob_match(&pattern_chars, &key_chars, 0, 0)
    }

    fn glob_match(pattern: &[char], key: &[char], pi: usize, ki: usize) -> bool {
        if pi == pattern.len() {
            return ki == key.len();
        }

        match pattern[pi] {
            '*' => {
                // Zero characters, then one or more
                if Self::glob_match(pattern, key, pi + 1, ki) {
                    return true;
                }
                ki < key.len() && Self::glob_match(pattern, key, pi, ki + 1)
            }
            '?' => ki < key.len() && Self::glob_match(pattern, key, pi + 1, ki + 1),
            c => ki < key.len() && key[ki] == c && Self::glob_match(pattern, key, pi + 1, ki + 1),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        _ttl: Duration,
    ) -> Result<()> {
        // moka applies the cache-wide TTL; the per-call TTL parameter exists
        // for the Redis backend
        let entry = CacheEntry::new(value)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let pattern = pattern.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| Self::pattern_matches(&pattern, key))
            .map_err(|e| anyhow::anyhow!("Failed to invalidate cache entries: {}", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache
            .set("key", &42i64, Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<i64> = cache.get("key").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let cache = MemoryCache::new();
        let value: Option<String> = cache.get("missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache
            .set("key", &"value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("key").await.unwrap();

        let value: Option<String> = cache.get("key").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        cache
            .set("accounts:1", &1i64, Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("accounts:2", &2i64, Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("budgets:1", &3i64, Duration::from_secs(60))
            .await
            .unwrap();

        cache.delete_pattern("accounts:*").await.unwrap();
        // Invalidation closures apply lazily; reads see the effect immediately
        let a1: Option<i64> = cache.get("accounts:1").await.unwrap();
        let a2: Option<i64> = cache.get("accounts:2").await.unwrap();
        let b1: Option<i64> = cache.get("budgets:1").await.unwrap();

        assert!(a1.is_none());
        assert!(a2.is_none());
        assert_eq!(b1, Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1i64, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2i64, Duration::from_secs(60)).await.unwrap();

        cache.clear().await.unwrap();

        let a: Option<i64> = cache.get("a").await.unwrap();
        let b: Option<i64> = cache.get("b").await.unwrap();
        assert!(a.is_none());
        assert!(b.is_none());
    }

    #[tokio::test]
    async fn test_complex_values_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Snapshot {
            rows: Vec<String>,
            total: f64,
        }

        let cache = MemoryCache::new();
        let snapshot = Snapshot {
            rows: vec!["1000".into(), "4000".into()],
            total: 150.0,
        };
        cache
            .set("tb:1:1", &snapshot, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded: Option<Snapshot> = cache.get("tb:1:1").await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(MemoryCache::pattern_matches("accounts:*", "accounts:123"));
        assert!(MemoryCache::pattern_matches("*", "anything"));
        assert!(MemoryCache::pattern_matches("tb:?:1", "tb:9:1"));
        assert!(!MemoryCache::pattern_matches("accounts:*", "budgets:1"));
        assert!(!MemoryCache::pattern_matches("tb:?:1", "tb:10:1"));
    }
}
