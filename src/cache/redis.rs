//! Redis cache implementation
//!
//! Distributed cache backend for multi-instance deployments. Values are
//! stored as JSON strings with a per-entry TTL; pattern deletion uses
//! SCAN + DEL so it stays safe on large keyspaces.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Redis-backed cache
pub struct RedisCache {
    conn: MultiplexedConnection,
    default_ttl: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl RedisCache {
    /// Connect to Redis with the given default TTL
    pub async fn with_ttl(url: &str, default_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { conn, default_ttl })
    }

    /// Get the default TTL for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("Redis GET failed")?;

        match value {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to deserialize cache value")?,
            )),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        let ttl_secs = if ttl.as_secs() == 0 {
            self.default_ttl.as_secs()
        } else {
            ttl.as_secs()
        };

        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .context("Redis SETEX failed")?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.context("Redis DEL failed")?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut scan_conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = scan_conn
                .scan_match::<_, String>(pattern)
                .await
                .context("Redis SCAN failed")?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            let _: () = conn.del(keys).await.context("Redis DEL failed")?;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .context("Redis FLUSHDB failed")?;
        Ok(())
    }
}
