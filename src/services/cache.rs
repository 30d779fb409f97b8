use async_trait::async_trait;
use moka::Expiry;
use redis::aio::ConnectionManager;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Short-lived key/value storage with per-entry TTL
///
/// Values are opaque strings (JSON in practice). Entries disappear on
/// their own once the TTL passes; nothing deletes them explicitly.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch several keys; the result is positionally aligned with `keys`
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set_many(&self, entries: Vec<(String, String)>, ttl: Duration) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }
}

/// Value held by the in-process tiers together with its own lifetime
#[derive(Debug, Clone)]
struct KvEntry {
    payload: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
struct EntryExpiry;

impl Expiry<String, KvEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &KvEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &KvEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

fn entry_cache(capacity: u64) -> moka::future::Cache<String, KvEntry> {
    moka::future::Cache::builder()
        .max_capacity(capacity)
        .expire_after(EntryExpiry)
        .build()
}

/// Multi-tier cache manager
///
/// Implements L1 (in-memory) and L2 (Redis) caching strategy.
/// L1 is fastest but local to this process, L2 is shared across instances.
/// An L1 entry never outlives the TTL it was written with, and is further
/// capped at `l1_ttl` so other instances' writes become visible quickly.
pub struct CacheManager {
    redis: ConnectionManager,
    l1_cache: moka::future::Cache<String, KvEntry>,
    l1_ttl: Duration,
}

impl CacheManager {
    /// Create a new cache manager
    pub async fn new(redis_url: &str, l1_size: u64, l1_ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis,
            l1_cache: entry_cache(l1_size),
            l1_ttl: Duration::from_secs(l1_ttl_secs),
        })
    }

    async fn remember(&self, key: &str, payload: String, ttl: Duration) {
        let ttl = ttl.min(self.l1_ttl);
        if !ttl.is_zero() {
            self.l1_cache
                .insert(key.to_string(), KvEntry { payload, ttl })
                .await;
        }
    }

    /// Number of entries currently held in L1
    pub fn l1_size(&self) -> u64 {
        self.l1_cache.entry_count()
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl KvStore for CacheManager {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(entry.payload));
        }

        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        match &value {
            Some(_) => tracing::trace!("L2 cache hit: {}", key),
            None => tracing::trace!("Cache miss: {}", key),
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("PSETEX")
            .arg(key)
            .arg(ttl_millis(ttl))
            .arg(&value)
            .query_async(&mut conn)
            .await?;

        self.remember(key, value, ttl).await;
        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Option<String>> = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            match self.l1_cache.get(key).await {
                Some(entry) => values.push(Some(entry.payload)),
                None => {
                    values.push(None);
                    missing.push(index);
                }
            }
        }

        if missing.is_empty() {
            return Ok(values);
        }

        let missing_keys: Vec<&str> = missing.iter().map(|&i| keys[i].as_str()).collect();
        let mut conn = self.redis.clone();
        let fetched: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&missing_keys)
            .query_async(&mut conn)
            .await?;

        for (index, value) in missing.into_iter().zip(fetched) {
            values[index] = value;
        }

        Ok(values)
    }

    async fn set_many(&self, entries: Vec<(String, String)>, ttl: Duration) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            pipe.cmd("PSETEX").arg(key).arg(ttl_millis(ttl)).arg(value).ignore();
        }

        let mut conn = self.redis.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        for (key, value) in entries {
            self.remember(&key, value, ttl).await;
        }

        Ok(())
    }
}

/// In-process key/value store
///
/// Used by tests and by single-instance deployments without Redis.
pub struct MemoryKv {
    entries: moka::future::Cache<String, KvEntry>,
}

impl MemoryKv {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: entry_cache(capacity),
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.payload))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), KvEntry { payload: value, ttl })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_kv_set_get() {
        let kv = MemoryKv::default();
        kv.set("k", "v".to_string(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(kv.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_kv_entry_expires() {
        let kv = MemoryKv::default();
        kv.set("short", "v".to_string(), Duration::from_millis(50)).await.unwrap();
        kv.set("long", "v".to_string(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(kv.get("short").await.unwrap(), None);
        assert_eq!(kv.get("long").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_memory_kv_get_many_aligned() {
        let kv = MemoryKv::default();
        kv.set_many(
            vec![("a".to_string(), "1".to_string()), ("c".to_string(), "3".to_string())],
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = kv.get_many(&keys).await.unwrap();
        assert_eq!(values, vec![Some("1".to_string()), None, Some("3".to_string())]);
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 5)
            .await
            .expect("Failed to create cache");

        cache.set("test_key", "test_value".to_string(), Duration::from_secs(60)).await.unwrap();
        let result = cache.get("test_key").await.unwrap();
        assert_eq!(result, Some("test_value".to_string()));

        let values = cache
            .get_many(&["test_key".to_string(), "absent_key".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some("test_value".to_string()), None]);
    }
}
