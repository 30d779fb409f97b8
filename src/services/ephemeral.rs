use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::CacheKey;
use crate::models::CheckResponse;
use crate::services::cache::{CacheError, KvStore};

/// Typed access to the ephemeral tier
///
/// Reads fail open: an unreachable store looks like an empty one. Writes are
/// best effort and only logged on failure.
#[derive(Clone)]
pub struct EphemeralCache {
    store: Arc<dyn KvStore>,
}

impl EphemeralCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Fetch availability entries by key, dropping misses and undecodable values
    pub async fn get_many(&self, keys: &[String]) -> HashMap<String, bool> {
        let values = match self.store.get_many(keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Ephemeral cache read failed, treating as miss: {}", e);
                return HashMap::new();
            }
        };

        keys.iter()
            .zip(values)
            .filter_map(|(key, value)| {
                let raw = value?;
                match serde_json::from_str::<bool>(&raw) {
                    Ok(available) => Some((key.clone(), available)),
                    Err(e) => {
                        tracing::debug!("Discarding undecodable cache entry {}: {}", key, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub async fn set_many(&self, entries: &HashMap<String, bool>, ttl_secs: u64) {
        let encoded: Vec<(String, String)> = entries
            .iter()
            .map(|(key, available)| (key.clone(), available.to_string()))
            .collect();

        if let Err(e) = self.store.set_many(encoded, Duration::from_secs(ttl_secs)).await {
            tracing::warn!("Ephemeral cache write failed for {} entries: {}", entries.len(), e);
        }
    }

    /// Per-name lookups for one suffix, keyed back by bare name
    pub async fn get_names(&self, names: &[String], suffix: &str) -> HashMap<String, bool> {
        let keys: Vec<String> = names.iter().map(|n| CacheKey::name(n, suffix)).collect();
        let by_key = self.get_many(&keys).await;

        names
            .iter()
            .zip(keys)
            .filter_map(|(name, key)| by_key.get(&key).map(|available| (name.clone(), *available)))
            .collect()
    }

    pub async fn set_names(&self, results: &HashMap<String, bool>, suffix: &str, ttl_secs: u64) {
        let entries: HashMap<String, bool> = results
            .iter()
            .map(|(name, available)| (CacheKey::name(name, suffix), *available))
            .collect();
        self.set_many(&entries, ttl_secs).await;
    }

    pub async fn get_response(&self, key: &str) -> Option<CheckResponse> {
        self.get_json(key).await
    }

    pub async fn set_response(&self, key: &str, value: &CheckResponse, ttl_secs: u64) {
        self.set_json(key, value, ttl_secs).await;
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get_json(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ephemeral cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let result = match serde_json::to_string(value) {
            Ok(json) => self.store.set(key, json, Duration::from_secs(ttl_secs)).await,
            Err(e) => Err(CacheError::from(e)),
        };

        if let Err(e) = result {
            tracing::warn!("Ephemeral cache write failed for {}: {}", key, e);
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseSource;
    use crate::services::cache::MemoryKv;
    use async_trait::async_trait;

    struct DownKv;

    #[async_trait]
    impl KvStore for DownKv {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_names_round_trip_per_suffix() {
        let cache = EphemeralCache::new(Arc::new(MemoryKv::default()));
        let mut results = HashMap::new();
        results.insert("alpha".to_string(), true);
        results.insert("beta".to_string(), false);
        cache.set_names(&results, "com", 60).await;

        let hits = cache.get_names(&names(&["alpha", "beta", "gamma"]), "com").await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits.get("alpha"), Some(&true));
        assert_eq!(hits.get("beta"), Some(&false));

        let other_suffix = cache.get_names(&names(&["alpha"]), "net").await;
        assert!(other_suffix.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let cache = EphemeralCache::new(Arc::new(DownKv));

        assert!(cache.get_names(&names(&["alpha"]), "com").await.is_empty());
        assert!(cache.get_response("response:abc").await.is_none());

        // Writes are swallowed
        let response = CheckResponse {
            results: vec![],
            total_checked: 0,
            available_count: 0,
            processing_time_ms: 0,
            source: ResponseSource::Api,
        };
        cache.set_response("response:abc", &response, 60).await;
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let kv = Arc::new(MemoryKv::default());
        kv.set(&CacheKey::name("alpha", "com"), "not-a-bool".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = EphemeralCache::new(kv);

        assert!(cache.get_names(&names(&["alpha"]), "com").await.is_empty());
    }
}
