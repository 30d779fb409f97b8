//! Durable tier interface and its in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{CheckSource, PersistedCheck, SuffixStats};

/// Errors that can occur with the persistent store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A single availability belief waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub name: String,
    pub suffix: String,
    pub available: bool,
}

impl CheckRecord {
    pub fn new(name: impl Into<String>, suffix: impl Into<String>, available: bool) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
            available,
        }
    }
}

/// Table of `(name, suffix) -> (available, checked_at, source)`
///
/// Every write replaces the existing row for its key, whatever that row's
/// source or age. Implementations must make that replacement atomic.
#[async_trait]
pub trait CheckStore: Send + Sync + 'static {
    async fn upsert(
        &self,
        name: &str,
        suffix: &str,
        available: bool,
        source: CheckSource,
    ) -> Result<(), StoreError>;

    /// Write a batch atomically; returns the number of rows written
    async fn upsert_many(&self, records: &[CheckRecord], source: CheckSource) -> Result<u64, StoreError>;

    /// Rows for `names` under `suffix` checked within the last `max_age_minutes`
    ///
    /// Older rows are reported as absent, not removed.
    async fn query_recent(
        &self,
        names: &[String],
        suffix: &str,
        max_age_minutes: i64,
        source: Option<CheckSource>,
    ) -> Result<HashMap<String, bool>, StoreError>;

    async fn get(&self, name: &str, suffix: &str) -> Result<Option<PersistedCheck>, StoreError>;

    async fn suffix_stats(&self, suffixes: &[String]) -> Result<Vec<SuffixStats>, StoreError>;
}

/// Keep only the last record for each `(name, suffix)` key, in first-seen order
pub fn dedupe_last_wins(records: &[CheckRecord]) -> Vec<CheckRecord> {
    let mut position: HashMap<(&str, &str), usize> = HashMap::new();
    let mut deduped: Vec<CheckRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.name.as_str(), record.suffix.as_str());
        match position.get(&key) {
            Some(&index) => deduped[index] = record.clone(),
            None => {
                position.insert(key, deduped.len());
                deduped.push(record.clone());
            }
        }
    }

    deduped
}

/// In-memory implementation of CheckStore.
///
/// A single `RwLock` around the table makes each write atomic with respect
/// to concurrent readers and writers.
#[derive(Debug, Default)]
pub struct MemoryCheckStore {
    rows: RwLock<HashMap<(String, String), PersistedCheck>>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is, including its timestamp
    pub async fn seed(&self, check: PersistedCheck) {
        let key = (check.name.clone(), check.suffix.clone());
        self.rows.write().await.insert(key, check);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn row(record: &CheckRecord, source: CheckSource, now: DateTime<Utc>) -> PersistedCheck {
        PersistedCheck {
            name: record.name.clone(),
            suffix: record.suffix.clone(),
            available: record.available,
            checked_at: now,
            source,
        }
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn upsert(
        &self,
        name: &str,
        suffix: &str,
        available: bool,
        source: CheckSource,
    ) -> Result<(), StoreError> {
        let record = CheckRecord::new(name, suffix, available);
        self.upsert_many(std::slice::from_ref(&record), source).await?;
        Ok(())
    }

    async fn upsert_many(&self, records: &[CheckRecord], source: CheckSource) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        for record in records {
            rows.insert(
                (record.name.clone(), record.suffix.clone()),
                Self::row(record, source, now),
            );
        }
        Ok(records.len() as u64)
    }

    async fn query_recent(
        &self,
        names: &[String],
        suffix: &str,
        max_age_minutes: i64,
        source: Option<CheckSource>,
    ) -> Result<HashMap<String, bool>, StoreError> {
        let cutoff = Utc::now() - Duration::minutes(max_age_minutes);
        let rows = self.rows.read().await;

        Ok(names
            .iter()
            .filter_map(|name| {
                let row = rows.get(&(name.clone(), suffix.to_string()))?;
                let fresh = row.checked_at > cutoff;
                let tagged = source.map_or(true, |s| row.source == s);
                (fresh && tagged).then(|| (name.clone(), row.available))
            })
            .collect())
    }

    async fn get(&self, name: &str, suffix: &str) -> Result<Option<PersistedCheck>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(name.to_string(), suffix.to_string())).cloned())
    }

    async fn suffix_stats(&self, suffixes: &[String]) -> Result<Vec<SuffixStats>, StoreError> {
        let rows = self.rows.read().await;

        Ok(suffixes
            .iter()
            .map(|suffix| {
                let matching: Vec<&PersistedCheck> =
                    rows.values().filter(|row| &row.suffix == suffix).collect();
                SuffixStats {
                    suffix: suffix.clone(),
                    total: matching.len() as i64,
                    available: matching.iter().filter(|row| row.available).count() as i64,
                    last_checked: matching.iter().map(|row| row.checked_at).max(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryCheckStore::new();
        store.upsert("brand", "com", true, CheckSource::Api).await.unwrap();
        store.upsert("brand", "com", true, CheckSource::Api).await.unwrap();

        assert_eq!(store.len().await, 1);
        let row = store.get("brand", "com").await.unwrap().unwrap();
        assert!(row.available);
        assert_eq!(row.source, CheckSource::Api);
    }

    #[tokio::test]
    async fn test_last_writer_wins_across_sources() {
        let store = MemoryCheckStore::new();
        store.upsert("brand", "com", true, CheckSource::Bulk).await.unwrap();
        store.upsert("brand", "com", false, CheckSource::Api).await.unwrap();

        let row = store.get("brand", "com").await.unwrap().unwrap();
        assert!(!row.available);
        assert_eq!(row.source, CheckSource::Api);
    }

    #[tokio::test]
    async fn test_query_recent_respects_window_and_source() {
        let store = MemoryCheckStore::new();
        store
            .seed(PersistedCheck {
                name: "old".into(),
                suffix: "com".into(),
                available: true,
                checked_at: Utc::now() - Duration::days(2),
                source: CheckSource::Bulk,
            })
            .await;
        store.upsert("fresh", "com", false, CheckSource::Api).await.unwrap();

        let recent = store.query_recent(&names(&["old", "fresh"]), "com", 1_440, None).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.get("fresh"), Some(&false));

        let bulk = store
            .query_recent(&names(&["old", "fresh"]), "com", 10_080, Some(CheckSource::Bulk))
            .await
            .unwrap();
        assert_eq!(bulk.len(), 1);
        assert_eq!(bulk.get("old"), Some(&true));

        // Stale rows are not deleted
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_suffix_stats() {
        let store = MemoryCheckStore::new();
        store.upsert("a", "com", true, CheckSource::Api).await.unwrap();
        store.upsert("b", "com", false, CheckSource::Api).await.unwrap();
        store.upsert("a", "net", true, CheckSource::Bulk).await.unwrap();

        let stats = store.suffix_stats(&names(&["com", "org"])).await.unwrap();
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].available, 1);
        assert!(stats[0].last_checked.is_some());
        assert_eq!(stats[1].total, 0);
        assert!(stats[1].last_checked.is_none());
    }

    #[test]
    fn test_dedupe_last_wins() {
        let records = vec![
            CheckRecord::new("a", "com", true),
            CheckRecord::new("b", "com", true),
            CheckRecord::new("a", "com", false),
        ];

        let deduped = dedupe_last_wins(&records);
        assert_eq!(
            deduped,
            vec![CheckRecord::new("a", "com", false), CheckRecord::new("b", "com", true)]
        );
    }
}
