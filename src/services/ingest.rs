use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::dataset::{data_lines, is_header, parse_line};
use crate::core::CacheKey;
use crate::models::{CheckSource, DatasetSource, IngestionProgress, IngestionReport};
use crate::services::ephemeral::EphemeralCache;
use crate::services::store::{CheckRecord, CheckStore};

/// Errors that abort an ingestion run before any row is written
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("A credential is required for the {0} dataset")]
    MissingCredential(DatasetSource),

    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Download returned status {0}")]
    HttpStatus(u16),
}

/// Where each dataset variant is downloaded from
#[derive(Debug, Clone)]
pub struct DatasetUrls {
    pub free: String,
    pub paid: String,
}

/// Bulk loader for external domain datasets
///
/// Downloads a dataset, parses it line by line and upserts it in batches
/// tagged `bulk`. A progress snapshot is published after every batch so a
/// caller can poll it while the run is in flight.
pub struct BulkIngestor {
    client: Client,
    store: Arc<dyn CheckStore>,
    cache: EphemeralCache,
    urls: DatasetUrls,
    batch_size: usize,
    progress_ttl_secs: u64,
}

impl BulkIngestor {
    pub fn new(
        store: Arc<dyn CheckStore>,
        cache: EphemeralCache,
        urls: DatasetUrls,
        batch_size: usize,
        progress_ttl_secs: u64,
    ) -> Result<Self, IngestError> {
        let client = Client::builder()
            .user_agent(concat!("domain-availability-ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            store,
            cache,
            urls,
            batch_size: batch_size.max(1),
            progress_ttl_secs,
        })
    }

    /// Run a full ingestion for `source`
    ///
    /// Never fails: download problems come back as a report with
    /// `processed = 0, errors = 1` and a `failure` message.
    pub async fn ingest(&self, source: DatasetSource, credential: Option<&str>) -> IngestionReport {
        let started = Instant::now();
        tracing::info!("Starting bulk ingestion from {}", source);

        let content = match self.download(source, credential).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Bulk ingestion for {} aborted: {}", source, e);
                return IngestionReport::failed(source, e.to_string());
            }
        };

        self.ingest_document(source, &content, started).await
    }

    async fn download(&self, source: DatasetSource, credential: Option<&str>) -> Result<String, IngestError> {
        let request = match source {
            DatasetSource::Free => self.client.get(&self.urls.free),
            DatasetSource::Paid => {
                let key = credential
                    .filter(|k| !k.is_empty())
                    .ok_or(IngestError::MissingCredential(source))?;
                self.client.get(&self.urls.paid).query(&[("key", key)])
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IngestError::HttpStatus(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }

    /// Parse and store an already-downloaded document
    pub async fn ingest_document(&self, source: DatasetSource, content: &str, started: Instant) -> IngestionReport {
        let mut lines = data_lines(content);
        if lines.first().is_some_and(|line| is_header(line)) {
            lines.remove(0);
        }

        let total = lines.len() as u64;
        tracing::info!("Dataset {} has {} data lines", source, total);

        let mut processed: u64 = 0;
        let mut errors: u64 = 0;

        for (index, batch) in lines.chunks(self.batch_size).enumerate() {
            let mut records: Vec<CheckRecord> = Vec::with_capacity(batch.len());
            for line in batch {
                match parse_line(line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::debug!("Skipping malformed line {:?}: {}", line, e);
                        errors += 1;
                    }
                }
            }

            processed += records.len() as u64;

            if !records.is_empty() {
                if let Err(e) = self.store.upsert_many(&records, CheckSource::Bulk).await {
                    tracing::error!(
                        "Batch {} write failed, counting {} rows as errors: {}",
                        index + 1,
                        records.len(),
                        e
                    );
                    processed -= records.len() as u64;
                    errors += records.len() as u64;
                }
            }

            let progress = progress_snapshot(source, processed, errors, total, started);
            self.cache
                .set_json(&CacheKey::ingestion_progress(source), &progress, self.progress_ttl_secs)
                .await;

            tracing::debug!(
                "Ingestion {}: {}/{} lines ({}%)",
                source,
                processed + errors,
                total,
                progress.progress_percent
            );
        }

        tracing::info!(
            "Bulk ingestion complete for {}: {} processed, {} errors in {}ms",
            source,
            processed,
            errors,
            started.elapsed().as_millis()
        );

        IngestionReport {
            processed,
            errors,
            source,
            failure: None,
        }
    }

    /// Latest published progress for `source`
    pub async fn ingestion_status(&self, source: DatasetSource) -> IngestionProgress {
        self.cache
            .get_json(&CacheKey::ingestion_progress(source))
            .await
            .unwrap_or_else(|| IngestionProgress::idle(source))
    }
}

fn progress_snapshot(
    source: DatasetSource,
    processed: u64,
    errors: u64,
    total: u64,
    started: Instant,
) -> IngestionProgress {
    let done = processed + errors;
    let progress_percent = if total == 0 {
        100
    } else {
        ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
    };

    IngestionProgress {
        source,
        processed,
        errors,
        total,
        progress_percent,
        last_updated_at: Some(chrono::Utc::now()),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PersistedCheck, SuffixStats};
    use crate::services::cache::MemoryKv;
    use crate::services::store::{MemoryCheckStore, StoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every other batch write
    struct FlakyStore {
        inner: MemoryCheckStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CheckStore for FlakyStore {
        async fn upsert(&self, name: &str, suffix: &str, available: bool, source: CheckSource) -> Result<(), StoreError> {
            self.inner.upsert(name, suffix, available, source).await
        }

        async fn upsert_many(&self, records: &[CheckRecord], source: CheckSource) -> Result<u64, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.upsert_many(records, source).await
        }

        async fn query_recent(
            &self,
            names: &[String],
            suffix: &str,
            max_age_minutes: i64,
            source: Option<CheckSource>,
        ) -> Result<HashMap<String, bool>, StoreError> {
            self.inner.query_recent(names, suffix, max_age_minutes, source).await
        }

        async fn get(&self, name: &str, suffix: &str) -> Result<Option<PersistedCheck>, StoreError> {
            self.inner.get(name, suffix).await
        }

        async fn suffix_stats(&self, suffixes: &[String]) -> Result<Vec<SuffixStats>, StoreError> {
            self.inner.suffix_stats(suffixes).await
        }
    }

    fn ingestor(store: Arc<dyn CheckStore>, urls: DatasetUrls, batch_size: usize) -> BulkIngestor {
        let cache = EphemeralCache::new(Arc::new(MemoryKv::default()));
        BulkIngestor::new(store, cache, urls, batch_size, 3600).unwrap()
    }

    fn unused_urls() -> DatasetUrls {
        DatasetUrls {
            free: "http://127.0.0.1:9/free.csv".into(),
            paid: "http://127.0.0.1:9/paid.csv".into(),
        }
    }

    fn dataset(lines: usize) -> String {
        let mut content = String::from("domain,tld,status\n");
        for i in 1..=lines {
            if i % 10 == 0 {
                content.push_str("###,,\n");
            } else {
                content.push_str(&format!("name{},com,available\n", i));
            }
        }
        content
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted_not_fatal() {
        let store = Arc::new(MemoryCheckStore::new());
        let ingestor = ingestor(store.clone(), unused_urls(), 25);

        let report = ingestor
            .ingest_document(DatasetSource::Free, &dataset(100), Instant::now())
            .await;

        assert_eq!(report.errors, 10);
        assert_eq!(report.processed, 90);
        assert!(report.is_success());
        assert_eq!(store.len().await, 90);

        let row = store.get("name1", "com").await.unwrap().unwrap();
        assert_eq!(row.source, CheckSource::Bulk);

        let progress = ingestor.ingestion_status(DatasetSource::Free).await;
        assert_eq!(progress.total, 100);
        assert_eq!(progress.processed, 90);
        assert_eq!(progress.errors, 10);
        assert_eq!(progress.progress_percent, 100);
    }

    #[tokio::test]
    async fn test_failed_batch_write_moves_rows_to_errors() {
        let store = Arc::new(FlakyStore {
            inner: MemoryCheckStore::new(),
            calls: AtomicUsize::new(0),
        });
        let ingestor = ingestor(store.clone(), unused_urls(), 10);

        let content: String = (0..40).map(|i| format!("n{},com\n", i)).collect();
        let report = ingestor
            .ingest_document(DatasetSource::Free, &content, Instant::now())
            .await;

        // Batches 2 and 4 fail; the run still finishes
        assert_eq!(report.processed, 20);
        assert_eq!(report.errors, 20);
        assert_eq!(store.inner.len().await, 20);
    }

    #[tokio::test]
    async fn test_paid_without_credential_fails_fast() {
        let store = Arc::new(MemoryCheckStore::new());
        let ingestor = ingestor(store.clone(), unused_urls(), 10);

        let report = ingestor.ingest(DatasetSource::Paid, None).await;

        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 1);
        assert!(!report.is_success());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_download_failure_aborts_run() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/free.csv")
            .with_status(500)
            .create_async()
            .await;

        let urls = DatasetUrls {
            free: format!("{}/free.csv", server.url()),
            paid: format!("{}/paid.csv", server.url()),
        };
        let ingestor = ingestor(Arc::new(MemoryCheckStore::new()), urls, 10);

        let report = ingestor.ingest(DatasetSource::Free, None).await;
        assert_eq!((report.processed, report.errors), (0, 1));
        assert!(report.failure.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_paid_download_sends_credential() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paid.csv")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "k-123".into()))
            .with_status(200)
            .with_body("alpha,com,registered\nbeta,net,free\n")
            .create_async()
            .await;

        let urls = DatasetUrls {
            free: format!("{}/free.csv", server.url()),
            paid: format!("{}/paid.csv", server.url()),
        };
        let store = Arc::new(MemoryCheckStore::new());
        let ingestor = ingestor(store.clone(), urls, 10);

        let report = ingestor.ingest(DatasetSource::Paid, Some("k-123")).await;

        mock.assert_async().await;
        assert_eq!((report.processed, report.errors), (2, 0));
        assert!(!store.get("alpha", "com").await.unwrap().unwrap().available);
        assert!(store.get("beta", "net").await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn test_status_defaults_to_idle() {
        let ingestor = ingestor(Arc::new(MemoryCheckStore::new()), unused_urls(), 10);
        let status = ingestor.ingestion_status(DatasetSource::Paid).await;
        assert_eq!(status, IngestionProgress::idle(DatasetSource::Paid));
    }
}
