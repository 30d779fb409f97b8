use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::config::TierSettings;
use crate::core::{apply_filters, CacheKey};
use crate::models::{
    CheckRequest, CheckResponse, CheckResult, CheckSource, DatasetSource, IngestionProgress,
    ResponseSource, StatsResponse, TierSettingsView, MAX_NAMES_PER_REQUEST,
};
use crate::services::checker::AvailabilityChecker;
use crate::services::ephemeral::EphemeralCache;
use crate::services::store::{CheckRecord, CheckStore};

/// Errors surfaced to the caller of a check
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("At least one name is required")]
    NoNames,

    #[error("Maximum {max} names per request, got {got}")]
    TooManyNames { got: usize, max: usize },
}

/// Outcome of resolving one suffix through the tiers
#[derive(Debug, Default)]
struct SuffixResolution {
    available: HashMap<String, bool>,
    fresh_lookups: usize,
}

/// Orchestrates name filtering, tier resolution, live checks and caching
///
/// Tiers are consulted in a fixed order, each one only for the names the
/// previous tiers could not answer:
/// 1. ephemeral per-name entries
/// 2. persisted rows from the recent window (any source)
/// 3. persisted `bulk` rows from the long window
/// 4. live lookups
pub struct AvailabilityService {
    cache: EphemeralCache,
    store: Arc<dyn CheckStore>,
    checker: AvailabilityChecker,
    tiers: TierSettings,
}

impl AvailabilityService {
    pub fn new(
        cache: EphemeralCache,
        store: Arc<dyn CheckStore>,
        checker: AvailabilityChecker,
        tiers: TierSettings,
    ) -> Self {
        Self {
            cache,
            store,
            checker,
            tiers,
        }
    }

    pub fn tiers(&self) -> &TierSettings {
        &self.tiers
    }

    /// Answer a check request
    pub async fn check(&self, request: CheckRequest) -> Result<CheckResponse, CheckError> {
        let started = Instant::now();
        let request = request.normalized();

        if request.names.is_empty() {
            return Err(CheckError::NoNames);
        }
        if request.names.len() > MAX_NAMES_PER_REQUEST {
            return Err(CheckError::TooManyNames {
                got: request.names.len(),
                max: MAX_NAMES_PER_REQUEST,
            });
        }

        let names = apply_filters(&request.names, request.filters.as_ref());
        let response_key = CacheKey::response(&names, &request.suffixes, request.filters.as_ref());

        if let Some(mut cached) = self.cache.get_response(&response_key).await {
            tracing::debug!("Response cache hit for {} names", names.len());
            cached.results = arrange_results(cached.results, &names, &request.suffixes);
            cached.source = ResponseSource::Cache;
            cached.processing_time_ms = started.elapsed().as_millis() as u64;
            return Ok(cached);
        }

        let mut results = Vec::with_capacity(names.len() * request.suffixes.len());
        let mut fresh_lookups = 0;

        for suffix in &request.suffixes {
            let resolution = self.resolve_suffix(&names, suffix).await;
            fresh_lookups += resolution.fresh_lookups;

            let checked_at = chrono::Utc::now();
            for name in &names {
                results.push(CheckResult {
                    full_name: format!("{}.{}", name, suffix),
                    available: resolution.available.get(name).copied().unwrap_or(false),
                    suffix: suffix.clone(),
                    checked_at,
                });
            }
        }

        let available_count = results.iter().filter(|r| r.available).count();
        let response = CheckResponse {
            total_checked: results.len(),
            available_count,
            results,
            processing_time_ms: started.elapsed().as_millis() as u64,
            source: if fresh_lookups > 0 {
                ResponseSource::Api
            } else {
                ResponseSource::Database
            },
        };

        self.cache
            .set_response(&response_key, &response, self.tiers.response_ttl_secs)
            .await;

        tracing::info!(
            "Checked {} pairs ({} available, {} live lookups) in {}ms",
            response.total_checked,
            response.available_count,
            fresh_lookups,
            response.processing_time_ms
        );

        Ok(response)
    }

    async fn resolve_suffix(&self, names: &[String], suffix: &str) -> SuffixResolution {
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();
        let mut resolution = SuffixResolution::default();

        if pending.is_empty() {
            return resolution;
        }

        let ephemeral = self.cache.get_names(&pending, suffix).await;
        absorb(&mut resolution.available, &mut pending, ephemeral, "ephemeral", suffix);

        if !pending.is_empty() {
            let recent = self
                .query_store(&pending, suffix, self.tiers.recent_window_minutes, None)
                .await;
            absorb(&mut resolution.available, &mut pending, recent, "recent", suffix);
        }

        if !pending.is_empty() {
            let bulk = self
                .query_store(&pending, suffix, self.tiers.bulk_window_minutes, Some(CheckSource::Bulk))
                .await;
            absorb(&mut resolution.available, &mut pending, bulk, "bulk", suffix);
        }

        if pending.is_empty() {
            return resolution;
        }

        let fresh = self.checker.check_batch(&pending, suffix).await;
        resolution.fresh_lookups = fresh.len();
        self.persist_fresh(&fresh, suffix).await;
        resolution.available.extend(fresh);

        resolution
    }

    /// Read from the persistent store, treating failure as a miss
    async fn query_store(
        &self,
        names: &[String],
        suffix: &str,
        max_age_minutes: i64,
        source: Option<CheckSource>,
    ) -> HashMap<String, bool> {
        match self.store.query_recent(names, suffix, max_age_minutes, source).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Persistent store read failed for .{}, treating as miss: {}", suffix, e);
                HashMap::new()
            }
        }
    }

    async fn persist_fresh(&self, fresh: &HashMap<String, bool>, suffix: &str) {
        let records: Vec<CheckRecord> = fresh
            .iter()
            .map(|(name, available)| CheckRecord::new(name.clone(), suffix, *available))
            .collect();

        if let Err(e) = self.store.upsert_many(&records, CheckSource::Api).await {
            tracing::error!("Failed to persist {} fresh results for .{}: {}", records.len(), suffix, e);
        }

        self.cache.set_names(fresh, suffix, self.tiers.name_ttl_secs).await;
    }

    /// Per-suffix counts plus the latest ingestion snapshots
    pub async fn stats(&self, suffixes: &[String]) -> StatsResponse {
        let suffix_stats = match self.store.suffix_stats(suffixes).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Failed to load suffix stats: {}", e);
                Vec::new()
            }
        };

        let mut ingestion = Vec::new();
        for source in [DatasetSource::Free, DatasetSource::Paid] {
            let progress = self
                .cache
                .get_json(&CacheKey::ingestion_progress(source))
                .await
                .unwrap_or_else(|| IngestionProgress::idle(source));
            ingestion.push(progress);
        }

        StatsResponse {
            suffixes: suffix_stats,
            cache: TierSettingsView {
                name_ttl_secs: self.tiers.name_ttl_secs,
                response_ttl_secs: self.tiers.response_ttl_secs,
                recent_window_minutes: self.tiers.recent_window_minutes,
                bulk_window_minutes: self.tiers.bulk_window_minutes,
            },
            ingestion,
        }
    }
}

/// Move tier hits into the resolved map and drop them from `pending`
fn absorb(
    resolved: &mut HashMap<String, bool>,
    pending: &mut Vec<String>,
    hits: HashMap<String, bool>,
    tier: &str,
    suffix: &str,
) {
    if hits.is_empty() {
        return;
    }

    tracing::debug!("{} {} hits for .{}", hits.len(), tier, suffix);
    pending.retain(|name| !hits.contains_key(name));
    resolved.extend(hits);
}

/// Put cached rows back into this request's suffix-major, name order
///
/// The cached response may come from a request that listed the same names
/// in a different order. Rows are left untouched if any pair is missing.
fn arrange_results(cached: Vec<CheckResult>, names: &[String], suffixes: &[String]) -> Vec<CheckResult> {
    let arranged: Option<Vec<CheckResult>> = {
        let by_name: HashMap<&str, &CheckResult> =
            cached.iter().map(|r| (r.full_name.as_str(), r)).collect();

        let rows: Option<Vec<CheckResult>> = suffixes
            .iter()
            .flat_map(|suffix| names.iter().map(move |name| format!("{}.{}", name, suffix)))
            .map(|full_name| by_name.get(full_name.as_str()).map(|row| (*row).clone()))
            .collect();
        rows
    };

    arranged.unwrap_or(cached)
}
