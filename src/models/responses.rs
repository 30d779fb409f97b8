use serde::{Deserialize, Serialize};
use crate::models::domain::{IngestionProgress, IngestionReport, SuffixStats};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Body of a 429 answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "retryAfterSeconds")]
    pub retry_after_seconds: u64,
}

/// Response for the ingest endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub stats: IngestionReport,
}

/// Configured cache lifetimes, echoed by the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSettingsView {
    #[serde(rename = "nameTtlSecs")]
    pub name_ttl_secs: u64,
    #[serde(rename = "responseTtlSecs")]
    pub response_ttl_secs: u64,
    #[serde(rename = "recentWindowMinutes")]
    pub recent_window_minutes: i64,
    #[serde(rename = "bulkWindowMinutes")]
    pub bulk_window_minutes: i64,
}

/// Response for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub suffixes: Vec<SuffixStats>,
    pub cache: TierSettingsView,
    pub ingestion: Vec<IngestionProgress>,
}
