use serde::{Deserialize, Serialize};

/// Optional name filters applied before any lookup
///
/// When a request carries a filter object at all, hyphenated names are
/// dropped unless `includeHyphens` is explicitly `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilters {
    #[serde(rename = "minLength", default)]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", default)]
    pub max_length: Option<usize>,
    #[serde(rename = "includeHyphens", default)]
    pub include_hyphens: bool,
    #[serde(rename = "excludeDigits", alias = "excludeNumbers", default)]
    pub exclude_digits: bool,
}

/// Availability of one name under one suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub available: bool,
    pub suffix: String,
    #[serde(rename = "checkedAt")]
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Which tier answered a whole check request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Api,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub results: Vec<CheckResult>,
    #[serde(rename = "totalChecked")]
    pub total_checked: usize,
    #[serde(rename = "availableCount")]
    pub available_count: usize,
    #[serde(rename = "processingTimeMs")]
    pub processing_time_ms: u64,
    pub source: ResponseSource,
}

/// Provenance tag of a persisted row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSource {
    Api,
    Bulk,
}

impl CheckSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckSource::Api => "api",
            CheckSource::Bulk => "bulk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "api" => Some(CheckSource::Api),
            "bulk" => Some(CheckSource::Bulk),
            _ => None,
        }
    }
}

/// Current belief about one `(name, suffix)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCheck {
    pub name: String,
    pub suffix: String,
    pub available: bool,
    #[serde(rename = "checkedAt")]
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub source: CheckSource,
}

/// Aggregate counts for one suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuffixStats {
    pub suffix: String,
    pub total: i64,
    pub available: i64,
    #[serde(rename = "lastChecked")]
    pub last_checked: Option<chrono::DateTime<chrono::Utc>>,
}

/// Bulk dataset variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetSource {
    #[serde(rename = "free", alias = "domains-index-free")]
    Free,
    #[serde(rename = "paid", alias = "domains-index-paid")]
    Paid,
}

impl DatasetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSource::Free => "free",
            DatasetSource::Paid => "paid",
        }
    }

    pub fn requires_credential(&self) -> bool {
        matches!(self, DatasetSource::Paid)
    }
}

impl std::fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a running (or finished) ingestion, published after every batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionProgress {
    pub source: DatasetSource,
    pub processed: u64,
    pub errors: u64,
    pub total: u64,
    #[serde(rename = "progressPercent")]
    pub progress_percent: u8,
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl IngestionProgress {
    /// Snapshot reported when no run has been observed
    pub fn idle(source: DatasetSource) -> Self {
        Self {
            source,
            processed: 0,
            errors: 0,
            total: 0,
            progress_percent: 0,
            last_updated_at: None,
            duration_ms: 0,
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub processed: u64,
    pub errors: u64,
    pub source: DatasetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl IngestionReport {
    pub fn failed(source: DatasetSource, reason: impl Into<String>) -> Self {
        Self {
            processed: 0,
            errors: 1,
            source,
            failure: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
