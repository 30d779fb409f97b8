// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CheckResponse, CheckResult, CheckSource, DatasetSource, IngestionProgress, IngestionReport,
    NameFilters, PersistedCheck, ResponseSource, SuffixStats,
};
pub use requests::{CheckQuery, CheckRequest, IngestRequest, MAX_NAMES_PER_REQUEST};
pub use responses::{
    ErrorResponse, HealthResponse, IngestResponse, RateLimitedResponse, StatsResponse,
    TierSettingsView,
};
