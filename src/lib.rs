//! Domain availability - multi-tier availability cache and bulk ingestion
//!
//! Answers "is this name available under this suffix?" for batches of names
//! while keeping calls to the rate-limited external lookup API to a minimum.
//! Answers come from, in order: a short-lived ephemeral cache, recent rows in
//! the persistent store, older bulk-ingested rows, and finally live lookups.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{apply_filters, CacheKey};
pub use models::{CheckRequest, CheckResponse, CheckResult, NameFilters, ResponseSource};
pub use services::{AvailabilityChecker, AvailabilityService, BulkIngestor, EphemeralCache, RateLimiter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let names = vec!["a-b".to_string(), "ab".to_string()];
        let filtered = apply_filters(&names, Some(&NameFilters::default()));
        assert_eq!(filtered, vec!["ab".to_string()]);
    }
}
