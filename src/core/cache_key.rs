use sha2::{Digest, Sha256};

use crate::models::{DatasetSource, NameFilters};

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a single name under a suffix
    ///
    /// Namespaced so that no name/suffix pair can land on a rate limit or
    /// progress key.
    pub fn name(name: &str, suffix: &str) -> String {
        format!("domain:{}:{}", name, suffix)
    }

    /// Build the memoization key for a whole check response
    ///
    /// Names and suffixes are sorted first so that requests differing only
    /// in ordering share one slot.
    pub fn response(names: &[String], suffixes: &[String], filters: Option<&NameFilters>) -> String {
        let mut names: Vec<&str> = names.iter().map(String::as_str).collect();
        names.sort_unstable();
        let mut suffixes: Vec<&str> = suffixes.iter().map(String::as_str).collect();
        suffixes.sort_unstable();

        let filters_json = match filters {
            Some(f) => serde_json::to_string(f).unwrap_or_default(),
            None => "null".to_string(),
        };

        let mut hasher = Sha256::new();
        hasher.update(names.join(",").as_bytes());
        hasher.update(b"\n");
        hasher.update(suffixes.join(",").as_bytes());
        hasher.update(b"\n");
        hasher.update(filters_json.as_bytes());

        format!("response:{}", hex::encode(hasher.finalize()))
    }

    /// Build the per-client rate limit key
    pub fn rate_limit(client_key: &str) -> String {
        format!("rate_limit:{}", client_key)
    }

    /// Build the progress key for an ingestion source
    pub fn ingestion_progress(source: DatasetSource) -> String {
        format!("ingestion_progress:{}", source.as_str())
    }
}
