use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{DatasetSource, NameFilters};

pub const MAX_NAMES_PER_REQUEST: usize = 100;

/// Request to check a batch of names under one or more suffixes
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckRequest {
    #[validate(length(min = 1, max = 100))]
    #[serde(alias = "domains", default)]
    pub names: Vec<String>,
    #[serde(alias = "tlds", default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub filters: Option<NameFilters>,
}

impl CheckRequest {
    pub fn new(names: Vec<String>, suffixes: Vec<String>) -> Self {
        Self {
            names,
            suffixes,
            filters: None,
        }
    }

    pub fn with_filters(mut self, filters: NameFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Trim and lowercase names and suffixes, default the suffix list to `com`
    pub fn normalized(mut self) -> Self {
        self.names = self
            .names
            .iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        self.suffixes = self
            .suffixes
            .iter()
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if self.suffixes.is_empty() {
            self.suffixes.push("com".to_string());
        }

        self
    }
}

/// Query-string form of a check request
///
/// List parameters may be comma separated (`names=a,b`), repeated
/// (`names[]=a&names[]=b`) or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckQuery {
    pub names: Vec<String>,
    pub suffixes: Vec<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub include_hyphens: Option<bool>,
    pub exclude_digits: Option<bool>,
}

impl CheckQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut query = CheckQuery::default();

        for (key, value) in pairs {
            match key.trim_end_matches("[]") {
                "names" | "domains" => query.names.extend(split_list(value)),
                "suffixes" | "tlds" => query.suffixes.extend(split_list(value)),
                "minLength" => query.min_length = Some(parse_number(key, value)?),
                "maxLength" => query.max_length = Some(parse_number(key, value)?),
                "includeHyphens" => query.include_hyphens = Some(parse_flag(key, value)?),
                "excludeDigits" | "excludeNumbers" => query.exclude_digits = Some(parse_flag(key, value)?),
                _ => {}
            }
        }

        Ok(query)
    }

    /// Filters are only present when at least one filter parameter was sent
    pub fn filters(&self) -> Option<NameFilters> {
        if self.min_length.is_none()
            && self.max_length.is_none()
            && self.include_hyphens.is_none()
            && self.exclude_digits.is_none()
        {
            return None;
        }

        Some(NameFilters {
            min_length: self.min_length,
            max_length: self.max_length,
            include_hyphens: self.include_hyphens.unwrap_or(false),
            exclude_digits: self.exclude_digits.unwrap_or(false),
        })
    }

    pub fn into_request(self) -> CheckRequest {
        let filters = self.filters();
        CheckRequest {
            names: self.names,
            suffixes: self.suffixes,
            filters,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a non-negative integer", key))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(format!("{} must be true or false", key)),
    }
}

/// Request to trigger a bulk ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default = "default_dataset_source")]
    pub source: DatasetSource,
}

impl Default for IngestRequest {
    fn default() -> Self {
        Self {
            source: default_dataset_source(),
        }
    }
}

fn default_dataset_source() -> DatasetSource {
    DatasetSource::Free
}

/// Split a comma separated parameter into its non-empty parts
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
