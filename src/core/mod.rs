// Pure building blocks: name filters, cache keys, dataset parsing
pub mod cache_key;
pub mod dataset;
pub mod filters;

pub use cache_key::CacheKey;
pub use dataset::{is_header, parse_line, LineError};
pub use filters::{apply_filters, passes_filters};
