// Service exports
pub mod availability;
pub mod cache;
pub mod checker;
pub mod ephemeral;
pub mod ingest;
pub mod postgres;
pub mod rate_limit;
pub mod store;
pub mod whois;

pub use availability::{AvailabilityService, CheckError};
pub use cache::{CacheError, CacheManager, KvStore, MemoryKv};
pub use checker::AvailabilityChecker;
pub use ephemeral::EphemeralCache;
pub use ingest::{BulkIngestor, DatasetUrls, IngestError};
pub use postgres::PostgresStore;
pub use rate_limit::{RateDecision, RateLimiter};
pub use store::{CheckRecord, CheckStore, MemoryCheckStore, StoreError};
pub use whois::{DomainLookup, Ip2WhoisClient, LookupError, LookupStatus};
