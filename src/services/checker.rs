use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::services::whois::{DomainLookup, LookupError};

/// Live availability checks against the external lookup API
///
/// Every failure mode (timeout, error status, transport error, bad body)
/// resolves to `false`. A name is never reported available unless the API
/// positively said it is not active.
#[derive(Clone)]
pub struct AvailabilityChecker {
    lookup: Arc<dyn DomainLookup>,
    timeout: Duration,
    batch_size: usize,
    batch_delay: Duration,
}

impl AvailabilityChecker {
    pub fn new(
        lookup: Arc<dyn DomainLookup>,
        timeout: Duration,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            lookup,
            timeout,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Checker with the stock limits: 5s per call, chunks of 10, 100ms apart
    pub fn with_defaults(lookup: Arc<dyn DomainLookup>) -> Self {
        Self::new(
            lookup,
            Duration::from_secs(5),
            10,
            Duration::from_millis(100),
        )
    }

    /// Check one name under one suffix
    pub async fn check_one(&self, name: &str, suffix: &str) -> bool {
        let full_name = format!("{}.{}", name, suffix);

        let outcome = match tokio::time::timeout(self.timeout, self.lookup.lookup(&full_name)).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(status) => status.is_available(),
            Err(LookupError::Timeout(ms)) => {
                tracing::warn!("Domain check timeout for {} after {}ms", full_name, ms);
                false
            }
            Err(e) => {
                tracing::warn!("Domain check failed for {}, assuming taken: {}", full_name, e);
                false
            }
        }
    }

    /// Check many names under one suffix
    ///
    /// Names are processed in chunks of `batch_size`. Each call in a chunk
    /// runs as its own task and all of them are awaited; chunks run one after
    /// another with `batch_delay` in between. A call whose task dies is
    /// recorded as unavailable without touching its siblings.
    pub async fn check_batch(&self, names: &[String], suffix: &str) -> HashMap<String, bool> {
        let mut results = HashMap::with_capacity(names.len());
        let chunk_count = names.len().div_ceil(self.batch_size);

        for (index, chunk) in names.chunks(self.batch_size).enumerate() {
            let tasks: Vec<_> = chunk
                .iter()
                .map(|name| {
                    let checker = self.clone();
                    let name = name.clone();
                    let suffix = suffix.to_string();
                    tokio::spawn(async move { checker.check_one(&name, &suffix).await })
                })
                .collect();

            for (name, outcome) in chunk.iter().zip(join_all(tasks).await) {
                let available = match outcome {
                    Ok(available) => available,
                    Err(e) => {
                        tracing::error!(
                            "Check for {}.{} in batch {} of {} crashed, marking unavailable: {}",
                            name,
                            suffix,
                            index + 1,
                            chunk_count,
                            e
                        );
                        false
                    }
                };
                results.insert(name.clone(), available);
            }

            if index + 1 < chunk_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        tracing::debug!(
            "Checked {} names for .{} ({} available)",
            results.len(),
            suffix,
            results.values().filter(|a| **a).count()
        );

        results
    }
}
