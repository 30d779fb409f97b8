use std::sync::Arc;
use std::time::Duration;

use crate::core::CacheKey;
use crate::services::cache::{CacheError, KvStore};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Per-client sliding window limiter
///
/// Each client owns a list of request timestamps (epoch millis) in the
/// ephemeral store. If the store cannot be reached the request is allowed.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn allow(&self, client_key: &str, max_requests: usize, window_ms: u64) -> bool {
        self.check(client_key, max_requests, window_ms).await.is_allowed()
    }

    /// Count this request against the client's window
    ///
    /// A rejected request leaves the stored window untouched.
    pub async fn check(&self, client_key: &str, max_requests: usize, window_ms: u64) -> RateDecision {
        match self.try_check(client_key, max_requests, window_ms).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("Rate limiter store unavailable, allowing {}: {}", client_key, e);
                RateDecision::Allowed
            }
        }
    }

    async fn try_check(
        &self,
        client_key: &str,
        max_requests: usize,
        window_ms: u64,
    ) -> Result<RateDecision, CacheError> {
        let key = CacheKey::rate_limit(client_key);
        let now = chrono::Utc::now().timestamp_millis();
        let window_start = now - window_ms as i64;

        let mut requests: Vec<i64> = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::debug!("Resetting unreadable rate limit window for {}: {}", client_key, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        requests.retain(|&t| t > window_start);

        if requests.len() >= max_requests {
            let oldest = requests.iter().copied().min().unwrap_or(now);
            let wait_ms = (oldest + window_ms as i64 - now).max(0) as u64;
            let retry_after_secs = wait_ms.div_ceil(1000).max(1);
            tracing::debug!("Rate limit hit for {} ({} in window)", client_key, requests.len());
            return Ok(RateDecision::Limited { retry_after_secs });
        }

        requests.push(now);
        let encoded = serde_json::to_string(&requests)?;
        if let Err(e) = self.store.set(&key, encoded, Duration::from_millis(window_ms)).await {
            tracing::warn!("Failed to record request for {}: {}", client_key, e);
        }

        Ok(RateDecision::Allowed)
    }
}
