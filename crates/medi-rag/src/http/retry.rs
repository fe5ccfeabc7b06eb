use async_trait::async_trait;
use std::time::Duration;

use super::fetch::{HttpFetch, RawResponse};
use super::QueryParams;
use crate::config::HttpConfig;
use crate::error::HttpError;

/// Bounded exponential backoff: `base * 2^(n-1)` after the n-th failure,
/// capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_cap_ms),
        }
    }

    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Retries the wrapped fetcher on connection failures and timeouts only.
/// The last attempt's error is returned as-is.
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: HttpFetch> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<F: HttpFetch> HttpFetch for RetryingFetcher<F> {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<RawResponse, HttpError> {
        let mut attempt = 1u32;
        loop {
            match self.inner.get(url, params).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let backoff = self.policy.delay_for(attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
