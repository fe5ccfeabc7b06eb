use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::cache::{cache_key, ResponseCache};
use super::fetch::{HttpFetch, ReqwestFetcher};
use super::retry::{RetryPolicy, RetryingFetcher};
use super::QueryParams;
use crate::config::HttpConfig;
use crate::error::HttpError;

/// GET with response caching, per-call timeout and bounded retry.
///
/// One instance is meant to be shared (behind an `Arc`) by every source
/// adapter in the process.
pub struct CachedHttpClient {
    fetcher: Arc<dyn HttpFetch>,
    cache: Arc<ResponseCache>,
}

impl CachedHttpClient {
    pub fn new(fetcher: Arc<dyn HttpFetch>, cache: Arc<ResponseCache>) -> Self {
        Self { fetcher, cache }
    }

    /// reqwest transport wrapped in the configured retry policy, with an
    /// in-memory or on-disk cache depending on `resolved_cache_dir`.
    pub async fn from_config(config: &HttpConfig) -> Result<Self, HttpError> {
        let fetcher = RetryingFetcher::new(
            ReqwestFetcher::new(config)?,
            RetryPolicy::from_config(config),
        );
        let cache = match config.resolved_cache_dir() {
            Some(dir) => ResponseCache::persistent(config.cache_ttl(), dir).await?,
            None => ResponseCache::in_memory(config.cache_ttl()),
        };
        Ok(Self::new(Arc::new(fetcher), Arc::new(cache)))
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetch `url` with `params` as JSON.
    ///
    /// A fresh cached payload is returned without network I/O. A 2xx body
    /// that is not JSON comes back as `{"text": <body>}` rather than failing.
    pub async fn get(&self, url: &str, params: &QueryParams) -> Result<Value, HttpError> {
        let key = cache_key(url, params);

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(url, "Cache hit");
            return Ok(hit);
        }

        let guard = self.cache.lock_key(&key).await;
        let result = match self.cache.get(&key).await {
            // Filled by a concurrent caller while we waited for the key.
            Some(hit) => Ok(hit),
            None => self.fetch_and_store(url, params, &key).await,
        };
        drop(guard);
        self.cache.release_key(&key);
        result
    }

    /// Empty the cache unconditionally.
    pub async fn clear(&self) -> Result<(), HttpError> {
        self.cache.clear().await
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        params: &QueryParams,
        key: &str,
    ) -> Result<Value, HttpError> {
        tracing::info!(url, params = ?params, "GET");
        let start = Instant::now();

        let response = self.fetcher.get(url, params).await.map_err(|e| {
            tracing::error!(url, error = %e, "HTTP request failed");
            e
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !response.is_success() {
            tracing::warn!(url, status = response.status, elapsed_ms, "Non-success status");
            return Err(HttpError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        let value = decode_body(url, response.body);
        if let Err(e) = self.cache.put(key, value.clone()).await {
            tracing::warn!(url, error = %e, "Failed to store cache entry");
        }

        tracing::info!(url, status = response.status, elapsed_ms, "API call");
        Ok(value)
    }
}

fn decode_body(url: &str, body: String) -> Value {
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(url, "Non-JSON response, returning raw text");
            json!({ "text": body })
        }
    }
}
