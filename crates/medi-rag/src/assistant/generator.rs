//! Answer generation seam.
//!
//! Prompt templating and the language model live outside this crate behind
//! `AnswerGenerator`. `CachedGenerator` adds a response cache in front of
//! any implementation, independent of the HTTP cache.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationCacheConfig;
use crate::http::ResponseCache;

/// Everything the prompt builder needs for one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub question: String,
    pub question_type: String,
    pub dataset_info: Option<String>,
    pub api_info: Option<String>,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, question_type: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            question_type: question_type.into(),
            dataset_info: None,
            api_info: None,
        }
    }

    pub fn with_dataset_info(mut self, info: Option<String>) -> Self {
        self.dataset_info = info;
        self
    }

    pub fn with_api_info(mut self, info: Option<String>) -> Self {
        self.api_info = info;
        self
    }

    /// Stable hash of every prompt input.
    pub fn cache_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in [
            Some(self.question.as_str()),
            Some(self.question_type.as_str()),
            self.dataset_info.as_deref(),
            self.api_info.as_deref(),
        ] {
            match part {
                Some(text) => {
                    hasher.update(b"1");
                    hasher.update(&(text.len() as u64).to_le_bytes());
                    hasher.update(text.as_bytes());
                }
                None => {
                    hasher.update(b"0");
                }
            }
        }
        format!("gen-{}", hasher.finalize().to_hex())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub answer: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationResponse {
    pub fn success(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            status: GenerationStatus::Success,
            metadata: HashMap::new(),
        }
    }

    pub fn error(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            status: GenerationStatus::Error,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}

/// Produces an answer from a question and its gathered evidence.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer. An `Err` means no answer could be produced at all.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

/// Serves repeated requests from a TTL cache. Only successful responses are
/// stored.
pub struct CachedGenerator {
    inner: Arc<dyn AnswerGenerator>,
    cache: Arc<ResponseCache>,
}

impl CachedGenerator {
    pub fn new(inner: Arc<dyn AnswerGenerator>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Arc::new(ResponseCache::in_memory(ttl)),
        }
    }

    pub fn with_cache(inner: Arc<dyn AnswerGenerator>, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }

    /// Wrap `inner` per the config, or hand it back unchanged when caching
    /// is disabled.
    pub fn from_config(
        inner: Arc<dyn AnswerGenerator>,
        config: &GenerationCacheConfig,
    ) -> Arc<dyn AnswerGenerator> {
        if config.enabled {
            Arc::new(Self::new(inner, Duration::from_secs(config.ttl_secs)))
        } else {
            inner
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.cache.clear().await?;
        Ok(())
    }
}

#[async_trait]
impl AnswerGenerator for CachedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let key = request.cache_key();
        if let Some(payload) = self.cache.get(&key).await {
            match serde_json::from_value::<GenerationResponse>(payload) {
                Ok(response) => {
                    tracing::debug!(generator = self.inner.name(), "Generation cache hit");
                    return Ok(response.with_metadata("cached", true));
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable generation cache entry"),
            }
        }

        let response = self.inner.generate(request).await?;
        if response.is_success() {
            if let Err(e) = self.cache.put(&key, serde_json::to_value(&response)?).await {
                tracing::warn!(error = %e, "Failed to cache generated answer");
            }
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
