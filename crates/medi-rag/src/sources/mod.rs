//! External evidence sources
//!
//! Each source translates a question into its own request shape and
//! normalizes the answer into `SourceResult`s. Sources never fail outward
//! through `search`; the orchestrator uses `try_search` so it can record
//! what went wrong.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::MediRagConfig;
use crate::error::SourceError;
use crate::http::CachedHttpClient;
use crate::types::{Query, SourceKind, SourceResult};

pub mod adverse_event;
pub mod dataset;
pub mod drug_label;
pub mod encyclopedia;
pub mod openfda;

pub use adverse_event::AdverseEventAdapter;
pub use dataset::{DatasetAdapter, DatasetRecord};
pub use drug_label::DrugLabelAdapter;
pub use encyclopedia::EncyclopediaAdapter;

/// One external information provider.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter speaks for
    fn kind(&self) -> SourceKind;

    /// Whether the orchestrator should only query this source for questions
    /// that match the clinical vocabulary.
    fn requires_clinical_context(&self) -> bool {
        false
    }

    /// Search, reporting failures to the caller.
    async fn try_search(
        &self,
        query: &Query,
        max_results: usize,
    ) -> Result<Vec<SourceResult>, SourceError>;

    /// Search, degrading any failure to an empty result list.
    async fn search(&self, query: &Query, max_results: usize) -> Vec<SourceResult> {
        match self.try_search(query, max_results).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(source = %self.kind(), error = %e, "Source search failed");
                Vec::new()
            }
        }
    }
}

/// Build every enabled adapter over one shared HTTP client.
pub fn build_adapters(
    config: &MediRagConfig,
    client: Arc<CachedHttpClient>,
) -> Vec<Arc<dyn SourceAdapter>> {
    let sources = &config.sources;
    let max_chars = config.retrieval.content_max_chars;
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if let Some(path) = &sources.dataset_path {
        adapters.push(Arc::new(DatasetAdapter::from_path(path, max_chars)));
    }
    if sources.enable_encyclopedia {
        adapters.push(Arc::new(EncyclopediaAdapter::new(
            client.clone(),
            &sources.encyclopedia_endpoint,
            &sources.encyclopedia_language,
            max_chars,
        )));
    }
    if sources.enable_drug_label {
        adapters.push(Arc::new(DrugLabelAdapter::new(
            client.clone(),
            &sources.openfda_base_url,
            sources.openfda_api_key.clone(),
        )));
    }
    if sources.enable_adverse_event {
        adapters.push(Arc::new(AdverseEventAdapter::new(
            client,
            &sources.openfda_base_url,
            sources.openfda_api_key.clone(),
            config.retrieval.adverse_event_max_results,
        )));
    }

    tracing::info!(
        sources = ?adapters.iter().map(|a| a.kind().as_str()).collect::<Vec<_>>(),
        "Source adapters ready"
    );
    adapters
}
