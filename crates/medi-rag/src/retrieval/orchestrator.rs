use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use super::formatter::format_for_prompt;
use super::vocabulary::looks_clinical;
use crate::config::{MediRagConfig, RetrievalConfig};
use crate::error::HttpError;
use crate::http::CachedHttpClient;
use crate::sources::{build_adapters, SourceAdapter};
use crate::types::{Query, ResultEnvelope, SourceKind};

/// Fans one question out to every configured source and gathers whatever
/// comes back, failures included, into a `ResultEnvelope`.
pub struct RetrievalOrchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    clinical_vocabulary: Vec<String>,
    preview_chars: usize,
    http: Option<Arc<CachedHttpClient>>,
}

impl RetrievalOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, clinical_vocabulary: Vec<String>) -> Self {
        Self {
            adapters,
            clinical_vocabulary,
            preview_chars: RetrievalConfig::default().prompt_preview_chars,
            http: None,
        }
    }

    /// Shared HTTP client, one set of adapters, settings from `config`.
    pub async fn from_config(config: &MediRagConfig) -> Result<Self, HttpError> {
        let client = Arc::new(CachedHttpClient::from_config(&config.http).await?);
        let adapters = build_adapters(config, client.clone());
        Ok(Self::new(adapters, config.retrieval.clinical_vocabulary.clone())
            .with_preview_chars(config.retrieval.prompt_preview_chars)
            .with_http_client(client))
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// The client whose cache `clear_cache` empties.
    pub fn with_http_client(mut self, client: Arc<CachedHttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    pub fn looks_clinical(&self, text: &str) -> bool {
        looks_clinical(text, &self.clinical_vocabulary)
    }

    /// Query every source concurrently. Sources that only serve clinical
    /// questions are skipped when the question does not look clinical.
    pub async fn search_all(&self, query: &Query, max_per_source: usize) -> ResultEnvelope {
        let clinical = self.looks_clinical(query.text());
        let selected: Vec<_> = self
            .adapters
            .iter()
            .filter(|a| clinical || !a.requires_clinical_context())
            .cloned()
            .collect();

        tracing::info!(
            query = query.text(),
            clinical,
            sources = selected.len(),
            "Orchestrated search"
        );
        self.dispatch(query, selected, max_per_source).await
    }

    /// Query only the listed sources, without the clinical gate.
    pub async fn search_sources(
        &self,
        query: &Query,
        kinds: &[SourceKind],
        max_per_source: usize,
    ) -> ResultEnvelope {
        let selected: Vec<_> = self
            .adapters
            .iter()
            .filter(|a| kinds.contains(&a.kind()))
            .cloned()
            .collect();
        tracing::info!(query = query.text(), sources = ?kinds, "Source-specific search");
        self.dispatch(query, selected, max_per_source).await
    }

    pub fn format_for_prompt(&self, envelope: &ResultEnvelope, max_per_source: usize) -> String {
        format_for_prompt(envelope, max_per_source, self.preview_chars)
    }

    /// Empty the shared HTTP cache. A no-op without a client.
    pub async fn clear_cache(&self) -> Result<(), HttpError> {
        match &self.http {
            Some(client) => {
                client.clear().await?;
                tracing::info!("HTTP cache cleared");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn dispatch(
        &self,
        query: &Query,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        max_per_source: usize,
    ) -> ResultEnvelope {
        let start = Instant::now();
        let mut tasks = JoinSet::new();
        for adapter in adapters {
            let query = query.clone();
            tasks.spawn(async move {
                let kind = adapter.kind();
                // Inner task so a panicking adapter is still attributed to its source.
                let outcome =
                    tokio::spawn(async move { adapter.try_search(&query, max_per_source).await })
                        .await;
                (kind, outcome)
            });
        }

        let mut envelope = ResultEnvelope::new(query.clone());
        while let Some(joined) = tasks.join_next().await {
            let (kind, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "Source task failed");
                    envelope.add_error(format!("source task error: {}", e));
                    continue;
                }
            };
            match outcome {
                Ok(Ok(results)) => {
                    tracing::debug!(source = %kind, count = results.len(), "Source answered");
                    for result in results {
                        envelope.add_result(result);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %kind, error = %e, "Source failed");
                    envelope.add_error(format!("{} error: {}", kind, e));
                }
                Err(e) => {
                    tracing::error!(source = %kind, error = %e, "Source task panicked");
                    envelope.add_error(format!("{} error: {}", kind, e));
                }
            }
        }

        tracing::info!(
            results = envelope.len(),
            errors = envelope.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search finished"
        );
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::retrieval::vocabulary::default_clinical_terms;
    use crate::types::SourceResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Behavior {
        Answer(&'static str),
        Fail(&'static str),
        Panic,
        Slow(Duration, &'static str),
    }

    struct FakeAdapter {
        kind: SourceKind,
        clinical_only: bool,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl FakeAdapter {
        fn new(kind: SourceKind, behavior: Behavior) -> Self {
            Self {
                kind,
                clinical_only: false,
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn clinical_only(mut self) -> Self {
            self.clinical_only = true;
            self
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn requires_clinical_context(&self) -> bool {
            self.clinical_only
        }

        async fn try_search(
            &self,
            _query: &Query,
            max_results: usize,
        ) -> Result<Vec<SourceResult>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let title = match &self.behavior {
                Behavior::Answer(title) => *title,
                Behavior::Fail(msg) => return Err(SourceError::Unavailable(msg.to_string())),
                Behavior::Panic => panic!("adapter bug"),
                Behavior::Slow(delay, title) => {
                    tokio::time::sleep(*delay).await;
                    *title
                }
            };
            Ok((0..max_results.min(2))
                .map(|i| SourceResult::new(self.kind, format!("{} {}", title, i), "body", 0.8))
                .collect())
        }
    }

    fn orchestrator(adapters: Vec<FakeAdapter>) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(
            adapters
                .into_iter()
                .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
                .collect(),
            default_clinical_terms(),
        )
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let orch = orchestrator(vec![
            FakeAdapter::new(SourceKind::DrugLabel, Behavior::Fail("registry down")),
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Answer("Aspirin")),
        ]);

        let env = orch.search_all(&Query::new("aspirin dose"), 3).await;
        assert_eq!(env.len(), 2);
        assert!(env.results.iter().all(|r| r.source == SourceKind::Encyclopedia));
        assert!(!env.succeeded);
        assert_eq!(env.errors, vec!["drug_label error: source unavailable: registry down"]);
    }

    #[tokio::test]
    async fn test_all_failed_is_unavailable() {
        let orch = orchestrator(vec![
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Fail("a")),
            FakeAdapter::new(SourceKind::Dataset, Behavior::Fail("b")),
        ]);
        let env = orch.search_all(&Query::new("question"), 3).await;
        assert!(env.is_unavailable());
        assert_eq!(env.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_isolated() {
        let orch = orchestrator(vec![
            FakeAdapter::new(SourceKind::Dataset, Behavior::Panic),
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Answer("ok")),
        ]);
        let env = orch.search_all(&Query::new("question"), 1).await;
        assert_eq!(env.len(), 1);
        assert_eq!(env.errors.len(), 1);
        assert!(env.errors[0].starts_with("dataset error:"));
    }

    #[tokio::test]
    async fn test_clinical_gate() {
        let gated = FakeAdapter::new(SourceKind::AdverseEvent, Behavior::Answer("events")).clinical_only();
        let gated_calls = gated.calls.clone();
        let orch = orchestrator(vec![
            gated,
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Answer("wiki")),
        ]);

        let env = orch.search_all(&Query::new("Who painted the Mona Lisa?"), 3).await;
        assert_eq!(gated_calls.load(Ordering::SeqCst), 0);
        assert!(env.succeeded);
        assert_eq!(env.len(), 2);

        orch.search_all(&Query::new("Effets secondaires de l'aspirine"), 3).await;
        assert_eq!(gated_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_results_arrive_in_completion_order() {
        let orch = orchestrator(vec![
            FakeAdapter::new(
                SourceKind::Dataset,
                Behavior::Slow(Duration::from_millis(150), "slow"),
            ),
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Answer("fast")),
        ]);
        let env = orch.search_all(&Query::new("q"), 1).await;
        assert_eq!(env.results[0].source, SourceKind::Encyclopedia);
        assert_eq!(env.results[1].source, SourceKind::Dataset);
    }

    #[tokio::test]
    async fn test_search_sources_bypasses_gate() {
        let gated = FakeAdapter::new(SourceKind::DrugLabel, Behavior::Answer("label")).clinical_only();
        let orch = orchestrator(vec![
            gated,
            FakeAdapter::new(SourceKind::Encyclopedia, Behavior::Answer("wiki")),
        ]);

        let env = orch
            .search_sources(&Query::new("Mona Lisa"), &[SourceKind::DrugLabel], 1)
            .await;
        assert_eq!(env.len(), 1);
        assert_eq!(env.results[0].source, SourceKind::DrugLabel);
    }

    #[tokio::test]
    async fn test_no_sources_yields_empty_success() {
        let orch = orchestrator(vec![]);
        let env = orch.search_all(&Query::new("anything"), 3).await;
        assert!(env.succeeded);
        assert!(env.is_empty());
        assert!(orch.format_for_prompt(&env, 2).starts_with("No external information found"));
        orch.clear_cache().await.unwrap();
    }
}
