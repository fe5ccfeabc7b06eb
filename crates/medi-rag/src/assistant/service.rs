use std::sync::Arc;

use super::generator::{AnswerGenerator, CachedGenerator, GenerationRequest};
use super::responses::{
    generation_error_message, CRISIS_MESSAGE, INVALID_INPUT_MESSAGE, REFUSAL_MESSAGE,
};
use crate::config::MediRagConfig;
use crate::error::TriageError;
use crate::retrieval::{format_for_prompt, RetrievalOrchestrator};
use crate::triage::{QuestionClassifier, TriageOutcome, TriagePipeline};
use crate::types::{ActionPlan, Query, QuestionCategory, ResultEnvelope, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    /// The generator produced the answer.
    Answered,
    /// A fixed message was returned; the generator was not called.
    Refused,
    /// The generator failed; a fixed apology was returned instead.
    Failed,
}

#[derive(Debug, Clone)]
pub struct AssistantAnswer {
    pub answer: String,
    pub status: AnswerStatus,
    pub plan: ActionPlan,
    /// Present whenever retrieval ran, even if every source failed.
    pub evidence: Option<ResultEnvelope>,
}

/// Triage, then retrieval when the plan asks for it, then generation.
///
/// A refusal plan ends the request with a fixed message before retrieval or
/// generation. Retrieval failures only thin out the evidence handed to the
/// generator; the only error returned is a classifier failure.
pub struct MedicalAssistant {
    triage: Arc<TriagePipeline>,
    retrieval: Arc<RetrievalOrchestrator>,
    generator: Arc<dyn AnswerGenerator>,
    max_per_source: usize,
    preview_chars: usize,
}

impl MedicalAssistant {
    pub fn new(
        triage: Arc<TriagePipeline>,
        retrieval: Arc<RetrievalOrchestrator>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let defaults = crate::config::RetrievalConfig::default();
        Self {
            triage,
            retrieval,
            generator,
            max_per_source: defaults.max_results_per_source,
            preview_chars: defaults.prompt_preview_chars,
        }
    }

    /// Wire everything from one config. The generator is wrapped in the
    /// generation cache unless that is disabled.
    pub async fn from_config(
        config: &MediRagConfig,
        classifier: Arc<dyn QuestionClassifier>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let retrieval = RetrievalOrchestrator::from_config(config).await?;
        Ok(Self::new(
            Arc::new(TriagePipeline::new(classifier, &config.triage)),
            Arc::new(retrieval),
            CachedGenerator::from_config(generator, &config.generation),
        )
        .with_max_per_source(config.retrieval.max_results_per_source)
        .with_preview_chars(config.retrieval.prompt_preview_chars))
    }

    pub fn with_max_per_source(mut self, max_per_source: usize) -> Self {
        self.max_per_source = max_per_source;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Run triage off the async runtime; the classifier may block.
    pub async fn triage(&self, question: &str) -> Result<TriageOutcome, TriageError> {
        let pipeline = self.triage.clone();
        let text = question.to_string();
        tokio::task::spawn_blocking(move || pipeline.run(&text))
            .await
            .map_err(|e| TriageError::Classifier(anyhow::anyhow!("triage task failed: {}", e)))?
    }

    pub async fn answer(&self, question: &str) -> Result<AssistantAnswer, TriageError> {
        let outcome = self.triage(question).await?;
        let plan = outcome.plan().clone();

        if plan.is_refusal() {
            let message = match &outcome {
                TriageOutcome::Refused { .. } => CRISIS_MESSAGE,
                TriageOutcome::Invalid { .. } => INVALID_INPUT_MESSAGE,
                TriageOutcome::Planned { .. } => REFUSAL_MESSAGE,
            };
            tracing::info!(intent = %plan.intent, risk = ?plan.risk_level, "Answer refused");
            return Ok(AssistantAnswer {
                answer: message.to_string(),
                status: AnswerStatus::Refused,
                plan,
                evidence: None,
            });
        }

        let question = question.trim();
        let evidence = if plan.needs_external_data {
            Some(
                self.retrieval
                    .search_all(&Query::new(question), self.max_per_source)
                    .await,
            )
        } else {
            None
        };

        let question_type = question_type(&outcome);
        let mut request = GenerationRequest::new(question, question_type.clone());
        if let Some(envelope) = &evidence {
            request = request
                .with_dataset_info(self.section(envelope, |k| k == SourceKind::Dataset))
                .with_api_info(self.section(envelope, |k| k != SourceKind::Dataset));
        }

        let (answer, status) = match self.generator.generate(&request).await {
            Ok(response) if response.is_success() => (response.answer, AnswerStatus::Answered),
            Ok(_) => {
                tracing::warn!(generator = self.generator.name(), "Generator reported an error");
                (generation_error_message(&question_type).to_string(), AnswerStatus::Failed)
            }
            Err(e) => {
                tracing::warn!(generator = self.generator.name(), error = %e, "Generation failed");
                (generation_error_message(&question_type).to_string(), AnswerStatus::Failed)
            }
        };

        Ok(AssistantAnswer {
            answer,
            status,
            plan,
            evidence,
        })
    }

    /// Prompt block for the matching sources, or `None` if none answered.
    fn section(&self, envelope: &ResultEnvelope, keep: impl Fn(SourceKind) -> bool) -> Option<String> {
        let mut subset = ResultEnvelope::new(envelope.query.clone());
        for result in envelope.results.iter().filter(|r| keep(r.source)) {
            subset.add_result(result.clone());
        }
        if subset.is_empty() {
            return None;
        }
        Some(format_for_prompt(&subset, self.max_per_source, self.preview_chars))
    }
}

/// Classifier phrasing of the category when known, else the plan intent.
fn question_type(outcome: &TriageOutcome) -> String {
    match outcome {
        TriageOutcome::Planned { classification, .. } => {
            QuestionCategory::from_label(&classification.label)
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| outcome.plan().intent.clone())
        }
        _ => outcome.plan().intent.clone(),
    }
}
