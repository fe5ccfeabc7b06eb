use std::sync::Arc;

use super::classifier::QuestionClassifier;
use super::confidence::{compute_confidence, ConfidenceThresholds};
use super::planner::Planner;
use super::validator::{InputValidator, Validation};
use crate::config::TriageConfig;
use crate::error::TriageError;
use crate::types::{ActionPlan, Classification, ConfidenceLevel, QuestionCategory};

/// Terminal state of one triage run.
#[derive(Debug, Clone, PartialEq)]
pub enum TriageOutcome {
    Invalid {
        plan: ActionPlan,
        reason: String,
    },
    Refused {
        plan: ActionPlan,
        phrase: String,
    },
    Planned {
        plan: ActionPlan,
        classification: Classification,
        confidence: ConfidenceLevel,
    },
}

impl TriageOutcome {
    pub fn plan(&self) -> &ActionPlan {
        match self {
            Self::Invalid { plan, .. } | Self::Refused { plan, .. } | Self::Planned { plan, .. } => {
                plan
            }
        }
    }

    pub fn into_plan(self) -> ActionPlan {
        match self {
            Self::Invalid { plan, .. } | Self::Refused { plan, .. } | Self::Planned { plan, .. } => {
                plan
            }
        }
    }

    pub fn is_safety_refusal(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }
}

/// Validate, screen, classify, plan. Stateless beyond configuration, so one
/// pipeline can serve concurrent queries.
pub struct TriagePipeline {
    classifier: Arc<dyn QuestionClassifier>,
    validator: InputValidator,
    thresholds: ConfidenceThresholds,
    planner: Planner,
    candidate_labels: Vec<String>,
}

impl TriagePipeline {
    pub fn new(classifier: Arc<dyn QuestionClassifier>, config: &TriageConfig) -> Self {
        Self {
            classifier,
            validator: InputValidator::from_config(config),
            thresholds: ConfidenceThresholds::from_config(config),
            planner: Planner::from_config(config),
            candidate_labels: QuestionCategory::candidate_labels(),
        }
    }

    /// Run every step in order, stopping at the first terminal state.
    /// Only a classifier failure is an error.
    pub fn run(&self, text: &str) -> Result<TriageOutcome, TriageError> {
        match self.validator.validate(text) {
            Validation::Valid => {}
            Validation::Crisis { phrase } => {
                tracing::warn!(phrase = %phrase, "Crisis phrase detected, refusing");
                return Ok(TriageOutcome::Refused {
                    plan: Planner::crisis_plan(),
                    phrase,
                });
            }
            invalid => {
                let reason = invalid.reason();
                tracing::info!(reason = %reason, "Input rejected");
                return Ok(TriageOutcome::Invalid {
                    plan: Planner::invalid_plan(),
                    reason,
                });
            }
        }

        let classification = self
            .classifier
            .classify(text.trim(), &self.candidate_labels)
            .map_err(TriageError::Classifier)?;
        if !classification.score.is_finite() {
            return Err(TriageError::Classifier(anyhow::anyhow!(
                "classifier returned non-finite score for label {:?}",
                classification.label
            )));
        }

        let confidence = compute_confidence(classification.score, &self.thresholds);
        let plan = self.planner.plan(&classification, confidence);
        Ok(TriageOutcome::Planned {
            plan,
            classification,
            confidence,
        })
    }

    /// The plan alone.
    pub fn classify_question(&self, text: &str) -> Result<ActionPlan, TriageError> {
        self.run(text).map(TriageOutcome::into_plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::classifier::FixedClassifier;
    use crate::types::{intents, Domain, LlmMode, RiskLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        inner: FixedClassifier,
        calls: AtomicUsize,
    }

    impl QuestionClassifier for CountingClassifier {
        fn classify(&self, text: &str, labels: &[String]) -> anyhow::Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.classify(text, labels)
        }
    }

    struct BrokenClassifier;

    impl QuestionClassifier for BrokenClassifier {
        fn classify(&self, _text: &str, _labels: &[String]) -> anyhow::Result<Classification> {
            anyhow::bail!("model endpoint unreachable")
        }
    }

    fn pipeline(category: QuestionCategory, score: f32) -> TriagePipeline {
        TriagePipeline::new(
            Arc::new(FixedClassifier::category(category, score)),
            &TriageConfig::default(),
        )
    }

    #[test]
    fn test_definition_question_end_to_end() {
        let plan = pipeline(QuestionCategory::Definition, 0.9)
            .classify_question("What is hypertension?")
            .unwrap();
        assert_eq!(
            plan,
            ActionPlan {
                domain: Domain::Medical,
                intent: intents::MEDICAL_DEFINITION.to_string(),
                confidence: 0.9,
                risk_level: RiskLevel::Low,
                needs_external_data: true,
                llm_mode: LlmMode::Direct,
            }
        );
    }

    #[test]
    fn test_safety_dominates_classifier() {
        let outcome = pipeline(QuestionCategory::NonMedical, 0.99)
            .run("I want to end my life")
            .unwrap();
        assert!(outcome.is_safety_refusal());
        let plan = outcome.plan();
        assert_eq!(plan.risk_level, RiskLevel::High);
        assert_eq!(plan.llm_mode, LlmMode::Refusal);
        assert_eq!(plan.intent, intents::DANGEROUS_OR_SENSITIVE);
    }

    #[test]
    fn test_classifier_not_called_for_invalid_or_crisis_input() {
        let classifier = Arc::new(CountingClassifier {
            inner: FixedClassifier::category(QuestionCategory::Definition, 0.9),
            calls: AtomicUsize::new(0),
        });
        let pipeline = TriagePipeline::new(classifier.clone(), &TriageConfig::default());

        for text in ["", "   ", "?!", "a1", "how much to OVERDOSE on pills"] {
            let plan = pipeline.classify_question(text).unwrap();
            assert!(plan.is_refusal(), "{text:?} should be refused");
            assert!(!plan.needs_external_data);
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

        pipeline.classify_question("What is asthma?").unwrap();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_outcome() {
        let outcome = pipeline(QuestionCategory::Definition, 0.9).run(" ").unwrap();
        match outcome {
            TriageOutcome::Invalid { plan, reason } => {
                assert_eq!(plan.domain, Domain::Invalid);
                assert_eq!(plan.risk_level, RiskLevel::Low);
                assert_eq!(reason, "input is empty");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_non_medical_always_direct() {
        for score in [0.0, 0.2, 0.4, 0.75, 1.0] {
            let plan = pipeline(QuestionCategory::NonMedical, score)
                .classify_question("Who wrote Les Misérables?")
                .unwrap();
            assert_eq!(plan.llm_mode, LlmMode::Direct);
            assert!(!plan.needs_external_data);
        }
    }

    #[test]
    fn test_low_confidence_always_refuses() {
        for category in QuestionCategory::ALL {
            if category == QuestionCategory::NonMedical {
                continue;
            }
            for score in [0.0, 0.1, 0.399] {
                let plan = pipeline(category, score)
                    .classify_question("Is this rash serious?")
                    .unwrap();
                assert_eq!(plan.llm_mode, LlmMode::Refusal);
                assert_eq!(plan.intent, intents::UNCERTAIN_MEDICAL_QUESTION);
            }
        }
    }

    #[test]
    fn test_medium_confidence_boundary() {
        let outcome = pipeline(QuestionCategory::Definition, 0.40)
            .run("Define tachycardia")
            .unwrap();
        match outcome {
            TriageOutcome::Planned {
                confidence, plan, ..
            } => {
                assert_eq!(confidence, ConfidenceLevel::Medium);
                assert_eq!(plan.llm_mode, LlmMode::Direct);
            }
            other => panic!("expected Planned, got {other:?}"),
        }
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let pipeline = TriagePipeline::new(Arc::new(BrokenClassifier), &TriageConfig::default());
        let err = pipeline.classify_question("What is asthma?").unwrap_err();
        assert!(matches!(err, TriageError::Classifier(_)));
        assert!(err.to_string().contains("model endpoint unreachable"));
    }

    #[test]
    fn test_nan_score_is_classifier_failure() {
        let result = pipeline(QuestionCategory::Definition, f32::NAN).run("What is asthma?");
        assert!(matches!(result, Err(TriageError::Classifier(_))));
    }
}
