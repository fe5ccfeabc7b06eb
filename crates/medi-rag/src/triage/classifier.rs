//! Question classification oracle.
//!
//! The triage pipeline treats classification as a black box that picks one
//! of the candidate labels with a score. A zero-shot model is the intended
//! backend; `KeywordClassifier` is a model-free stand-in for offline use.

use anyhow::{bail, Result};
use std::sync::LazyLock;

use crate::retrieval::vocabulary::{default_clinical_terms, looks_clinical};
use crate::types::{Classification, QuestionCategory};

static OPTION_LIST_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)(^|\s)\(?[a-e]\)\s").expect("option list regex is valid")
});

/// Picks a label for a question. Must be reentrant; the pipeline may call
/// it from several queries at once.
pub trait QuestionClassifier: Send + Sync {
    /// Choose one of `candidate_labels` for `text`, with a score in [0, 1].
    fn classify(&self, text: &str, candidate_labels: &[String]) -> Result<Classification>;
}

/// Always answers with the same classification.
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    classification: Classification,
}

impl FixedClassifier {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            classification: Classification {
                label: label.into(),
                score,
            },
        }
    }

    pub fn category(category: QuestionCategory, score: f32) -> Self {
        Self::new(category.label(), score)
    }
}

impl QuestionClassifier for FixedClassifier {
    fn classify(&self, _text: &str, _candidate_labels: &[String]) -> Result<Classification> {
        Ok(self.classification.clone())
    }
}

/// Pattern-based classifier. Scores are fixed per rule, chosen so that
/// only clear patterns reach the high band.
pub struct KeywordClassifier {
    clinical_vocabulary: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(clinical_vocabulary: Vec<String>) -> Self {
        Self {
            clinical_vocabulary,
        }
    }

    pub fn categorize(&self, text: &str) -> (QuestionCategory, f32) {
        let lower = text.trim().to_lowercase();

        if !looks_clinical(&lower, &self.clinical_vocabulary) {
            return (QuestionCategory::NonMedical, 0.7);
        }
        if self.is_multiple_choice(&lower) {
            return (QuestionCategory::MultipleChoice, 0.85);
        }
        if self.is_stepwise(&lower) {
            return (QuestionCategory::StepwiseProcedure, 0.75);
        }
        if self.is_definition(&lower) {
            return (QuestionCategory::Definition, 0.8);
        }
        if self.is_reasoning(&lower) {
            return (QuestionCategory::Reasoning, 0.6);
        }
        // Clinical but shapeless: leave it in the low band.
        (QuestionCategory::Reasoning, 0.3)
    }

    fn is_multiple_choice(&self, query: &str) -> bool {
        let patterns = [
            "which of the following",
            "choose the correct",
            "select the correct",
            "lequel des",
            "laquelle des",
            "quelle proposition",
        ];
        patterns.iter().any(|p| query.contains(p)) || OPTION_LIST_RE.find_iter(query).count() >= 2
    }

    fn is_stepwise(&self, query: &str) -> bool {
        let starts = ["how to", "how do i", "how should i", "comment faire", "comment traiter"];
        let contains = [
            "step by step",
            "steps to",
            "procedure for",
            "étape par étape",
            "étapes",
            "procédure",
        ];
        starts.iter().any(|p| query.starts_with(p)) || contains.iter().any(|p| query.contains(p))
    }

    fn is_definition(&self, query: &str) -> bool {
        let starts = [
            "what is",
            "what are",
            "what's",
            "define",
            "definition",
            "meaning of",
            "qu'est-ce",
            "qu'est ce",
            "c'est quoi",
            "définition",
            "que signifie",
            "que veut dire",
        ];
        starts.iter().any(|p| query.starts_with(p))
            || (query.contains("what does") && query.contains("mean"))
    }

    fn is_reasoning(&self, query: &str) -> bool {
        let patterns = [
            "why", "should i", "could it be", "diagnos", "cause", "risk", "differential",
            "pourquoi", "dois-je", "est-ce grave", "risque",
        ];
        patterns.iter().any(|p| query.contains(p))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(default_clinical_terms())
    }
}

impl QuestionClassifier for KeywordClassifier {
    fn classify(&self, text: &str, candidate_labels: &[String]) -> Result<Classification> {
        let (category, score) = self.categorize(text);
        let Some(label) = candidate_labels
            .iter()
            .find(|l| QuestionCategory::from_label(l) == Some(category))
        else {
            bail!("no candidate label for category {:?}", category);
        };
        Ok(Classification {
            label: label.clone(),
            score,
        })
    }
}
