use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// A user question, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Dataset,
    Encyclopedia,
    DrugLabel,
    AdverseEvent,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Encyclopedia => "encyclopedia",
            Self::DrugLabel => "drug_label",
            Self::AdverseEvent => "adverse_event",
        }
    }

    /// Heading used when evidence is rendered into a prompt.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dataset => "MEDICAL DATASET",
            Self::Encyclopedia => "ENCYCLOPEDIA",
            Self::DrugLabel => "DRUG LABELS",
            Self::AdverseEvent => "ADVERSE EVENT REPORTS",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized piece of evidence produced by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: SourceKind,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub confidence: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SourceResult {
    pub fn new(
        source: SourceKind,
        title: impl Into<String>,
        content: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            source,
            title: title.into(),
            content: content.into(),
            url: None,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: HashMap::new(),
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregated, possibly partial, evidence for one query.
///
/// `succeeded` is false as soon as one error is recorded; results gathered
/// from the sources that did answer are kept either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub query: Query,
    pub results: Vec<SourceResult>,
    pub errors: Vec<String>,
    pub succeeded: bool,
}

impl ResultEnvelope {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            results: Vec::new(),
            errors: Vec::new(),
            succeeded: true,
        }
    }

    pub fn add_result(&mut self, result: SourceResult) {
        self.results.push(result);
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.succeeded = false;
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Some sources failed but others returned evidence.
    pub fn is_degraded(&self) -> bool {
        !self.succeeded && !self.results.is_empty()
    }

    /// Every queried source failed; there is no evidence at all.
    pub fn is_unavailable(&self) -> bool {
        !self.succeeded && self.results.is_empty()
    }
}

/// Question categories the classifier chooses between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Definition,
    Reasoning,
    StepwiseProcedure,
    MultipleChoice,
    NonMedical,
}

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 5] = [
        Self::Definition,
        Self::Reasoning,
        Self::StepwiseProcedure,
        Self::MultipleChoice,
        Self::NonMedical,
    ];

    /// Candidate label phrasing handed to the zero-shot classifier.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Definition => "medical definition question",
            Self::Reasoning => "medical reasoning question",
            Self::StepwiseProcedure => "medical stepwise procedure question",
            Self::MultipleChoice => "medical multiple choice question",
            Self::NonMedical => "non-medical question",
        }
    }

    /// Accepts either the classifier phrasing or the snake_case name.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| {
            c.label() == normalized
                || serde_json::to_value(c)
                    .ok()
                    .and_then(|v| v.as_str().map(|s| s == normalized))
                    .unwrap_or(false)
        })
    }

    pub fn candidate_labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

/// Raw classifier output for one query. Never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Medical,
    NonMedical,
    Invalid,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmMode {
    Direct,
    Refusal,
}

pub mod intents {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const DANGEROUS_OR_SENSITIVE: &str = "dangerous_or_sensitive";
    pub const GENERAL_QUESTION: &str = "general_question";
    pub const UNCERTAIN_MEDICAL_QUESTION: &str = "uncertain_medical_question";
    pub const MEDICAL_DEFINITION: &str = "medical_definition";
    pub const MEDICAL_REASONING: &str = "medical_reasoning";
    pub const UNCLASSIFIED: &str = "unclassified";
}

/// The single decision governing what may be done with a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionPlan {
    pub domain: Domain,
    pub intent: String,
    pub confidence: f32,
    pub risk_level: RiskLevel,
    pub needs_external_data: bool,
    pub llm_mode: LlmMode,
}

impl ActionPlan {
    pub fn is_refusal(&self) -> bool {
        self.llm_mode == LlmMode::Refusal
    }
}
