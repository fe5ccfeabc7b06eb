pub mod assistant;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod processing;
pub mod retrieval;
pub mod sources;
pub mod triage;
pub mod types;

// Re-export primary types for convenience
pub use assistant::{AnswerGenerator, AssistantAnswer, MedicalAssistant};
pub use config::MediRagConfig;
pub use error::{ConfigError, HttpError, SourceError, TriageError};
pub use http::CachedHttpClient;
pub use retrieval::RetrievalOrchestrator;
pub use sources::SourceAdapter;
pub use triage::{QuestionClassifier, TriageOutcome, TriagePipeline};
pub use types::{
    ActionPlan, Classification, ConfidenceLevel, Domain, LlmMode, Query, ResultEnvelope,
    RiskLevel, SourceKind, SourceResult,
};

// Re-export common types
pub use anyhow::{Error, Result};
