//! Query triage
//!
//! Decides, before any retrieval or generation, what may be done with a
//! question: answer directly, answer only with grounding, or refuse.

pub mod classifier;
pub mod confidence;
pub mod planner;
pub mod pipeline;
pub mod validator;

pub use classifier::{FixedClassifier, KeywordClassifier, QuestionClassifier};
pub use confidence::{compute_confidence, ConfidenceThresholds};
pub use pipeline::{TriageOutcome, TriagePipeline};
pub use planner::Planner;
pub use validator::{default_crisis_phrases, InputValidator, Validation};
