//! Multi-source evidence retrieval and prompt rendering.

pub mod formatter;
pub mod orchestrator;
pub mod vocabulary;

pub use formatter::format_for_prompt;
pub use orchestrator::RetrievalOrchestrator;
pub use vocabulary::{default_clinical_terms, looks_clinical};
