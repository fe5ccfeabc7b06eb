//! Answer assembly: triage, grounding, generation.

pub mod generator;
pub mod responses;
pub mod service;

pub use generator::{
    AnswerGenerator, CachedGenerator, GenerationRequest, GenerationResponse, GenerationStatus,
};
pub use service::{AnswerStatus, AssistantAnswer, MedicalAssistant};
