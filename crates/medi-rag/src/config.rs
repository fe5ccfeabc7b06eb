use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{LlmMode, QuestionCategory, RiskLevel};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediRagConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub retrieval: RetrievalConfig,
    pub triage: TriageConfig,
    pub generation: GenerationCacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub cache_ttl_secs: u64,
    /// Directory for persisted cache entries.
    pub cache_dir: Option<PathBuf>,
    /// Persist under `default_cache_dir()` when `cache_dir` is unset.
    pub persist_cache: bool,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Where cache entries go on disk. `None` keeps the cache in memory.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| self.persist_cache.then(Self::default_cache_dir))
    }

    /// Per-user cache location, `<cache>/medi-rag/http`.
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medi-rag")
            .join("http")
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let cache_dir = std::env::var("MEDI_RAG_CACHE_DIR").ok().map(PathBuf::from);
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 10_000,
            cache_ttl_secs: 3_600,
            cache_dir,
            persist_cache: false,
            user_agent: "medi-rag/0.1 (medical question assistant)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub encyclopedia_endpoint: String,
    /// Language subdomain used to build page links (`fr` → fr.wikipedia.org).
    pub encyclopedia_language: String,
    pub openfda_base_url: String,
    pub openfda_api_key: Option<String>,
    /// JSON array or JSON-lines file of `{instruction, input, output}` records.
    pub dataset_path: Option<PathBuf>,
    pub enable_encyclopedia: bool,
    pub enable_drug_label: bool,
    pub enable_adverse_event: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            encyclopedia_endpoint: "https://fr.wikipedia.org/w/api.php".to_string(),
            encyclopedia_language: "fr".to_string(),
            openfda_base_url: "https://api.fda.gov".to_string(),
            openfda_api_key: std::env::var("OPENFDA_API_KEY").ok(),
            dataset_path: None,
            enable_encyclopedia: true,
            enable_drug_label: true,
            enable_adverse_event: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_results_per_source: usize,
    /// Upper bound on cleaned content stored in a `SourceResult`.
    pub content_max_chars: usize,
    /// Per-result preview length in the prompt block.
    pub prompt_preview_chars: usize,
    /// Adverse-event reports are expensive to fetch and read; one is enough.
    pub adverse_event_max_results: usize,
    /// Terms that mark a question as clinical enough to query drug registries.
    pub clinical_vocabulary: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results_per_source: 3,
            content_max_chars: 1_000,
            prompt_preview_chars: 200,
            adverse_event_max_results: 1,
            clinical_vocabulary: crate::retrieval::vocabulary::default_clinical_terms(),
        }
    }
}

/// Risk and generation mode applied to a confident medical category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRule {
    pub intent: String,
    pub risk_level: RiskLevel,
    pub llm_mode: LlmMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub high_threshold: f32,
    pub medium_threshold: f32,
    pub min_meaningful_chars: usize,
    pub crisis_phrases: Vec<String>,
    /// Rules for medical categories at medium/high confidence. Categories
    /// without a rule fall through to the unclassified plan.
    pub category_rules: HashMap<QuestionCategory, CategoryRule>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        let mut category_rules = HashMap::new();
        category_rules.insert(
            QuestionCategory::Definition,
            CategoryRule {
                intent: crate::types::intents::MEDICAL_DEFINITION.to_string(),
                risk_level: RiskLevel::Low,
                llm_mode: LlmMode::Direct,
            },
        );
        for category in [
            QuestionCategory::Reasoning,
            QuestionCategory::StepwiseProcedure,
            QuestionCategory::MultipleChoice,
        ] {
            category_rules.insert(
                category,
                CategoryRule {
                    intent: crate::types::intents::MEDICAL_REASONING.to_string(),
                    risk_level: RiskLevel::Medium,
                    llm_mode: LlmMode::Refusal,
                },
            );
        }

        Self {
            high_threshold: 0.75,
            medium_threshold: 0.40,
            min_meaningful_chars: 3,
            crisis_phrases: crate::triage::validator::default_crisis_phrases(),
            category_rules,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationCacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for GenerationCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 24 * 3_600,
        }
    }
}

impl MediRagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs must be > 0");
        }
        if self.http.connect_timeout_secs == 0 {
            return invalid("http.connect_timeout_secs must be > 0");
        }
        if self.http.max_attempts == 0 {
            return invalid("http.max_attempts must be >= 1");
        }
        if self.http.backoff_cap_ms < self.http.backoff_base_ms {
            return invalid("http.backoff_cap_ms must be >= backoff_base_ms");
        }
        if self.retrieval.max_results_per_source == 0 {
            return invalid("retrieval.max_results_per_source must be > 0");
        }
        if self.retrieval.content_max_chars < 50 {
            return invalid("retrieval.content_max_chars must be >= 50");
        }
        let t = &self.triage;
        if !(0.0..=1.0).contains(&t.medium_threshold) || !(0.0..=1.0).contains(&t.high_threshold)
        {
            return invalid("triage thresholds must be in [0.0, 1.0]");
        }
        if t.medium_threshold > t.high_threshold {
            return invalid("triage.medium_threshold must be <= high_threshold");
        }
        if t.category_rules.contains_key(&QuestionCategory::NonMedical) {
            return invalid("triage.category_rules cannot override non_medical");
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
