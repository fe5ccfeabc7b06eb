use crate::config::TriageConfig;
use crate::processing::normalize_whitespace;

/// Built-in self-harm and crisis phrases, English then French.
pub fn default_crisis_phrases() -> Vec<String> {
    [
        "kill myself",
        "suicide",
        "self-harm",
        "end my life",
        "hurt myself",
        "poison",
        "overdose",
        "harm myself",
        "me suicider",
        "me tuer",
        "en finir avec la vie",
        "mettre fin à mes jours",
        "me faire du mal",
        "surdose",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Outcome of the checks that run before any classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Empty,
    TooShort { meaningful_chars: usize },
    Crisis { phrase: String },
    Valid,
}

impl Validation {
    pub fn reason(&self) -> String {
        match self {
            Self::Empty => "input is empty".to_string(),
            Self::TooShort { meaningful_chars } => format!(
                "input is too short to analyze ({} meaningful characters)",
                meaningful_chars
            ),
            Self::Crisis { phrase } => format!("contains crisis phrase: {}", phrase),
            Self::Valid => "input is valid".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputValidator {
    min_meaningful_chars: usize,
    crisis_phrases: Vec<String>,
}

impl InputValidator {
    pub fn new(min_meaningful_chars: usize, crisis_phrases: Vec<String>) -> Self {
        let crisis_phrases = crisis_phrases
            .into_iter()
            .map(|p| normalize_whitespace(&p.to_lowercase()))
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            min_meaningful_chars,
            crisis_phrases,
        }
    }

    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(config.min_meaningful_chars, config.crisis_phrases.clone())
    }

    /// Emptiness, then length, then the crisis denylist. Nothing here
    /// depends on a model.
    pub fn validate(&self, text: &str) -> Validation {
        if text.trim().is_empty() {
            return Validation::Empty;
        }

        let meaningful_chars = text.chars().filter(|c| c.is_alphanumeric()).count();
        if meaningful_chars < self.min_meaningful_chars {
            return Validation::TooShort { meaningful_chars };
        }

        let normalized = normalize_whitespace(&text.to_lowercase());
        match self
            .crisis_phrases
            .iter()
            .find(|phrase| normalized.contains(phrase.as_str()))
        {
            Some(phrase) => Validation::Crisis {
                phrase: phrase.clone(),
            },
            None => Validation::Valid,
        }
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::from_config(&TriageConfig::default())
    }
}
