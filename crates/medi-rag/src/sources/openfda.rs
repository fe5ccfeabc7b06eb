//! Shared plumbing for the openFDA drug endpoints.
//!
//! openFDA answers "no match" with a 404 and an error body, so that status
//! is read as an empty result set rather than a failure.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{HttpError, SourceError};
use crate::http::{params, CachedHttpClient};

pub const LABEL_ENDPOINT: &str = "/drug/label.json";
pub const EVENT_ENDPOINT: &str = "/drug/event.json";

/// At most this many candidate drug names are OR'd into one search.
pub const MAX_SEARCH_TERMS: usize = 3;

/// Question words and clinical filler that never name a drug.
const NON_DRUG_WORDS: &[&str] = &[
    // English
    "what", "which", "who", "whom", "when", "where", "why", "how", "does", "do", "did", "is",
    "are", "was", "were", "can", "could", "should", "would", "will", "may", "might", "the",
    "and", "for", "with", "without", "about", "from", "into", "that", "this", "these",
    "those", "there", "have", "has", "had", "take", "taking", "use", "used", "uses", "using",
    "side", "effect", "effects", "adverse", "reaction", "reactions", "dose", "doses",
    "dosage", "drug", "drugs", "medication", "medications", "medicine", "pill", "pills",
    "tablet", "tablets", "safe", "daily", "much", "many", "often", "interaction",
    "interactions", "warning", "warnings", "tell", "explain", "please",
    // French
    "quel", "quelle", "quels", "quelles", "est", "sont", "les", "des", "une",
    "pour", "avec", "sans", "dans", "sur", "par", "que", "qui", "quoi", "comment",
    "pourquoi", "combien", "peut", "puis", "faut", "effet", "effets", "secondaire",
    "secondaires", "indésirable", "indésirables", "médicament", "médicaments",
    "medicament", "medicaments", "posologie", "traitement", "comprimé", "comprimés",
    "pillule", "prendre", "prise", "contre-indication", "contre-indications",
];

/// French elided articles and pronouns (`l'aspirine`, `qu'est-ce`).
const ELIDED_PREFIXES: &[&str] = &[
    "l", "d", "j", "m", "n", "s", "t", "c", "qu", "jusqu", "lorsqu", "puisqu",
];

/// Candidate drug names from a free-text question: lowercase words left
/// after dropping punctuation, elisions, possessives, question words and
/// clinical filler.
pub fn drug_terms(question: &str, max_terms: usize) -> Vec<String> {
    let lower = question.to_lowercase().replace('\u{2019}', "'");
    let mut seen = HashSet::new();
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\''))
        .map(strip_elision)
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !is_filler(w))
        .filter(|w| seen.insert(w.to_string()))
        .take(max_terms)
        .map(str::to_string)
        .collect()
}

/// `l'aspirine` -> `aspirine`, `aspirin's` -> `aspirin`.
fn strip_elision(word: &str) -> &str {
    let mut rest = word.trim_matches(|c: char| c == '-' || c == '\'');
    if let Some((head, tail)) = rest.split_once('\'') {
        if ELIDED_PREFIXES.contains(&head) {
            rest = tail;
        }
    }
    if let Some(stem) = rest.strip_suffix("'s") {
        rest = stem;
    }
    rest.trim_matches(|c: char| c == '-' || c == '\'')
}

/// A stopword, or a hyphenated word made only of stopwords and short parts.
fn is_filler(word: &str) -> bool {
    NON_DRUG_WORDS.contains(&word)
        || word
            .split('-')
            .all(|part| part.chars().count() < 3 || NON_DRUG_WORDS.contains(&part))
}

/// `generic_name:"x" OR brand_name:"x" OR openfda.substance_name:"x"` for
/// every term.
pub fn label_search_expression(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| {
            format!(
                "generic_name:\"{0}\" OR brand_name:\"{0}\" OR openfda.substance_name:\"{0}\"",
                t
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub fn event_search_expression(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("patient.drug.medicinalproduct:\"{}\"", t))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// First string of a field that openFDA stores either as a string or as an
/// array of strings.
pub fn first_text<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    match record.get(field)? {
        Value::String(s) => non_blank(s),
        Value::Array(items) => items.iter().filter_map(Value::as_str).find_map(non_blank),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|t| !t.is_empty())
}

/// All strings of an array field, empty when absent.
pub fn text_list(record: &Value, field: &str) -> Vec<String> {
    record
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Scalar field rendered as a string; openFDA mixes `"2"` and `2`.
pub fn scalar_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Thin openFDA query helper shared by the label and event adapters.
#[derive(Clone)]
pub struct OpenFdaApi {
    client: Arc<CachedHttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl OpenFdaApi {
    pub fn new(client: Arc<CachedHttpClient>, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Run `search` against `endpoint` and return the `results` records.
    pub async fn query(
        &self,
        endpoint: &str,
        search: &str,
        limit: usize,
    ) -> Result<Vec<Value>, SourceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut query_params = params([
            ("search", search.to_string()),
            ("limit", limit.to_string()),
            ("skip", "0".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            query_params.insert("api_key".to_string(), key.clone());
        }

        let body = match self.client.get(&url, &query_params).await {
            Ok(body) => body,
            Err(HttpError::Status { status: 404, .. }) => {
                tracing::debug!(endpoint, search, "openFDA returned no matches");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match body.get("results") {
            Some(Value::Array(records)) => Ok(records.clone()),
            Some(_) => Err(SourceError::Parse("openFDA `results` is not an array".into())),
            None if body.get("text").is_some() => Err(SourceError::Parse(
                "openFDA returned a non-JSON body".into(),
            )),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drug_terms_strip_question_words() {
        assert_eq!(
            drug_terms("What are the side effects of Aspirin?", 3),
            vec!["aspirin"]
        );
        assert_eq!(
            drug_terms("Quels sont les effets secondaires du paracetamol ?", 3),
            vec!["paracetamol"]
        );
    }

    #[test]
    fn test_drug_terms_strip_elisions_and_possessives() {
        assert_eq!(
            drug_terms("Quelle est la posologie de l'ibuprofène ?", 3),
            vec!["ibuprofène"]
        );
        assert_eq!(drug_terms("Qu'est-ce que l'aspirine ?", 3), vec!["aspirine"]);
        assert_eq!(drug_terms("What are aspirin's side effects?", 3), vec!["aspirin"]);
        assert_eq!(
            drug_terms("Posologie d\u{2019}amoxicilline ?", 3),
            vec!["amoxicilline"]
        );
        assert_eq!(drug_terms("co-trimoxazole dosage", 3), vec!["co-trimoxazole"]);
    }

    #[test]
    fn test_label_search_uses_bare_drug_name() {
        let terms = drug_terms("Qu'est-ce que l'aspirine ?", MAX_SEARCH_TERMS);
        assert_eq!(
            label_search_expression(&terms),
            r#"generic_name:"aspirine" OR brand_name:"aspirine" OR openfda.substance_name:"aspirine""#
        );
    }

    #[test]
    fn test_drug_terms_dedupe_and_cap() {
        assert_eq!(
            drug_terms("ibuprofen, ibuprofen and aspirin or warfarin plus metformin 500", 3),
            vec!["ibuprofen", "aspirin", "warfarin"]
        );
        assert!(drug_terms("what is it?", 3).is_empty());
    }

    #[test]
    fn test_label_search_expression() {
        let expr = label_search_expression(&["aspirin".to_string()]);
        assert_eq!(
            expr,
            r#"generic_name:"aspirin" OR brand_name:"aspirin" OR openfda.substance_name:"aspirin""#
        );
        let two = event_search_expression(&["a".to_string(), "b".to_string()]);
        assert_eq!(
            two,
            r#"patient.drug.medicinalproduct:"a" OR patient.drug.medicinalproduct:"b""#
        );
    }

    #[test]
    fn test_field_helpers() {
        let record = json!({
            "warnings": ["  ", "Do not exceed"],
            "serious": 2,
            "brand_name": "Bayer",
            "route": ["ORAL", "TOPICAL"]
        });
        assert_eq!(first_text(&record, "warnings"), Some("Do not exceed"));
        assert_eq!(first_text(&record, "brand_name"), Some("Bayer"));
        assert_eq!(first_text(&record, "missing"), None);
        assert_eq!(scalar_text(&record, "serious").as_deref(), Some("2"));
        assert_eq!(text_list(&record, "route"), vec!["ORAL", "TOPICAL"]);
    }
}
