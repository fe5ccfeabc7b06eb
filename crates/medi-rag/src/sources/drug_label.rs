use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::openfda::{
    drug_terms, first_text, label_search_expression, text_list, OpenFdaApi, LABEL_ENDPOINT,
    MAX_SEARCH_TERMS,
};
use super::SourceAdapter;
use crate::error::SourceError;
use crate::http::CachedHttpClient;
use crate::processing::clean_text;
use crate::types::{Query, SourceKind, SourceResult};

const LABEL_CONFIDENCE: f32 = 0.95;

/// Label sections in rendering order: (heading, openFDA field, max chars).
const SECTIONS: &[(&str, &str, usize)] = &[
    ("Description", "description", 400),
    ("Indications", "indications_and_usage", 300),
    ("Dosage", "dosage_and_administration", 200),
    ("Warnings", "warnings", 200),
];

/// Structured product labels from openFDA (`/drug/label.json`).
pub struct DrugLabelAdapter {
    api: OpenFdaApi,
}

impl DrugLabelAdapter {
    pub fn new(client: Arc<CachedHttpClient>, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            api: OpenFdaApi::new(client, base_url, api_key),
        }
    }
}

#[async_trait]
impl SourceAdapter for DrugLabelAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::DrugLabel
    }

    fn requires_clinical_context(&self) -> bool {
        true
    }

    async fn try_search(
        &self,
        query: &Query,
        max_results: usize,
    ) -> Result<Vec<SourceResult>, SourceError> {
        let terms = drug_terms(query.text(), MAX_SEARCH_TERMS);
        if terms.is_empty() || max_results == 0 {
            tracing::debug!(query = query.text(), "No drug name candidates");
            return Ok(Vec::new());
        }

        let records = self
            .api
            .query(LABEL_ENDPOINT, &label_search_expression(&terms), max_results)
            .await?;

        let results: Vec<SourceResult> = records
            .iter()
            .take(max_results)
            .filter_map(|record| parse_label(record, &terms[0]))
            .collect();
        tracing::info!(terms = ?terms, count = results.len(), "Drug label search");
        Ok(results)
    }
}

/// One label record as a `SourceResult`. Records with no usable section
/// are skipped.
fn parse_label(record: &Value, term: &str) -> Option<SourceResult> {
    let content = SECTIONS
        .iter()
        .filter_map(|(heading, field, max_chars)| {
            let text = clean_text(first_text(record, field)?, *max_chars);
            (!text.is_empty()).then(|| format!("{}: {}", heading, text))
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    if content.is_empty() {
        return None;
    }

    let null = Value::Null;
    let openfda = record.get("openfda").unwrap_or(&null);
    let brand_names = text_list(openfda, "brand_name");
    let generic_names = text_list(openfda, "generic_name");

    let brand = brand_names
        .first()
        .cloned()
        .unwrap_or_else(|| capitalize(term));
    let generic = generic_names.first().cloned().unwrap_or_else(|| term.to_string());
    let title = if brand.eq_ignore_ascii_case(&generic) {
        generic.clone()
    } else {
        format!("{} ({})", brand, generic)
    };

    let url = first_text(record, "set_id")
        .map(|set_id| format!("https://dailymed.nlm.nih.gov/dailymed/lookup.cfm?setid={}", set_id));

    Some(
        SourceResult::new(SourceKind::DrugLabel, title, content, LABEL_CONFIDENCE)
            .with_url(url)
            .with_metadata("drug_id", first_text(openfda, "spl_id"))
            .with_metadata(
                "manufacturer",
                first_text(openfda, "manufacturer_name").unwrap_or("Unknown"),
            )
            .with_metadata("brand_names", brand_names)
            .with_metadata("generic_names", generic_names)
            .with_metadata("route", first_text(openfda, "route").unwrap_or_default())
            .with_metadata(
                "product_type",
                first_text(openfda, "product_type").unwrap_or_default(),
            ),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
