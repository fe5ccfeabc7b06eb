use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::openfda::{
    drug_terms, event_search_expression, scalar_text, OpenFdaApi, EVENT_ENDPOINT,
    MAX_SEARCH_TERMS,
};
use super::SourceAdapter;
use crate::error::SourceError;
use crate::http::CachedHttpClient;
use crate::types::{Query, SourceKind, SourceResult};

/// Reports are individual, unverified occurrences.
const EVENT_CONFIDENCE: f32 = 0.7;
const MAX_REACTIONS: usize = 5;
/// openFDA `patientonsetageunit` for years.
const AGE_UNIT_YEARS: &str = "801";

/// Spontaneous adverse event reports from openFDA (`/drug/event.json`).
pub struct AdverseEventAdapter {
    api: OpenFdaApi,
    max_reports: usize,
}

impl AdverseEventAdapter {
    pub fn new(
        client: Arc<CachedHttpClient>,
        base_url: &str,
        api_key: Option<String>,
        max_reports: usize,
    ) -> Self {
        Self {
            api: OpenFdaApi::new(client, base_url, api_key),
            max_reports: max_reports.max(1),
        }
    }
}

#[async_trait]
impl SourceAdapter for AdverseEventAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::AdverseEvent
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
        let limit = max_results.min(self.max_reports);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let records = self
            .api
            .query(EVENT_ENDPOINT, &event_search_expression(&terms), limit)
            .await?;

        let results: Vec<SourceResult> = records
            .iter()
            .take(limit)
            .filter_map(|report| parse_report(report, &terms[0]))
            .collect();
        tracing::info!(terms = ?terms, count = results.len(), "Adverse event search");
        Ok(results)
    }
}

pub fn seriousness_label(code: &str) -> &'static str {
    match code {
        "1" => "serious",
        "2" => "non-serious",
        _ => "unspecified",
    }
}

fn sex_label(code: &str) -> &'static str {
    match code {
        "1" => "male",
        "2" => "female",
        _ => "unspecified",
    }
}

fn parse_report(report: &Value, drug: &str) -> Option<SourceResult> {
    let patient = report.get("patient")?;
    let reactions: Vec<String> = patient
        .get("reaction")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|r| r.get("reactionmeddrapt").and_then(Value::as_str))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .take(MAX_REACTIONS)
        .map(str::to_string)
        .collect();
    if reactions.is_empty() {
        return None;
    }

    let serious_code = scalar_text(report, "serious").unwrap_or_default();
    let mut lines = vec![
        format!("Drug: {}", drug),
        format!("Reported reactions: {}", reactions.join(", ")),
        format!("Seriousness: {}", seriousness_label(&serious_code)),
    ];
    if let Some(age) = scalar_text(patient, "patientonsetage") {
        match scalar_text(patient, "patientonsetageunit").as_deref() {
            None | Some(AGE_UNIT_YEARS) => lines.push(format!("Patient age: {} years", age)),
            Some(_) => lines.push(format!("Patient age: {}", age)),
        }
    }
    if let Some(sex) = scalar_text(patient, "patientsex") {
        lines.push(format!("Patient sex: {}", sex_label(&sex)));
    }

    Some(
        SourceResult::new(
            SourceKind::AdverseEvent,
            format!("Adverse events - {}", drug),
            lines.join("\n"),
            EVENT_CONFIDENCE,
        )
        .with_metadata("reactions", reactions)
        .with_metadata("seriousness", serious_code)
        .with_metadata(
            "report_date",
            scalar_text(report, "receivedate").unwrap_or_default(),
        ),
    )
}
