//! Curated question/answer corpus
//!
//! A flat file of `(instruction, input, output)` records, either a JSON
//! array or one JSON object per line. The file is read on first search and
//! kept in memory; it is never written.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::SourceAdapter;
use crate::error::SourceError;
use crate::processing::{clean_text, truncate_chars};
use crate::types::{Query, SourceKind, SourceResult};

const DATASET_CONFIDENCE: f32 = 0.9;
const TITLE_MAX_CHARS: usize = 120;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetRecord {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
}

pub struct DatasetAdapter {
    path: Option<PathBuf>,
    max_chars: usize,
    corpus: RwLock<Option<Arc<Vec<DatasetRecord>>>>,
}

impl DatasetAdapter {
    /// Adapter over a file that is loaded lazily on first search.
    pub fn from_path(path: impl AsRef<Path>, max_chars: usize) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            max_chars,
            corpus: RwLock::new(None),
        }
    }

    /// Adapter over records already in memory.
    pub fn from_records(records: Vec<DatasetRecord>, max_chars: usize) -> Self {
        Self {
            path: None,
            max_chars,
            corpus: RwLock::new(Some(Arc::new(records))),
        }
    }

    async fn corpus(&self) -> Result<Arc<Vec<DatasetRecord>>, SourceError> {
        let cached = self.corpus.read().clone();
        if let Some(corpus) = cached {
            return Ok(corpus);
        }
        let Some(path) = &self.path else {
            return Err(SourceError::Unavailable("dataset has no backing file".into()));
        };

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            SourceError::Unavailable(format!("failed to read dataset {}: {}", path.display(), e))
        })?;
        let records = Arc::new(parse_records(&raw)?);
        tracing::info!(path = %path.display(), records = records.len(), "Dataset loaded");

        *self.corpus.write() = Some(records.clone());
        Ok(records)
    }
}

#[async_trait]
impl SourceAdapter for DatasetAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Dataset
    }

    async fn try_search(
        &self,
        query: &Query,
        max_results: usize,
    ) -> Result<Vec<SourceResult>, SourceError> {
        let corpus = self.corpus().await?;
        let query_words = words(query.text());
        if query_words.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &DatasetRecord)> = corpus
            .iter()
            .map(|record| (word_overlap(&query_words, record), record))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // Stable sort keeps file order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let results = scored
            .into_iter()
            .take(max_results)
            .map(|(score, record)| self.to_result(record, score))
            .collect();
        Ok(results)
    }
}

impl DatasetAdapter {
    fn to_result(&self, record: &DatasetRecord, similarity: f32) -> SourceResult {
        let mut result = SourceResult::new(
            SourceKind::Dataset,
            truncate_chars(record.instruction.trim(), TITLE_MAX_CHARS),
            clean_text(&record.output, self.max_chars),
            DATASET_CONFIDENCE,
        )
        .with_metadata("similarity", similarity);
        if !record.input.trim().is_empty() {
            result = result.with_metadata("input", record.input.trim());
        }
        result
    }
}

/// JSON array, or JSON lines when the text does not start with `[`.
fn parse_records(raw: &str) -> Result<Vec<DatasetRecord>, SourceError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| SourceError::Parse(format!("dataset JSON array: {}", e)));
    }

    let mut records = Vec::new();
    for (line_no, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed dataset line"),
        }
    }
    Ok(records)
}

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Share of query words that also appear in the record's instruction or input.
fn word_overlap(query_words: &HashSet<String>, record: &DatasetRecord) -> f32 {
    let mut record_words = words(&record.instruction);
    record_words.extend(words(&record.input));
    let common = query_words.intersection(&record_words).count();
    common as f32 / query_words.len().max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(instruction: &str, output: &str) -> DatasetRecord {
        DatasetRecord {
            instruction: instruction.into(),
            input: String::new(),
            output: output.into(),
        }
    }

    #[tokio::test]
    async fn test_ranked_by_overlap() {
        let adapter = DatasetAdapter::from_records(
            vec![
                record("What causes a headache?", "Many things."),
                record("What is hypertension?", "High blood pressure."),
                record("Define hypertension in adults", "Sustained high pressure."),
                record("Unrelated entry", "Nothing."),
            ],
            1_000,
        );

        let results = adapter
            .try_search(&Query::new("What is hypertension?"), 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "What is hypertension?");
        assert_eq!(results[0].metadata["similarity"], serde_json::json!(1.0));
        assert_eq!(results[0].confidence, 0.9);
        // Both remaining matches score 1/3; file order wins.
        assert_eq!(results[1].title, "What causes a headache?");
    }

    #[tokio::test]
    async fn test_no_overlap_is_empty() {
        let adapter = DatasetAdapter::from_records(vec![record("Fever", "Heat.")], 1_000);
        let results = adapter.try_search(&Query::new("aspirin"), 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_lazy_load_jsonl() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"instruction": "What is asthma?", "output": "A lung disease."}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"instruction": "Asthma triggers", "input": "child", "output": "Dust."}}"#).unwrap();

        let adapter = DatasetAdapter::from_path(file.path(), 1_000);
        let results = adapter.try_search(&Query::new("asthma"), 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].metadata["input"], serde_json::json!("child"));
    }

    #[tokio::test]
    async fn test_lazy_load_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"instruction": "Insulin role", "output": "Lowers glucose."}}]"#).unwrap();

        let adapter = DatasetAdapter::from_path(file.path(), 1_000);
        let results = adapter.try_search(&Query::new("insulin"), 5).await.unwrap();
        assert_eq!(results[0].content, "Lowers glucose.");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let adapter = DatasetAdapter::from_path("/definitely/not/here.json", 1_000);
        let err = adapter.try_search(&Query::new("x"), 3).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
