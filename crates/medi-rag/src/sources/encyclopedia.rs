use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::SourceAdapter;
use crate::error::SourceError;
use crate::http::{params, CachedHttpClient};
use crate::processing::{clean_text, extract_summary};
use crate::types::{Query, SourceKind, SourceResult};

const SEARCH_CONFIDENCE: f32 = 0.8;
const PAGE_CONFIDENCE: f32 = 0.9;
const SNIPPET_MAX_CHARS: usize = 500;
const PAGE_MAX_CHARS: usize = 1_500;
/// Page extracts longer than this are cut down to their first sentences.
const PAGE_SUMMARY_THRESHOLD: usize = 800;
const PAGE_SUMMARY_SENTENCES: usize = 3;
const PAGE_EXTRACT_CHARS: &str = "1000";

/// MediaWiki search (`list=search`) against a single-language encyclopedia.
pub struct EncyclopediaAdapter {
    client: Arc<CachedHttpClient>,
    endpoint: String,
    language: String,
    max_chars: usize,
}

impl EncyclopediaAdapter {
    pub fn new(
        client: Arc<CachedHttpClient>,
        endpoint: &str,
        language: &str,
        max_chars: usize,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            language: language.to_string(),
            max_chars,
        }
    }

    /// `https://<host>/?curid=<id>`, which resolves to the page whatever its title.
    pub fn page_url(&self, page_id: u64) -> String {
        let origin = url::Url::parse(&self.endpoint)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| format!("https://{}.wikipedia.org", self.language));
        format!("{}/?curid={}", origin, page_id)
    }

    /// Plain-text introduction of one page. `Ok(None)` when the page does
    /// not exist or has no extract.
    pub async fn page_content(&self, page_id: u64) -> Result<Option<SourceResult>, SourceError> {
        let query_params = params([
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("pageids", page_id.to_string()),
            ("prop", "extracts|info".to_string()),
            ("inprop", "url".to_string()),
            ("exintro", "1".to_string()),
            ("explaintext", "1".to_string()),
            ("exchars", PAGE_EXTRACT_CHARS.to_string()),
            ("utf8", "1".to_string()),
        ]);
        let body = self.client.get(&self.endpoint, &query_params).await?;
        check_api_error(&body)?;

        let Some(page) = body
            .pointer("/query/pages")
            .and_then(|pages| pages.get(page_id.to_string()))
        else {
            return Ok(None);
        };
        if page.get("missing").is_some() {
            return Ok(None);
        }

        let extract = page.get("extract").and_then(Value::as_str).unwrap_or("");
        let mut content = clean_text(extract, PAGE_MAX_CHARS);
        if content.is_empty() {
            return Ok(None);
        }
        if content.chars().count() > PAGE_SUMMARY_THRESHOLD {
            content = extract_summary(&content, PAGE_SUMMARY_SENTENCES);
        }

        let title = page.get("title").and_then(Value::as_str).unwrap_or_default();
        let url = page
            .get("fullurl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.page_url(page_id));

        Ok(Some(
            SourceResult::new(SourceKind::Encyclopedia, title, content, PAGE_CONFIDENCE)
                .with_url(Some(url))
                .with_metadata("page_id", page_id)
                .with_metadata("language", self.language.as_str()),
        ))
    }

    fn parse_hit(&self, hit: &Value) -> Option<SourceResult> {
        let title = hit.get("title").and_then(Value::as_str)?.trim();
        if title.is_empty() {
            return None;
        }
        let snippet = hit.get("snippet").and_then(Value::as_str).unwrap_or("");
        let content = clean_text(snippet, SNIPPET_MAX_CHARS.min(self.max_chars));
        let page_id = hit.get("pageid").and_then(Value::as_u64);

        let mut result = SourceResult::new(SourceKind::Encyclopedia, title, content, SEARCH_CONFIDENCE)
            .with_url(page_id.map(|id| self.page_url(id)))
            .with_metadata("language", self.language.as_str());
        if let Some(id) = page_id {
            result = result.with_metadata("page_id", id);
        }
        Some(result)
    }
}

#[async_trait]
impl SourceAdapter for EncyclopediaAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Encyclopedia
    }

    async fn try_search(
        &self,
        query: &Query,
        max_results: usize,
    ) -> Result<Vec<SourceResult>, SourceError> {
        let text = query.text().trim();
        if text.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let query_params = params([
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("list", "search".to_string()),
            ("srsearch", text.to_string()),
            ("srlimit", max_results.to_string()),
            ("srprop", "snippet".to_string()),
            ("utf8", "1".to_string()),
            ("srinterwiki", "1".to_string()),
        ]);
        let body = self.client.get(&self.endpoint, &query_params).await?;
        check_api_error(&body)?;

        let Some(hits) = body.pointer("/query/search").and_then(Value::as_array) else {
            tracing::warn!(query = text, "No encyclopedia search results");
            return Ok(Vec::new());
        };

        let results: Vec<SourceResult> = hits
            .iter()
            .take(max_results)
            .filter_map(|hit| self.parse_hit(hit))
            .collect();
        tracing::info!(query = text, count = results.len(), "Encyclopedia search");
        Ok(results)
    }
}

/// MediaWiki reports bad requests as `{"error": {"code", "info"}}` with a 200.
fn check_api_error(body: &Value) -> Result<(), SourceError> {
    if let Some(error) = body.get("error") {
        let info = error
            .get("info")
            .or_else(|| error.get("code"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(SourceError::Unavailable(format!("encyclopedia API: {}", info)));
    }
    if body.get("text").is_some() && body.get("query").is_none() {
        return Err(SourceError::Parse("encyclopedia returned a non-JSON body".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ResponseCache, ReqwestFetcher};
    use crate::config::HttpConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> EncyclopediaAdapter {
        let fetcher = ReqwestFetcher::new(&HttpConfig::default()).unwrap();
        let client = CachedHttpClient::new(
            Arc::new(fetcher),
            Arc::new(ResponseCache::in_memory(Duration::from_secs(60))),
        );
        EncyclopediaAdapter::new(
            Arc::new(client),
            &format!("{}/w/api.php", server.uri()),
            "fr",
            1_000,
        )
    }

    #[tokio::test]
    async fn test_search_normalizes_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "hypertension"))
            .and(query_param("srlimit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"search": [
                    {"pageid": 42, "title": "Hypertension artérielle",
                     "snippet": "L'<span class=\"searchmatch\">hypertension</span> est une maladie[1] chronique"},
                    {"pageid": 43, "title": "", "snippet": "ignored"},
                    {"pageid": 44, "title": "Pression", "snippet": "a &amp; b"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let results = adapter
            .try_search(&Query::new("hypertension"), 2)
            .await
            .unwrap();

        // The untitled hit is dropped; `take` happens before parsing.
        assert_eq!(results.len(), 1);
        let first = &results[0];
        assert_eq!(first.source, SourceKind::Encyclopedia);
        assert_eq!(first.title, "Hypertension artérielle");
        assert_eq!(first.content, "L'hypertension est une maladie chronique");
        assert_eq!(first.confidence, 0.8);
        assert_eq!(
            first.url.as_deref(),
            Some(format!("{}/?curid=42", server.uri()).as_str())
        );
        assert_eq!(first.metadata["page_id"], json!(42));
    }

    #[tokio::test]
    async fn test_missing_query_block_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batchcomplete": ""})))
            .mount(&server)
            .await;

        let results = adapter(&server)
            .try_search(&Query::new("zzz"), 3)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "badvalue", "info": "Unrecognized value"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .try_search(&Query::new("x y z"), 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unrecognized value"));
    }

    #[tokio::test]
    async fn test_page_content_summarizes_long_extract() {
        let server = MockServer::start().await;
        let sentence = "Cette phrase décrit une partie du sujet médical en détail. ";
        let extract = sentence.repeat(20);
        Mock::given(method("GET"))
            .and(query_param("pageids", "42"))
            .and(query_param("prop", "extracts|info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": {"42": {
                    "pageid": 42,
                    "title": "Hypertension",
                    "extract": extract,
                    "fullurl": "https://fr.wikipedia.org/wiki/Hypertension"
                }}}
            })))
            .mount(&server)
            .await;

        let page = adapter(&server).page_content(42).await.unwrap().unwrap();
        assert_eq!(page.confidence, 0.9);
        assert_eq!(page.url.as_deref(), Some("https://fr.wikipedia.org/wiki/Hypertension"));
        assert_eq!(page.content, sentence.repeat(3).trim());
    }

    #[tokio::test]
    async fn test_page_content_missing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"pages": {"-1": {"missing": ""}}}
            })))
            .mount(&server)
            .await;

        assert!(adapter(&server).page_content(7).await.unwrap().is_none());
    }
}
