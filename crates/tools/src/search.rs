//! Search client adapter for a SearXNG backend.
//!
//! Queries the JSON API (`GET {base}/search?q=...&format=json`) and maps the
//! native result list into ranked [`SearchResult`] records. Backend failures
//! are always distinguishable from a genuine empty result set.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use toolgate_core::{Error, Result, SearchResult};

use crate::dispatch::SearchBackend;

pub struct SearxClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearxClient {
    pub fn new(base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::SearchBackendError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for SearxClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("{}/search", self.base_url);
        let started = std::time::Instant::now();

        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("safesearch", "0")])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                Error::SearchBackendError(format!("searxng at {} unreachable: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            return Err(Error::SearchBackendError(format!(
                "searxng returned HTTP {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::SearchBackendError(format!("malformed searxng response: {}", e)))?;

        let results = parse_results(&payload, max_results)?;
        tracing::debug!(
            query = %query,
            hits = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "searxng query finished"
        );
        Ok(results)
    }
}

/// Map the SearXNG payload into ranked results, truncated to `max_results`.
/// A payload without a `results` array counts as malformed, not as empty.
fn parse_results(payload: &Value, max_results: usize) -> Result<Vec<SearchResult>> {
    let raw = payload
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            Error::SearchBackendError("searxng response has no 'results' array".to_string())
        })?;

    let results = raw
        .iter()
        .filter_map(|entry| {
            let url = entry.get("url").and_then(|v| v.as_str())?;
            let title = entry.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let snippet = entry.get("content").and_then(|v| v.as_str()).unwrap_or("");
            Some(SearchResult {
                title: title.to_string(),
                url: url.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .take(max_results)
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_results_in_backend_order() {
        let payload = json!({
            "results": [
                {"title": "First", "url": "https://a.example", "content": "snippet a"},
                {"title": "Second", "url": "https://b.example", "content": "snippet b"},
            ]
        });
        let results = parse_results(&payload, 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First");
        assert_eq!(results[1].url, "https://b.example");
        assert_eq!(results[1].snippet, "snippet b");
    }

    #[test]
    fn truncates_to_max_results_without_padding() {
        let entries: Vec<_> = (0..8)
            .map(|i| json!({"title": format!("t{}", i), "url": format!("https://e.example/{}", i)}))
            .collect();
        let payload = json!({ "results": entries });

        assert_eq!(parse_results(&payload, 3).unwrap().len(), 3);
        assert_eq!(parse_results(&payload, 20).unwrap().len(), 8);
    }

    #[test]
    fn entry_without_url_is_skipped() {
        let payload = json!({
            "results": [
                {"title": "no url here"},
                {"title": "ok", "url": "https://ok.example"},
            ]
        });
        let results = parse_results(&payload, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://ok.example");
    }

    #[test]
    fn missing_results_array_is_backend_error_not_empty() {
        let payload = json!({"unrelated": true});
        let err = parse_results(&payload, 10).unwrap_err();
        assert!(matches!(err, Error::SearchBackendError(_)));
    }

    #[test]
    fn empty_results_array_is_a_valid_zero_hit_response() {
        let payload = json!({"results": []});
        assert!(parse_results(&payload, 10).unwrap().is_empty());
    }
}
