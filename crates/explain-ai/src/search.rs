//! Semantic code-search client.
//!
//! The search service holds chunked platform source; queries return
//! scored file chunks. Callers decide what a failure means; this client
//! only reports it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Search tuning knobs; the explanation pipeline uses one fixed profile.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOptions {
    pub rewrite_query: bool,
    pub top_k: u32,
    pub reranking: bool,
    pub score_threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            rewrite_query: true,
            top_k: 10,
            reranking: true,
            score_threshold: 0.2,
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    corpus: &'a str,
    query: &'a str,
    #[serde(flatten)]
    options: &'a SearchOptions,
}

/// One chunk of a source file.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchChunk {
    pub text: String,
}

/// One scored file hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub filename: String,
    pub score: f32,
    #[serde(default)]
    pub content: Vec<SearchChunk>,
}

/// The search response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SearchHit>,
}

/// Semantic-search client.
#[derive(Clone)]
pub struct SearchClient {
    base_url: String,
    corpus: String,
    client: reqwest::Client,
}

impl SearchClient {
    pub fn new(base_url: &str, corpus: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            corpus: corpus.to_string(),
            client,
        }
    }

    /// Run a search against the configured corpus.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let request = SearchRequest {
            corpus: &self.corpus,
            query,
            options,
        };

        let response = self
            .client
            .post(format!("{}/api/search", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to reach the search service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Search API error ({}): {}", status, body);
        }

        let result: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;

        debug!(hits = result.data.len(), "Search results received");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_matches_pipeline_settings() {
        let opts = SearchOptions::default();
        assert!(opts.rewrite_query);
        assert_eq!(opts.top_k, 10);
        assert!(opts.reranking);
        assert!((opts.score_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_response_envelope() {
        let json = r#"{
            "data": [
                {"filename": "templates/products.twig", "score": 0.81,
                 "content": [{"text": "chunk one"}, {"text": "chunk two"}]},
                {"filename": "modules/filter.php", "score": 0.44, "content": []}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].content.len(), 2);
        assert_eq!(parsed.data[1].filename, "modules/filter.php");
    }

    #[test]
    fn tolerates_missing_data_field() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.data.is_empty());
    }
}
