use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl SearchClient {
    pub fn new(client: reqwest::Client, endpoint: &str, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn endpoint_search(&self) -> String {
        format!("{}/search", self.endpoint)
    }

    /// Never fails: any backend problem is logged and reported as no results.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        match self.try_search(query).await {
            Ok(mut results) => {
                results.truncate(top_k);
                results
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "Error during SearxNG search");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(self.endpoint_search())
            .query(&[("q", query), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to send request to SearxNG")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("SearxNG error ({})", status);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse SearxNG response")?;

        tracing::debug!(query, results = parsed.results.len(), "SearxNG search complete");
        Ok(parsed.results)
    }
}
