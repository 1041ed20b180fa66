//! Tavily search and extract endpoints

use super::search::{ExtractedPage, SearchError, SearchHits, SearchProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_URL: &str = "https://api.tavily.com";

pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, SearchError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| SearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchHits, SearchError> {
        let request = TavilySearchRequest {
            query,
            max_results,
            include_answer: "basic",
        };
        let response: TavilySearchResponse = self.post("search", &request).await?;
        Ok(response.into_hits())
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>, SearchError> {
        let request = TavilyExtractRequest { urls };
        let response: TavilyExtractResponse = self.post("extract", &request).await?;
        for failed in &response.failed_results {
            tracing::warn!(url = %failed.url, error = %failed.error, "Tavily extraction failed");
        }
        Ok(response
            .results
            .into_iter()
            .map(|r| ExtractedPage {
                url: r.url,
                content: r.raw_content,
            })
            .collect())
    }
}

// Tavily API types

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    include_answer: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilySearchResult>,
}

impl TavilySearchResponse {
    fn into_hits(self) -> SearchHits {
        SearchHits {
            urls: self.results.into_iter().map(|r| r.url).collect(),
            summary: self.answer.filter(|a| !a.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilySearchResult {
    url: String,
}

#[derive(Debug, Serialize)]
struct TavilyExtractRequest<'a> {
    urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TavilyExtractResponse {
    #[serde(default)]
    results: Vec<TavilyExtractResult>,
    #[serde(default)]
    failed_results: Vec<TavilyFailedResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyExtractResult {
    url: String,
    #[serde(default)]
    raw_content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyFailedResult {
    url: String,
    #[serde(default)]
    error: String,
}
