//! Web search followed by page extraction
//!
//! Providers supply ranked URLs and page bodies; the tool formats them into
//! a one-line summary plus the extracted text as an artifact.

use super::{Tool, ToolOutcome};
use crate::state::Artifact;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

pub const SEARCH_TOOL_NAME: &str = "search_and_extract";

/// Ranked search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub urls: Vec<String>,
    /// Provider-side digest of the results, when the backend offers one
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchHits, SearchError>;

    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

pub struct SearchAndExtractTool {
    provider: Arc<dyn SearchProvider>,
    default_max_results: usize,
}

impl SearchAndExtractTool {
    pub fn new(provider: Arc<dyn SearchProvider>, default_max_results: usize) -> Self {
        Self {
            provider,
            default_max_results,
        }
    }

    async fn search_and_extract(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<(SearchHits, Vec<ExtractedPage>), SearchError> {
        let hits = self.provider.search(query, max_results).await?;
        if hits.urls.is_empty() {
            return Ok((hits, Vec::new()));
        }
        let pages = self.provider.extract(&hits.urls).await?;
        Ok((hits, pages))
    }
}

/// Join pages as `Source: {url}\nContent: {text}` blocks
fn format_extract(summary: Option<&str>, pages: &[ExtractedPage]) -> String {
    let sources = pages
        .iter()
        .map(|page| format!("Source: {}\nContent: {}", page.url, page.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    match summary {
        Some(summary) if !summary.trim().is_empty() => format!("Summary: {summary}\n\n{sources}"),
        _ => sources,
    }
}

#[async_trait]
impl Tool for SearchAndExtractTool {
    fn name(&self) -> &'static str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> String {
        "Search the web for a query and return the extracted content of the top results. Use for current events, facts that may have changed, or anything you are unsure about.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to extract",
                    "default": self.default_max_results
                }
            }
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutcome {
        let input: SearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutcome::failure(format!("Invalid input: {e}")),
        };
        let query = input.query.trim();
        if query.is_empty() {
            return ToolOutcome::failure("query must not be empty");
        }
        let max_results = input.max_results.unwrap_or(self.default_max_results).max(1);

        match self.search_and_extract(query, max_results).await {
            Ok((hits, pages)) => {
                tracing::debug!(
                    provider = self.provider.name(),
                    query,
                    results = hits.urls.len(),
                    pages = pages.len(),
                    "Search completed"
                );
                let content = format!(
                    "Searched for '{query}' and found {} results",
                    hits.urls.len()
                );
                if pages.is_empty() && hits.summary.is_none() {
                    ToolOutcome::success(content)
                } else {
                    let extract = format_extract(hits.summary.as_deref(), &pages);
                    ToolOutcome::with_artifact(content, Artifact::Text(extract))
                }
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), query, error = %e, "Search failed");
                ToolOutcome::failure(format!("search failed for '{query}': {e}"))
            }
        }
    }
}
