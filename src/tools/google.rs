//! Google Custom Search with direct page fetching
//!
//! Custom Search only returns links, so each result page is fetched and
//! reduced to lightweight markdown before it is handed to the model.

use super::search::{ExtractedPage, SearchError, SearchHits, SearchProvider};
use async_trait::async_trait;
use regex::{Captures, Regex};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search caps `num` per request
const MAX_RESULTS_PER_QUERY: usize = 5;
const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_PAGE_CHARS: usize = 10_000;

/// Elements whose content never carries page text
const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

pub struct GoogleSearch {
    client: Client,
    api_key: String,
    engine_id: String,
    converter: MarkdownConverter,
}

impl GoogleSearch {
    pub fn new(api_key: String, engine_id: String) -> Result<Self, regex::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Ok(Self {
            client,
            api_key,
            engine_id,
            converter: MarkdownConverter::new()?,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .get(url)
            .timeout(PAGE_FETCH_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(self.converter.convert(&body))
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchHits, SearchError> {
        let num = max_results.clamp(1, MAX_RESULTS_PER_QUERY).to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
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
        let parsed: GoogleSearchResponse =
            serde_json::from_str(&text).map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(parsed.into_hits())
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>, SearchError> {
        let mut pages = Vec::with_capacity(urls.len());
        for url in urls {
            // A page that cannot be fetched still appears, with empty content
            let content = match self.fetch_page(url).await {
                Ok(markdown) => markdown,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Page fetch failed");
                    String::new()
                }
            };
            pages.push(ExtractedPage {
                url: url.clone(),
                content,
            });
        }
        Ok(pages)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    items: Vec<GoogleSearchItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleSearchItem {
    #[serde(default)]
    title: Option<String>,
    link: String,
}

impl GoogleSearchResponse {
    fn into_hits(self) -> SearchHits {
        if self.items.is_empty() {
            return SearchHits::default();
        }
        let summary = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "[{}]({})",
                    item.title.as_deref().unwrap_or("No Title"),
                    item.link
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        SearchHits {
            urls: self.items.into_iter().map(|item| item.link).collect(),
            summary: Some(summary),
        }
    }
}

/// Regex-based HTML to markdown reduction
struct MarkdownConverter {
    stripped: Vec<Regex>,
    heading: Regex,
    link: Regex,
    strong: Regex,
    emphasis: Regex,
    list_item: Regex,
    block_break: Regex,
    tag: Regex,
    blank_lines: Regex,
}

impl MarkdownConverter {
    fn new() -> Result<Self, regex::Error> {
        let stripped = STRIPPED_ELEMENTS
            .iter()
            .map(|name| Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            stripped,
            heading: Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>")?,
            link: Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)?,
            strong: Regex::new(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>")?,
            emphasis: Regex::new(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>")?,
            list_item: Regex::new(r"(?is)<li\b[^>]*>(.*?)</li\s*>")?,
            block_break: Regex::new(r"(?i)<br\s*/?>|</(?:p|div|tr|ul|ol|table)\s*>")?,
            tag: Regex::new(r"(?s)<[^>]+>")?,
            blank_lines: Regex::new(r"\n{3,}")?,
        })
    }

    fn convert(&self, html: &str) -> String {
        let mut text = html.to_string();
        for element in &self.stripped {
            text = element.replace_all(&text, "").into_owned();
        }
        text = self
            .heading
            .replace_all(&text, |caps: &Captures| {
                let level = caps[1].parse::<usize>().unwrap_or(1);
                format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
            })
            .into_owned();
        text = self.link.replace_all(&text, "[$2]($1)").into_owned();
        text = self.strong.replace_all(&text, "**$1**").into_owned();
        text = self.emphasis.replace_all(&text, "*$1*").into_owned();
        text = self.list_item.replace_all(&text, "\n- $1").into_owned();
        text = self.block_break.replace_all(&text, "\n\n").into_owned();
        text = self.tag.replace_all(&text, "").into_owned();
        text = decode_entities(&text);
        text = self.blank_lines.replace_all(&text, "\n\n").into_owned();
        text.trim().chars().take(MAX_PAGE_CHARS).collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn converter() -> MarkdownConverter {
        MarkdownConverter::new().unwrap()
    }

    #[test]
    fn test_strips_non_content_elements() {
        let html = r#"<html><head><style>body{}</style><script>alert(1)</script></head>
<body><nav><a href="/">Home</a></nav><p>Kept text</p><footer>(c) 2024</footer></body></html>"#;
        let markdown = converter().convert(html);
        assert_eq!(markdown, "Kept text");
    }

    #[test]
    fn test_headings_links_and_emphasis() {
        let html = r#"<h1>Title</h1><p>See <a href="https://x.example">the docs</a> for <strong>bold</strong> and <em>soft</em> claims.</p>"#;
        let markdown = converter().convert(html);
        assert_eq!(
            markdown,
            "# Title\n\nSee [the docs](https://x.example) for **bold** and *soft* claims."
        );
    }

    #[test]
    fn test_list_items_and_entities() {
        let html = "<ul><li>one &amp; two</li><li>&lt;three&gt;</li></ul>";
        let markdown = converter().convert(html);
        assert_eq!(markdown, "- one & two\n- <three>");
    }

    #[test]
    fn test_collapses_blank_lines_and_truncates() {
        let html = format!("<p>a</p>\n\n\n\n<p>{}</p>", "x".repeat(MAX_PAGE_CHARS * 2));
        let markdown = converter().convert(&html);
        assert!(markdown.starts_with("a\n\n"));
        assert!(!markdown.contains("\n\n\n"));
        assert_eq!(markdown.chars().count(), MAX_PAGE_CHARS);
    }

    #[test]
    fn test_search_response_to_hits() {
        let response: GoogleSearchResponse = serde_json::from_value(json!({
            "items": [
                {"title": "Rust", "link": "https://rust-lang.org"},
                {"link": "https://crates.io"}
            ]
        }))
        .unwrap();
        let hits = response.into_hits();
        assert_eq!(hits.urls, vec!["https://rust-lang.org", "https://crates.io"]);
        assert_eq!(
            hits.summary.as_deref(),
            Some("[Rust](https://rust-lang.org)\n[No Title](https://crates.io)")
        );
    }

    #[test]
    fn test_search_response_without_items() {
        let response: GoogleSearchResponse =
            serde_json::from_value(json!({"searchInformation": {"totalResults": "0"}})).unwrap();
        assert_eq!(response.into_hits(), SearchHits::default());
    }
}
