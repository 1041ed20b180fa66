//! Mock implementations for testing
//!
//! These mocks let workflows run end to end without network access.

use super::nodes::NodeContext;
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::state::ToolCall;
use crate::tools::{
    ExtractedPage, SearchError, SearchHits, SearchProvider, Tool, ToolOutcome, ToolRegistry,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock LLM
// ============================================================================

/// LLM service that replays queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::text(text)],
            end_turn: true,
            usage: Usage::default(),
        });
    }

    pub fn queue_tool_call(&self, name: &str, id: &str, input: Value) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::tool_use(id, name, input)],
            end_turn: false,
            usage: Usage::default(),
        });
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &'static str {
        "mock-model"
    }
}

// ============================================================================
// Mock search
// ============================================================================

/// Search provider with canned pages
#[derive(Default)]
pub struct ScriptedSearch {
    pages: Vec<ExtractedPage>,
    pub summary: Option<String>,
    fail_status: Option<u16>,
}

impl ScriptedSearch {
    pub fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, content)| ExtractedPage {
                    url: (*url).to_string(),
                    content: (*content).to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<SearchHits, SearchError> {
        if let Some(status) = self.fail_status {
            return Err(SearchError::Status {
                status,
                body: "unavailable".to_string(),
            });
        }
        Ok(SearchHits {
            urls: self
                .pages
                .iter()
                .take(max_results)
                .map(|page| page.url.clone())
                .collect(),
            summary: self.summary.clone(),
        })
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>, SearchError> {
        Ok(self
            .pages
            .iter()
            .filter(|page| urls.contains(&page.url))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Mock tools
// ============================================================================

/// Tool that always fails
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn description(&self) -> String {
        "Always fails.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn invoke(&self, _input: Value) -> ToolOutcome {
        ToolOutcome::failure("backend exploded")
    }
}

/// Tool that outlives any test timeout
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn description(&self) -> String {
        "Takes a long time.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn invoke(&self, _input: Value) -> ToolOutcome {
        tokio::time::sleep(Duration::from_secs(10)).await;
        ToolOutcome::success("finally")
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn context(llm: Arc<dyn LlmService>, tools: Arc<ToolRegistry>) -> NodeContext {
    NodeContext {
        llm,
        tools,
        llm_timeout: Duration::from_secs(5),
        tool_timeout: Duration::from_secs(5),
        max_tokens: None,
    }
}

pub fn tool_call(name: &str, id: &str, input: Value) -> ToolCall {
    let arguments = match input {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    ToolCall::new(name, id, arguments)
}

pub fn weather_call(id: &str, location: &str) -> ToolCall {
    tool_call("get_weather", id, json!({"location": location}))
}
