//! Tools the model can invoke
//!
//! Tools never propagate faults: every invocation ends in a [`ToolOutcome`],
//! and failures become conversational content the model can react to.

mod google;
mod search;
mod tavily;
mod update_weather;
mod weather;

pub use google::GoogleSearch;
pub use search::{
    ExtractedPage, SearchAndExtractTool, SearchError, SearchHits, SearchProvider, SEARCH_TOOL_NAME,
};
pub use tavily::TavilySearch;
pub use update_weather::{UpdateWeatherStateTool, UPDATE_WEATHER_COMMAND};
pub use weather::{
    PlaceholderWeather, TemperatureUnit, WeatherError, WeatherProvider, WeatherReport, WeatherTool,
    WEATHER_TOOL_NAME,
};

use crate::llm::ToolDefinition;
use crate::state::Artifact;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_SEARCH_MAX_RESULTS: usize = 3;

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success {
        content: String,
        artifact: Option<Artifact>,
    },
    Failure {
        message: String,
    },
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        ToolOutcome::Success {
            content: content.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(content: impl Into<String>, artifact: Artifact) -> Self {
        ToolOutcome::Success {
            content: content.into(),
            artifact: Some(artifact),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    async fn invoke(&self, input: Value) -> ToolOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{name}'")]
    DuplicateTool { name: String },
}

/// Search and weather provider settings
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub tavily_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_engine_id: Option<String>,
    pub search_max_results: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            google_api_key: None,
            google_engine_id: None,
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
        }
    }
}

impl ToolConfig {
    pub fn from_env() -> Self {
        Self {
            tavily_api_key: non_empty_var("TAVILY_API_KEY"),
            google_api_key: non_empty_var("GOOGLE_SEARCH_API_KEY"),
            google_engine_id: non_empty_var("GOOGLE_SEARCH_ENGINE_ID"),
            search_max_results: std::env::var("SEARCH_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SEARCH_MAX_RESULTS),
        }
    }

    /// Configured search backend, Tavily first
    pub fn search_provider(&self) -> Option<Arc<dyn SearchProvider>> {
        if let Some(key) = &self.tavily_api_key {
            return Some(Arc::new(TavilySearch::new(key.clone())));
        }
        match (&self.google_api_key, &self.google_engine_id) {
            (Some(key), Some(engine)) => match GoogleSearch::new(key.clone(), engine.clone()) {
                Ok(google) => Some(Arc::new(google)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build Google search provider");
                    None
                }
            },
            _ => None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Collection of tools available to a workflow, indexed by name
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry; tool order is kept for the descriptor list
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), position).is_some() {
                return Err(RegistryError::DuplicateTool {
                    name: tool.name().to_string(),
                });
            }
        }
        Ok(Self { tools, index })
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Search (when configured) and weather tools
    pub fn standard(config: &ToolConfig) -> Result<Self, RegistryError> {
        Self::new(Self::base_tools(config))
    }

    /// Standard tools plus the out-of-band `update_weather_state` command tool
    pub fn with_commands(config: &ToolConfig) -> Result<Self, RegistryError> {
        let mut tools = Self::base_tools(config);
        tools.push(Arc::new(UpdateWeatherStateTool));
        Self::new(tools)
    }

    fn base_tools(config: &ToolConfig) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        match config.search_provider() {
            Some(provider) => tools.push(Arc::new(SearchAndExtractTool::new(
                provider,
                config.search_max_results,
            ))),
            None => tracing::warn!("No search provider configured; search tool disabled"),
        }
        tools.push(Arc::new(WeatherTool::new(Arc::new(PlaceholderWeather))));
        tools
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> String {
            format!("echo as {}", self.0)
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn invoke(&self, input: Value) -> ToolOutcome {
            ToolOutcome::success(input.to_string())
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolRegistry::new(vec![Arc::new(EchoTool("a")), Arc::new(EchoTool("a"))]);
        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateTool {
                name: "a".to_string()
            })
        );
    }

    #[test]
    fn test_lookup_and_definition_order() {
        let registry = ToolRegistry::new(vec![
            Arc::new(EchoTool("b")),
            Arc::new(EchoTool("a")),
        ])
        .unwrap();

        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.get("a").unwrap().name(), "a");
        assert!(registry.get("missing").is_none());
        let defs = registry.definitions();
        assert_eq!(defs[0].description, "echo as b");
    }

    #[test]
    fn test_standard_without_search_provider() {
        let registry = ToolRegistry::standard(&ToolConfig::default()).unwrap();
        assert_eq!(registry.names(), vec!["get_weather"]);
    }

    #[test]
    fn test_standard_with_tavily() {
        let config = ToolConfig {
            tavily_api_key: Some("tvly-test".to_string()),
            ..Default::default()
        };
        let registry = ToolRegistry::standard(&config).unwrap();
        assert_eq!(registry.names(), vec!["search_and_extract", "get_weather"]);
    }

    #[test]
    fn test_google_requires_engine_id() {
        let config = ToolConfig {
            google_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(config.search_provider().is_none());

        let config = ToolConfig {
            google_engine_id: Some("cx".to_string()),
            ..config
        };
        assert!(config.search_provider().is_some());
    }

    #[test]
    fn test_with_commands_adds_update_tool() {
        let registry = ToolRegistry::with_commands(&ToolConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["get_weather", UPDATE_WEATHER_COMMAND]
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }
}
