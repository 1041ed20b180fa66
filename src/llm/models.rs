//! Model definitions for all supported LLM providers

use super::anthropic::AnthropicModel;
use super::openai::OpenAIModel;
use super::{AnthropicService, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-sonnet-4")
    pub id: &'static str,
    pub provider: Provider,
    pub description: &'static str,
    /// Factory function to create the service
    pub factory: fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, String>,
}

fn anthropic(
    model: AnthropicModel,
    api_key: &str,
    gateway: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!(
            "{} requires {} or gateway",
            model.model_id(),
            Provider::Anthropic.api_key_env_var()
        ));
    }
    let service = AnthropicService::new(api_key.to_string(), model, gateway)
        .map_err(|e| e.to_string())?;
    Ok(Arc::new(service))
}

fn openai(
    model: OpenAIModel,
    api_key: &str,
    gateway: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!(
            "{} requires {} or gateway",
            model.model_id(),
            Provider::OpenAI.api_key_env_var()
        ));
    }
    let service =
        OpenAIService::new(api_key.to_string(), model, gateway).map_err(|e| e.to_string())?;
    Ok(Arc::new(service))
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "claude-sonnet-4",
            provider: Provider::Anthropic,
            description: "Claude Sonnet 4 (balanced performance)",
            factory: |api_key, gateway| anthropic(AnthropicModel::ClaudeSonnet4, api_key, gateway),
        },
        ModelDef {
            id: "claude-3.5-haiku",
            provider: Provider::Anthropic,
            description: "Claude 3.5 Haiku (fast, efficient)",
            factory: |api_key, gateway| anthropic(AnthropicModel::Claude35Haiku, api_key, gateway),
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            description: "GPT-4o (balanced, multimodal)",
            factory: |api_key, gateway| openai(OpenAIModel::GPT4o, api_key, gateway),
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o Mini (fast, cheap)",
            factory: |api_key, gateway| openai(OpenAIModel::GPT4oMini, api_key, gateway),
        },
    ]
}
