//! Startup configuration read from the environment

use crate::llm::LlmConfig;
use crate::tools::ToolConfig;
use crate::workflow::{WorkflowVariant, DEFAULT_MAX_STEPS};
use std::time::Duration;

const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Workflow shape and per-turn limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub variant: WorkflowVariant,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_steps: usize,
    pub max_tokens: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            variant: WorkflowVariant::default(),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            max_steps: DEFAULT_MAX_STEPS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let variant = lookup("AGENTFLOW_VARIANT").map_or(defaults.variant, |raw| {
            raw.parse::<WorkflowVariant>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to the basic workflow");
                defaults.variant
            })
        });
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            variant,
            llm_timeout: number("AGENTFLOW_LLM_TIMEOUT_SECS")
                .filter(|&secs| secs > 0)
                .map_or(defaults.llm_timeout, Duration::from_secs),
            tool_timeout: number("AGENTFLOW_TOOL_TIMEOUT_SECS")
                .filter(|&secs| secs > 0)
                .map_or(defaults.tool_timeout, Duration::from_secs),
            max_steps: number("AGENTFLOW_MAX_STEPS")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_steps),
            max_tokens: number("AGENTFLOW_MAX_TOKENS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_tokens),
        }
    }
}

/// Everything the binary needs to assemble an agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub tools: ToolConfig,
    pub workflow: WorkflowConfig,
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig::from_env(),
            tools: ToolConfig::from_env(),
            workflow: WorkflowConfig::from_env(),
        }
    }
}
