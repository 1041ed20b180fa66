//! agentflow - tool-using LLM agent workflows
//!
//! A line-oriented front end: each stdin line is one user turn, run through
//! the configured workflow variant.

mod config;
mod llm;
mod state;
mod system_prompt;
mod tools;
mod workflow;

use config::AgentConfig;
use llm::{all_models, ModelRegistry};
use state::ConversationState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workflow::{Conversation, NodeContext, WorkflowExecutor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so replies on stdout stay readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AgentConfig::from_env();

    let llm_registry = ModelRegistry::new(&config.llm);
    if !llm_registry.has_models() {
        let mut vars: Vec<&str> = all_models()
            .iter()
            .map(|m| m.provider.api_key_env_var())
            .collect();
        vars.dedup();
        tracing::error!(
            expected = ?vars,
            "No LLM API keys configured. Set a provider key or LLM_GATEWAY."
        );
        return Err("no LLM provider configured".into());
    }
    tracing::info!(
        models = ?llm_registry.available_models(),
        default = %llm_registry.default_model_id(),
        "LLM registry initialized"
    );

    let executor = build_executor(&config, &llm_registry)?;

    // Optional state file: resumed from when present, rewritten after every turn
    let state_path = std::env::args().nth(1).map(PathBuf::from);
    let conversation = match &state_path {
        Some(path) if path.exists() => {
            let state = load_state(path).await?;
            if state.schema != executor.schema() {
                return Err(format!(
                    "{} holds {} state, but the {} workflow needs {}",
                    path.display(),
                    state.schema,
                    config.workflow.variant,
                    executor.schema()
                )
                .into());
            }
            tracing::info!(
                path = %path.display(),
                messages = state.messages.len(),
                "Resumed conversation"
            );
            Conversation::with_state(executor, state)
        }
        _ => Conversation::new(executor),
    };

    repl(conversation, &llm_registry, state_path.as_deref()).await
}

fn build_executor(
    config: &AgentConfig,
    llm_registry: &ModelRegistry,
) -> Result<WorkflowExecutor, Box<dyn std::error::Error>> {
    let llm = llm_registry
        .default()
        .ok_or("default model is not available")?;
    let variant = config.workflow.variant;
    let tools = Arc::new(variant.tool_registry(&config.tools)?);
    tracing::info!(variant = %variant, tools = ?tools.names(), "Workflow assembled");

    let ctx = NodeContext {
        llm,
        tools,
        llm_timeout: config.workflow.llm_timeout,
        tool_timeout: config.workflow.tool_timeout,
        max_tokens: Some(config.workflow.max_tokens),
    };
    Ok(WorkflowExecutor::new(
        variant.build()?,
        ctx,
        config.workflow.max_steps,
    ))
}

/// One user turn per stdin line until EOF or `/quit`
async fn repl(
    mut conversation: Conversation,
    llm_registry: &ModelRegistry,
    state_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        let output = match input {
            "" => String::new(),
            "/quit" | "/exit" => break,
            "/models" => models_listing(llm_registry),
            "/state" => serde_json::to_string_pretty(conversation.state())? + "\n",
            _ => match conversation.send(input).await {
                Ok(Some(reply)) => format!("{reply}\n"),
                Ok(None) => "(no reply)\n".to_string(),
                Err(e) if e.is_transient() => format!("error (transient, try again): {e}\n"),
                Err(e) => format!("error: {e}\n"),
            },
        };
        if let Some(path) = state_path {
            save_state(path, conversation.state()).await?;
        }
        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    tracing::info!(conv_id = %conversation.id(), "Session ended");
    Ok(())
}

async fn load_state(path: &Path) -> Result<ConversationState, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn save_state(
    path: &Path,
    state: &ConversationState,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::write(path, serde_json::to_vec_pretty(state)?).await?;
    Ok(())
}

fn models_listing(registry: &ModelRegistry) -> String {
    let available = registry.available_models();
    all_models()
        .iter()
        .filter(|m| available.iter().any(|id| id == m.id))
        .map(|m| {
            let marker = if m.id == registry.default_model_id() { "*" } else { " " };
            format!(
                "{marker} {} ({}): {}\n",
                m.id,
                m.provider.display_name(),
                m.description
            )
        })
        .collect()
}
