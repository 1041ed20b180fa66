//! Node functions
//!
//! Every node reads the full state and returns a [`StateDelta`]; none of
//! them mutate state. Only `call_model` can fail the turn. Tool faults are
//! folded into tool result messages.

use super::error::WorkflowError;
use crate::llm::{
    ContentBlock, LlmMessage, LlmRequest, LlmResponse, LlmService, MessageRole, SystemContent,
};
use crate::state::{
    Artifact, Command, CommandResult, ConversationState, DeltaField, Message, SearchPayload,
    StateDelta, ToolCall, ToolUsageRecord, ToolUsageUpdate, WeatherInfo, LATEST_SEARCH_KEY,
};
use crate::system_prompt::build_system_prompt;
use crate::tools::{
    ToolOutcome, ToolRegistry, SEARCH_TOOL_NAME, UPDATE_WEATHER_COMMAND, WEATHER_TOOL_NAME,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// What a graph node does when it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    CallModel,
    InvokeTools,
    TrackToolUsage,
    UpdateToolExecutionTime,
    ProcessToolResults,
    ProcessCommands,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::CallModel => "call_model",
            NodeKind::InvokeTools => "invoke_tools",
            NodeKind::TrackToolUsage => "track_tool_usage",
            NodeKind::UpdateToolExecutionTime => "update_tool_execution_time",
            NodeKind::ProcessToolResults => "process_tool_results",
            NodeKind::ProcessCommands => "process_commands",
        }
    }

    pub async fn run(
        self,
        state: &ConversationState,
        ctx: &NodeContext,
    ) -> Result<StateDelta, WorkflowError> {
        match self {
            NodeKind::CallModel => call_model(state, ctx).await,
            NodeKind::InvokeTools => Ok(invoke_tools(state, ctx).await),
            NodeKind::TrackToolUsage => Ok(track_tool_usage(state)),
            NodeKind::UpdateToolExecutionTime => Ok(update_tool_execution_time(state)),
            NodeKind::ProcessToolResults => Ok(process_tool_results(state)),
            NodeKind::ProcessCommands => Ok(process_commands(state)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators and limits shared by all nodes of a workflow
#[derive(Clone)]
pub struct NodeContext {
    pub llm: Arc<dyn LlmService>,
    pub tools: Arc<ToolRegistry>,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_tokens: Option<u32>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// Model
// ============================================================================

/// Ask the model for the next assistant message
pub async fn call_model(
    state: &ConversationState,
    ctx: &NodeContext,
) -> Result<StateDelta, WorkflowError> {
    let tools = ctx.tools.definitions();
    let request = LlmRequest {
        system: vec![SystemContent::new(build_system_prompt(&tools))],
        messages: to_llm_messages(&state.messages),
        tools,
        max_tokens: ctx.max_tokens,
    };

    let response = match timeout(ctx.llm_timeout, ctx.llm.complete(&request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(WorkflowError::ModelInvocation(e)),
        Err(_) => {
            return Err(WorkflowError::Timeout {
                node: NodeKind::CallModel.as_str().to_string(),
                timeout: ctx.llm_timeout,
            })
        }
    };

    let message = assistant_message(&response);
    if !response.end_turn && message.tool_calls().is_empty() {
        // Cut off by the token limit or a provider filter
        tracing::warn!(
            max_tokens = ?ctx.max_tokens,
            output_tokens = response.usage.output_tokens,
            "Model stopped without finishing its turn"
        );
    }
    Ok(StateDelta::messages(vec![message]))
}

fn assistant_message(response: &LlmResponse) -> Message {
    let tool_calls = response
        .tool_uses()
        .into_iter()
        .map(|(id, name, input)| {
            let arguments = match input {
                Value::Object(map) => map.clone(),
                Value::Null => Map::new(),
                other => {
                    tracing::warn!(
                        tool = name,
                        call_id = id,
                        input = %other,
                        "Tool input is not an object"
                    );
                    Map::new()
                }
            };
            ToolCall::new(name, id, arguments)
        })
        .collect();
    Message::assistant_with_calls(response.text(), tool_calls)
}

/// Translate the conversation log into provider messages
///
/// Consecutive tool results are batched into one user turn, and artifact
/// text is appended to the content the model sees.
pub fn to_llm_messages(messages: &[Message]) -> Vec<LlmMessage> {
    let mut out: Vec<LlmMessage> = Vec::new();
    let mut in_result_batch = false;

    for message in messages {
        match message {
            Message::User { text } => {
                in_result_batch = false;
                out.push(LlmMessage {
                    role: MessageRole::User,
                    content: vec![ContentBlock::text(text.clone())],
                });
            }
            Message::Assistant { text, tool_calls } => {
                in_result_batch = false;
                let mut content = Vec::with_capacity(tool_calls.len() + 1);
                if !text.is_empty() {
                    content.push(ContentBlock::text(text.clone()));
                }
                content.extend(tool_calls.iter().map(|call| {
                    ContentBlock::tool_use(
                        call.call_id.clone(),
                        call.tool_name.clone(),
                        Value::Object(call.arguments.clone()),
                    )
                }));
                if content.is_empty() {
                    continue;
                }
                out.push(LlmMessage {
                    role: MessageRole::Assistant,
                    content,
                });
            }
            Message::ToolResult {
                call_id,
                content,
                is_error,
                artifact,
                ..
            } => {
                let text = match artifact.as_ref().and_then(Artifact::as_text) {
                    Some(extra) if !extra.is_empty() => format!("{content}\n\n{extra}"),
                    _ => content.clone(),
                };
                let block = ContentBlock::tool_result(call_id.clone(), text, *is_error);
                match out.last_mut() {
                    Some(batch) if in_result_batch => batch.content.push(block),
                    _ => out.push(LlmMessage {
                        role: MessageRole::User,
                        content: vec![block],
                    }),
                }
                in_result_batch = true;
            }
        }
    }
    out
}

// ============================================================================
// Tools
// ============================================================================

/// Run every tool call of the last assistant message, in order
pub async fn invoke_tools(state: &ConversationState, ctx: &NodeContext) -> StateDelta {
    let calls = state.pending_tool_calls();
    let mut results = Vec::with_capacity(calls.len());
    let mut queued: Vec<Command> = Vec::new();

    for call in calls {
        let started = Instant::now();
        let outcome = invoke_one(call, ctx).await;
        let execution_time = started.elapsed().as_secs_f64();

        let message = match outcome {
            None => {
                tracing::warn!(tool = %call.tool_name, call_id = %call.call_id, "No such tool");
                tool_result(
                    call,
                    format!("Error: no such tool '{}'", call.tool_name),
                    true,
                    execution_time,
                    None,
                )
            }
            Some(ToolOutcome::Success { content, artifact }) => {
                tracing::info!(
                    tool = %call.tool_name,
                    call_id = %call.call_id,
                    duration_ms = %started.elapsed().as_millis(),
                    "Tool succeeded"
                );
                if let Some(Artifact::Command(command)) = &artifact {
                    queued.push(command.clone());
                }
                tool_result(call, content, false, execution_time, artifact)
            }
            Some(ToolOutcome::Failure { message }) => {
                tracing::info!(
                    tool = %call.tool_name,
                    call_id = %call.call_id,
                    error = %message,
                    "Tool failed"
                );
                tool_result(call, format!("Error: {message}"), true, execution_time, None)
            }
        };
        results.push(message);
    }

    let mut delta = StateDelta::messages(results);
    if !queued.is_empty() {
        if state.schema.allows(DeltaField::Commands) {
            let mut commands = state.commands.clone();
            commands.extend(queued);
            delta.commands = Some(commands);
        } else {
            tracing::warn!(
                dropped = queued.len(),
                schema = %state.schema,
                "State has no command queue; dropping commands"
            );
        }
    }
    delta
}

/// Error results for pending tool calls that will not run this turn
pub fn abandon_tool_calls(state: &ConversationState, reason: &str) -> StateDelta {
    StateDelta::messages(
        state
            .pending_tool_calls()
            .iter()
            .map(|call| tool_result(call, format!("Error: {reason}"), true, 0.0, None))
            .collect(),
    )
}

/// `None` when the registry has no such tool
async fn invoke_one(call: &ToolCall, ctx: &NodeContext) -> Option<ToolOutcome> {
    let tool = ctx.tools.get(&call.tool_name)?;
    let input = Value::Object(call.arguments.clone());
    match timeout(ctx.tool_timeout, tool.invoke(input)).await {
        Ok(outcome) => Some(outcome),
        Err(_) => Some(ToolOutcome::failure(format!(
            "tool '{}' timed out after {:?}",
            call.tool_name, ctx.tool_timeout
        ))),
    }
}

fn tool_result(
    call: &ToolCall,
    content: String,
    is_error: bool,
    execution_time: f64,
    artifact: Option<Artifact>,
) -> Message {
    Message::ToolResult {
        tool_name: call.tool_name.clone(),
        call_id: call.call_id.clone(),
        content,
        is_error,
        execution_time,
        artifact,
    }
}

// ============================================================================
// Analytics
// ============================================================================

/// Append an optimistic usage record for each pending tool call
pub fn track_tool_usage(state: &ConversationState) -> StateDelta {
    let timestamp = now();
    StateDelta {
        tool_history: state
            .pending_tool_calls()
            .iter()
            .map(|call| ToolUsageRecord::started(call, timestamp.clone()))
            .collect(),
        ..StateDelta::default()
    }
}

/// Tool results that follow the last assistant message, oldest first
fn latest_tool_results(state: &ConversationState) -> Vec<&Message> {
    let mut results: Vec<&Message> = state
        .messages
        .iter()
        .rev()
        .take_while(|m| matches!(m, Message::ToolResult { .. }))
        .collect();
    results.reverse();
    results
}

/// Copy measured durations and outcomes onto the matching usage records
pub fn update_tool_execution_time(state: &ConversationState) -> StateDelta {
    let mut updates = Vec::new();
    for message in latest_tool_results(state) {
        let Message::ToolResult {
            call_id,
            is_error,
            execution_time,
            ..
        } = message
        else {
            continue;
        };
        let Some(index) = state
            .tool_history
            .iter()
            .rposition(|record| &record.call_id == call_id)
        else {
            tracing::debug!(call_id = %call_id, "No usage record for tool result");
            continue;
        };
        updates.push(ToolUsageUpdate {
            index,
            execution_time: *execution_time,
            success: !is_error,
        });
    }
    StateDelta {
        tool_history_updates: updates,
        ..StateDelta::default()
    }
}

// ============================================================================
// Result processing
// ============================================================================

/// Results of `tool` in the current tool round, oldest first
fn round_results<'a>(
    state: &'a ConversationState,
    tool: &'a str,
    successful_only: bool,
) -> impl Iterator<Item = &'a Message> + 'a {
    latest_tool_results(state).into_iter().filter(move |m| match m {
        Message::ToolResult {
            tool_name,
            is_error,
            ..
        } => tool_name == tool && !(successful_only && *is_error),
        _ => false,
    })
}

/// Store this round's last search outcome under `search_results["latest"]`
pub fn process_search_results(state: &ConversationState) -> StateDelta {
    let mut delta = StateDelta::empty();
    if let Some(Message::ToolResult {
        content, artifact, ..
    }) = round_results(state, SEARCH_TOOL_NAME, false).last()
    {
        delta.search_results.insert(
            LATEST_SEARCH_KEY.to_string(),
            SearchPayload {
                summary: content.clone(),
                extract: artifact
                    .as_ref()
                    .and_then(Artifact::as_text)
                    .map(str::to_string),
            },
        );
    }
    delta
}

/// Record each successful weather report of this round under the location
/// it was asked for
pub fn handle_weather_updates(state: &ConversationState) -> StateDelta {
    let mut delta = StateDelta::empty();
    let timestamp = now();
    for message in round_results(state, WEATHER_TOOL_NAME, true) {
        let Message::ToolResult {
            call_id, content, ..
        } = message
        else {
            continue;
        };
        let location = state
            .find_tool_call(call_id)
            .and_then(|call| call.str_arg("location"))
            .map(str::trim)
            .filter(|location| !location.is_empty());
        if let Some(location) = location {
            delta.weather_data.insert(
                location.to_string(),
                WeatherInfo {
                    info: content.clone(),
                    timestamp: timestamp.clone(),
                },
            );
        } else {
            tracing::warn!(call_id = %call_id, "Weather result without a location argument");
        }
    }
    delta
}

/// Search and weather post-processing in one step
pub fn process_tool_results(state: &ConversationState) -> StateDelta {
    let search = process_search_results(state);
    let weather = handle_weather_updates(state);
    StateDelta {
        search_results: search.search_results,
        weather_data: weather.weather_data,
        ..StateDelta::default()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Commands this workflow knows how to apply
#[derive(Debug, Clone, PartialEq)]
enum KnownCommand {
    UpdateWeatherState { location: String, info: String },
}

impl KnownCommand {
    /// `None` for unrecognized names; `Some(Err)` for bad arguments
    fn parse(command: &Command) -> Option<Result<Self, String>> {
        match command.name.as_str() {
            UPDATE_WEATHER_COMMAND => {
                let arg = |key: &str| command.args.get(key).and_then(Value::as_str);
                Some(match (arg("location"), arg("info")) {
                    (Some(location), Some(info)) if !location.trim().is_empty() => {
                        Ok(KnownCommand::UpdateWeatherState {
                            location: location.trim().to_string(),
                            info: info.to_string(),
                        })
                    }
                    _ => Err("expected string arguments `location` and `info`".to_string()),
                })
            }
            _ => None,
        }
    }
}

/// Pop the head of the command queue and apply it
///
/// Unrecognized commands are dropped from the queue without touching
/// anything else.
pub fn process_commands(state: &ConversationState) -> StateDelta {
    let Some((head, rest)) = state.commands.split_first() else {
        return StateDelta::empty();
    };
    let mut delta = StateDelta {
        commands: Some(rest.to_vec()),
        ..StateDelta::default()
    };

    match KnownCommand::parse(head) {
        Some(Ok(KnownCommand::UpdateWeatherState { location, info })) => {
            tracing::info!(command = %head.name, location = %location, "Applying command");
            delta.command_results.insert(
                head.name.clone(),
                CommandResult::applied(format!("weather for {location} updated")),
            );
            delta.weather_data.insert(
                location,
                WeatherInfo {
                    info,
                    timestamp: now(),
                },
            );
        }
        Some(Err(reason)) => {
            tracing::warn!(command = %head.name, reason = %reason, "Rejected command");
            delta
                .command_results
                .insert(head.name.clone(), CommandResult::rejected(reason));
        }
        None => tracing::debug!(command = %head.name, "Ignoring unrecognized command"),
    }
    delta
}
