//! The conversation state aggregate

use super::delta::DeltaField;
use super::message::{Command, Message, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Key under which the most recent search payload is stored
pub const LATEST_SEARCH_KEY: &str = "latest";

/// Which field set a state carries
///
/// Basic and analytics workflows run over `Combined`; the command workflow
/// additionally owns the command queue and its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSchema {
    #[default]
    Combined,
    CommandEnabled,
}

impl StateSchema {
    pub fn allows(self, field: DeltaField) -> bool {
        match self {
            StateSchema::CommandEnabled => true,
            StateSchema::Combined => {
                !matches!(field, DeltaField::Commands | DeltaField::CommandResults)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateSchema::Combined => "combined",
            StateSchema::CommandEnabled => "command_enabled",
        }
    }
}

impl fmt::Display for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most recent search outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPayload {
    /// One-line summary the tool returned as content
    pub summary: String,
    /// Extracted page text, when the search succeeded
    #[serde(default)]
    pub extract: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub info: String,
    pub timestamp: String,
}

/// Analytics record for one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageRecord {
    pub tool_name: String,
    pub call_id: String,
    pub timestamp: String,
    pub arguments: Map<String, Value>,
    pub success: bool,
    /// Seconds; zero until execution telemetry arrives
    pub execution_time: f64,
}

impl ToolUsageRecord {
    /// Optimistic record created when a call is first seen
    pub fn started(call: &ToolCall, timestamp: impl Into<String>) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            call_id: call.call_id.clone(),
            timestamp: timestamp.into(),
            arguments: call.arguments.clone(),
            success: true,
            execution_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Applied,
    Rejected,
}

/// Outcome of a processed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub detail: String,
}

impl CommandResult {
    pub fn applied(detail: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Applied,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Rejected,
            detail: detail.into(),
        }
    }
}

/// Authoritative state of one conversation
///
/// Owned by whoever drives the turn. Callers that want to continue a
/// conversation later keep this value (it serializes as JSON) and hand it
/// back for the next turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub schema: StateSchema,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub search_results: BTreeMap<String, SearchPayload>,
    #[serde(default)]
    pub weather_data: BTreeMap<String, WeatherInfo>,
    #[serde(default)]
    pub tool_history: Vec<ToolUsageRecord>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub command_results: BTreeMap<String, CommandResult>,
}

impl ConversationState {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Append a user message; the only direct mutation callers perform
    pub fn push_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls of the last message when it is an assistant message
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.messages.last() {
            Some(message) => message.tool_calls(),
            None => &[],
        }
    }

    /// Text of the final assistant reply, if the log ends with one
    pub fn final_response(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::Assistant { text, .. }) => Some(text),
            _ => None,
        }
    }

    /// Find the tool call a result answers, searching backwards
    pub fn find_tool_call(&self, call_id: &str) -> Option<&ToolCall> {
        self.messages
            .iter()
            .rev()
            .flat_map(Message::tool_calls)
            .find(|call| call.call_id == call_id)
    }

    /// Tool calls that no tool result has answered yet
    pub fn unanswered_tool_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(Message::answers_call)
            .collect();
        self.messages
            .iter()
            .flat_map(Message::tool_calls)
            .filter(|call| !answered.contains(call.call_id.as_str()))
            .collect()
    }
}
