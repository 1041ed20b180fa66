//! Messages exchanged within a conversation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            arguments,
        }
    }

    /// Look up a string argument by name
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Out-of-band instruction emitted by a tool, applied later by the
/// command-processing node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Structured payload a tool returns alongside its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    Text(String),
    Command(Command),
}

impl Artifact {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Text(text) => Some(text),
            Artifact::Command(_) => None,
        }
    }
}

/// Message in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    User {
        text: String,
    },
    Assistant {
        text: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        tool_name: String,
        call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
        /// Wall-clock duration of the invocation in seconds
        #[serde(default)]
        execution_time: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<Artifact>,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            text: text.into(),
            tool_calls: vec![],
        }
    }

    pub fn assistant_with_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            text: text.into(),
            tool_calls,
        }
    }

    /// Successful tool result with no artifact and no timing
    pub fn tool_result(
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::ToolResult {
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
            execution_time: 0.0,
            artifact: None,
        }
    }

    /// Tool calls carried by an assistant message; empty for other variants
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Call id this message answers, if it is a tool result
    pub fn answers_call(&self) -> Option<&str> {
        match self {
            Message::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_tagged_serialization() {
        let msg = Message::user("hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "user", "text": "hi"}));
    }

    #[test]
    fn test_tool_result_defaults_on_deserialize() {
        let msg: Message = serde_json::from_value(json!({
            "type": "tool_result",
            "tool_name": "get_weather",
            "call_id": "c1",
            "content": "sunny"
        }))
        .unwrap();
        assert_eq!(msg, Message::tool_result("get_weather", "c1", "sunny"));
        assert_eq!(msg.answers_call(), Some("c1"));
    }

    #[test]
    fn test_tool_calls_only_on_assistant() {
        let call = ToolCall::new("get_weather", "c1", Map::new());
        assert_eq!(
            Message::assistant_with_calls("", vec![call.clone()]).tool_calls(),
            &[call]
        );
        assert!(Message::user("x").tool_calls().is_empty());
    }

    #[test]
    fn test_command_artifact_has_no_text() {
        let artifact = Artifact::Command(Command::new("update_weather_state", Map::new()));
        assert!(artifact.as_text().is_none());
        assert_eq!(Artifact::Text("body".into()).as_text(), Some("body"));
    }
}
