//! Partial state updates and the merge that applies them
//!
//! Reducer rules, per field:
//! - `messages`, `tool_history`: append
//! - `search_results`: overwrite by key
//! - `weather_data`, `command_results`: upsert by key
//! - `commands`: replace the whole queue
//! - `tool_history_updates`: update existing records in place

use super::conversation::{
    CommandResult, ConversationState, SearchPayload, StateSchema, ToolUsageRecord, WeatherInfo,
};
use super::message::{Command, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Named field of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaField {
    Messages,
    SearchResults,
    WeatherData,
    ToolHistory,
    ToolHistoryUpdates,
    Commands,
    CommandResults,
}

impl DeltaField {
    pub const ALL: [DeltaField; 7] = [
        DeltaField::Messages,
        DeltaField::SearchResults,
        DeltaField::WeatherData,
        DeltaField::ToolHistory,
        DeltaField::ToolHistoryUpdates,
        DeltaField::Commands,
        DeltaField::CommandResults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeltaField::Messages => "messages",
            DeltaField::SearchResults => "search_results",
            DeltaField::WeatherData => "weather_data",
            DeltaField::ToolHistory => "tool_history",
            DeltaField::ToolHistoryUpdates => "tool_history_updates",
            DeltaField::Commands => "commands",
            DeltaField::CommandResults => "command_results",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for DeltaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-place update of an existing tool usage record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageUpdate {
    /// Position in `tool_history` after this delta's appends
    pub index: usize,
    pub execution_time: f64,
    pub success: bool,
}

/// Partial state update returned by a node
///
/// Empty collections and `None` mean "field untouched".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub search_results: BTreeMap<String, SearchPayload>,
    pub weather_data: BTreeMap<String, WeatherInfo>,
    pub tool_history: Vec<ToolUsageRecord>,
    pub tool_history_updates: Vec<ToolUsageUpdate>,
    pub commands: Option<Vec<Command>>,
    pub command_results: BTreeMap<String, CommandResult>,
}

/// A delta that cannot be merged; always a defect in the producing node
#[derive(Debug, Error, PartialEq)]
pub enum InvalidDeltaError {
    #[error("unknown state field `{field}`")]
    UnknownField { field: String },
    #[error("field `{field}` is not part of the {schema} state schema")]
    FieldNotInSchema {
        field: DeltaField,
        schema: StateSchema,
    },
    #[error("tool history update targets record {index}, but only {len} exist")]
    HistoryIndexOutOfRange { index: usize, len: usize },
    #[error("malformed delta: {0}")]
    Malformed(String),
}

impl StateDelta {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Parse a delta from JSON, rejecting field names the state does not have
    #[allow(dead_code)] // For deltas produced outside the crate
    pub fn from_json(value: Value) -> Result<Self, InvalidDeltaError> {
        let Value::Object(fields) = &value else {
            return Err(InvalidDeltaError::Malformed(
                "delta must be a JSON object".to_string(),
            ));
        };
        if let Some(unknown) = fields.keys().find(|k| DeltaField::from_name(k).is_none()) {
            return Err(InvalidDeltaError::UnknownField {
                field: unknown.clone(),
            });
        }
        serde_json::from_value(value).map_err(|e| InvalidDeltaError::Malformed(e.to_string()))
    }

    /// Fields this delta would change
    pub fn touched_fields(&self) -> Vec<DeltaField> {
        let mut fields = Vec::new();
        if !self.messages.is_empty() {
            fields.push(DeltaField::Messages);
        }
        if !self.search_results.is_empty() {
            fields.push(DeltaField::SearchResults);
        }
        if !self.weather_data.is_empty() {
            fields.push(DeltaField::WeatherData);
        }
        if !self.tool_history.is_empty() {
            fields.push(DeltaField::ToolHistory);
        }
        if !self.tool_history_updates.is_empty() {
            fields.push(DeltaField::ToolHistoryUpdates);
        }
        if self.commands.is_some() {
            fields.push(DeltaField::Commands);
        }
        if !self.command_results.is_empty() {
            fields.push(DeltaField::CommandResults);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }
}

impl ConversationState {
    /// Combine this state with a delta, producing the next state
    ///
    /// Pure: `self` is left untouched, so a rejected delta never leaves a
    /// half-applied state behind.
    pub fn merge(&self, delta: StateDelta) -> Result<ConversationState, InvalidDeltaError> {
        if let Some(field) = delta
            .touched_fields()
            .into_iter()
            .find(|field| !self.schema.allows(*field))
        {
            return Err(InvalidDeltaError::FieldNotInSchema {
                field,
                schema: self.schema,
            });
        }

        let history_len = self.tool_history.len() + delta.tool_history.len();
        if let Some(update) = delta
            .tool_history_updates
            .iter()
            .find(|update| update.index >= history_len)
        {
            return Err(InvalidDeltaError::HistoryIndexOutOfRange {
                index: update.index,
                len: history_len,
            });
        }

        let mut next = self.clone();
        next.messages.extend(delta.messages);
        next.search_results.extend(delta.search_results);
        next.weather_data.extend(delta.weather_data);
        next.tool_history.extend(delta.tool_history);
        for update in delta.tool_history_updates {
            let record = &mut next.tool_history[update.index];
            record.execution_time = update.execution_time;
            record.success = update.success;
        }
        if let Some(commands) = delta.commands {
            next.commands = commands;
        }
        next.command_results.extend(delta.command_results);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToolCall;
    use serde_json::{json, Map};

    fn weather(info: &str) -> WeatherInfo {
        WeatherInfo {
            info: info.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_messages_append() {
        let mut state = ConversationState::default();
        state.push_user_message("hi");

        let next = state
            .merge(StateDelta::messages(vec![Message::assistant("hello")]))
            .unwrap();

        assert_eq!(next.messages.len(), 2);
        assert_eq!(next.messages[0], Message::user("hi"));
        // Base state untouched
        assert_eq!(state.messages.len(), 1);
    }

    #[test]
    fn test_weather_upsert_keeps_other_locations() {
        let mut state = ConversationState::default();
        state.weather_data.insert("Boston".into(), weather("cold"));
        state.weather_data.insert("Austin".into(), weather("hot"));

        let mut delta = StateDelta::empty();
        delta.weather_data.insert("Boston".into(), weather("snow"));
        let next = state.merge(delta).unwrap();

        assert_eq!(next.weather_data["Boston"].info, "snow");
        assert_eq!(next.weather_data["Austin"].info, "hot");
    }

    #[test]
    fn test_commands_replace_queue() {
        let mut state = ConversationState::new(StateSchema::CommandEnabled);
        state.commands = vec![
            Command::new("a", Map::new()),
            Command::new("b", Map::new()),
        ];

        let delta = StateDelta {
            commands: Some(vec![Command::new("b", Map::new())]),
            ..StateDelta::default()
        };
        let next = state.merge(delta).unwrap();
        assert_eq!(next.commands.len(), 1);
        assert_eq!(next.commands[0].name, "b");
    }

    #[test]
    fn test_command_fields_rejected_outside_schema() {
        let state = ConversationState::new(StateSchema::Combined);
        let delta = StateDelta {
            commands: Some(vec![]),
            ..StateDelta::default()
        };
        assert_eq!(
            state.merge(delta),
            Err(InvalidDeltaError::FieldNotInSchema {
                field: DeltaField::Commands,
                schema: StateSchema::Combined,
            })
        );
    }

    #[test]
    fn test_history_update_in_place() {
        let call = ToolCall::new("get_weather", "c1", Map::new());
        let mut state = ConversationState::default();
        state
            .tool_history
            .push(ToolUsageRecord::started(&call, "t0"));

        let delta = StateDelta {
            tool_history_updates: vec![ToolUsageUpdate {
                index: 0,
                execution_time: 1.5,
                success: false,
            }],
            ..StateDelta::default()
        };
        let next = state.merge(delta).unwrap();

        assert_eq!(next.tool_history.len(), 1);
        assert!((next.tool_history[0].execution_time - 1.5).abs() < f64::EPSILON);
        assert!(!next.tool_history[0].success);
        assert_eq!(next.tool_history[0].timestamp, "t0");
    }

    #[test]
    fn test_history_update_out_of_range() {
        let state = ConversationState::default();
        let delta = StateDelta {
            tool_history_updates: vec![ToolUsageUpdate {
                index: 0,
                execution_time: 0.1,
                success: true,
            }],
            ..StateDelta::default()
        };
        assert_eq!(
            state.merge(delta),
            Err(InvalidDeltaError::HistoryIndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let err = StateDelta::from_json(json!({
            "messages": [],
            "transcript": "x"
        }))
        .unwrap_err();
        assert_eq!(
            err,
            InvalidDeltaError::UnknownField {
                field: "transcript".to_string()
            }
        );
    }

    #[test]
    fn test_from_json_parses_known_fields() {
        let delta = StateDelta::from_json(json!({
            "messages": [{"type": "user", "text": "hi"}],
            "search_results": {"latest": {"summary": "s"}}
        }))
        .unwrap();
        assert_eq!(
            delta.touched_fields(),
            vec![DeltaField::Messages, DeltaField::SearchResults]
        );
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            StateDelta::from_json(json!([1, 2])),
            Err(InvalidDeltaError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_delta_is_identity() {
        let mut state = ConversationState::default();
        state.push_user_message("hi");
        assert!(StateDelta::empty().is_empty());
        assert_eq!(state.merge(StateDelta::empty()).unwrap(), state);
    }
}
