//! Out-of-band weather state update
//!
//! The tool does not touch state itself. It returns a command artifact that
//! `invoke_tools` queues and `process_commands` applies.

use super::{Tool, ToolOutcome};
use crate::state::{Artifact, Command};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Command name shared by the tool and the command processor
pub const UPDATE_WEATHER_COMMAND: &str = "update_weather_state";

#[derive(Debug, Deserialize)]
struct UpdateWeatherInput {
    location: String,
    info: String,
}

pub struct UpdateWeatherStateTool;

#[async_trait]
impl Tool for UpdateWeatherStateTool {
    fn name(&self) -> &'static str {
        UPDATE_WEATHER_COMMAND
    }

    fn description(&self) -> String {
        "Record a weather observation for a location in the conversation's weather log.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["location", "info"],
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Location the observation applies to"
                },
                "info": {
                    "type": "string",
                    "description": "The weather information to record"
                }
            }
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutcome {
        let input: UpdateWeatherInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutcome::failure(format!("Invalid input: {e}")),
        };
        let location = input.location.trim();
        if location.is_empty() {
            return ToolOutcome::failure("location must not be empty");
        }

        let mut args = Map::new();
        args.insert("location".to_string(), Value::String(location.to_string()));
        args.insert("info".to_string(), Value::String(input.info));

        ToolOutcome::with_artifact(
            format!("Queued weather update for {location}"),
            Artifact::Command(Command::new(UPDATE_WEATHER_COMMAND, args)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emits_command_artifact() {
        let outcome = UpdateWeatherStateTool
            .invoke(json!({"location": "Boston", "info": "72°F and sunny"}))
            .await;

        let ToolOutcome::Success { content, artifact } = outcome else {
            panic!("expected success");
        };
        assert_eq!(content, "Queued weather update for Boston");
        let Some(Artifact::Command(command)) = artifact else {
            panic!("expected command artifact");
        };
        assert_eq!(command.name, UPDATE_WEATHER_COMMAND);
        assert_eq!(command.args["location"], "Boston");
        assert_eq!(command.args["info"], "72°F and sunny");
    }

    #[tokio::test]
    async fn test_missing_info_is_failure() {
        let outcome = UpdateWeatherStateTool
            .invoke(json!({"location": "Boston"}))
            .await;
        assert!(!outcome.is_success());
    }
}
