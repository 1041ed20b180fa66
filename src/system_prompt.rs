//! System prompt construction
//!
//! The model sees a fixed role statement followed by the registry's tool
//! catalog, one `- {name}: {description}` line per tool.

use crate::llm::ToolDefinition;

/// Base system prompt establishing the agent's role
const BASE_PROMPT: &str = r"You are a helpful assistant that answers questions using up-to-date information from tools. Use a tool when the answer depends on current facts such as news, web content or the weather, and answer directly otherwise.

Be concise. When a tool returns an error, tell the user what went wrong instead of guessing.";

/// Format the tool catalog, one line per tool in registration order
pub fn format_tool_catalog(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the complete system prompt for a set of tools
pub fn build_system_prompt(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return BASE_PROMPT.to_string();
    }
    format!(
        "{BASE_PROMPT}\n\nYou have access to the following tools:\n{}",
        format_tool_catalog(tools)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_catalog_format() {
        let catalog = format_tool_catalog(&[
            def("search_and_extract", "Search the web"),
            def("get_weather", "Current weather"),
        ]);
        assert_eq!(
            catalog,
            "- search_and_extract: Search the web\n- get_weather: Current weather"
        );
    }

    #[test]
    fn test_prompt_without_tools_has_no_catalog() {
        let prompt = build_system_prompt(&[]);
        assert_eq!(prompt, BASE_PROMPT);
    }

    #[test]
    fn test_prompt_includes_catalog() {
        let prompt = build_system_prompt(&[def("get_weather", "Current weather")]);
        assert!(prompt.starts_with(BASE_PROMPT));
        assert!(prompt.ends_with("- get_weather: Current weather"));
    }
}
