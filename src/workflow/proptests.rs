//! Property-based tests for tool invocation

use super::nodes::invoke_tools;
use super::testing::{context, tool_call, MockLlmService};
use crate::state::{ConversationState, Message, ToolCall};
use crate::tools::{PlaceholderWeather, ToolRegistry, WeatherTool};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn arb_call() -> impl Strategy<Value = ToolCall> {
    (
        prop_oneof![Just("get_weather".to_string()), "[a-z_]{3,12}"],
        "[a-z]{3,10}",
    )
        .prop_map(|(name, location)| tool_call(&name, "", json!({"location": location})))
}

/// Distinct call ids, as the model assigns them
fn arb_calls() -> impl Strategy<Value = Vec<ToolCall>> {
    proptest::collection::vec(arb_call(), 1..6).prop_map(|calls| {
        calls
            .into_iter()
            .enumerate()
            .map(|(i, mut call)| {
                call.call_id = format!("call_{i}");
                call
            })
            .collect()
    })
}

fn invoke(calls: Vec<ToolCall>, registry: ToolRegistry) -> Vec<Message> {
    let ctx = context(Arc::new(MockLlmService::new()), Arc::new(registry));
    let mut state = ConversationState::default();
    state.messages = vec![
        Message::user("question"),
        Message::assistant_with_calls("", calls),
    ];
    runtime().block_on(invoke_tools(&state, &ctx)).messages
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // One result per call, same ids, same order
    #[test]
    fn prop_results_pair_with_calls(calls in arb_calls()) {
        let registry =
            ToolRegistry::new(vec![Arc::new(WeatherTool::new(Arc::new(PlaceholderWeather)))])
                .unwrap();
        let expected: Vec<String> = calls.iter().map(|c| c.call_id.clone()).collect();

        let results = invoke(calls, registry);

        prop_assert_eq!(results.len(), expected.len());
        let ids: Vec<&str> = results.iter().filter_map(Message::answers_call).collect();
        prop_assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    // Calls to unregistered tools always come back as error results
    #[test]
    fn prop_unknown_tools_yield_error_results(calls in arb_calls()) {
        let results = invoke(calls.clone(), ToolRegistry::empty());

        for (call, result) in calls.iter().zip(&results) {
            let Message::ToolResult { content, is_error, .. } = result else {
                prop_assert!(false, "expected a tool result");
                continue;
            };
            prop_assert!(*is_error);
            prop_assert_eq!(content, &format!("Error: no such tool '{}'", call.tool_name));
        }
    }
}
