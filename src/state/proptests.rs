//! Property-based tests for the state reducers

use super::*;
use proptest::prelude::*;
use serde_json::Map;

fn arb_tool_call() -> impl Strategy<Value = ToolCall> {
    ("[a-z_]{3,12}", "[a-z0-9]{6}")
        .prop_map(|(name, id)| ToolCall::new(name, id, Map::new()))
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        "[a-zA-Z ?]{0,30}".prop_map(Message::user),
        ("[a-zA-Z ]{0,30}", proptest::collection::vec(arb_tool_call(), 0..3))
            .prop_map(|(text, calls)| Message::assistant_with_calls(text, calls)),
        ("[a-z_]{3,12}", "[a-z0-9]{6}", "[a-zA-Z0-9 ]{0,40}")
            .prop_map(|(name, id, content)| Message::tool_result(name, id, content)),
    ]
}

fn arb_messages() -> impl Strategy<Value = Vec<Message>> {
    proptest::collection::vec(arb_message(), 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Merging any sequence of message deltas preserves the original prefix
    #[test]
    fn prop_history_is_append_only(
        initial in arb_messages(),
        deltas in proptest::collection::vec(arb_messages(), 0..5),
    ) {
        let mut state = ConversationState::default();
        state.messages.clone_from(&initial);

        for messages in deltas {
            state = state.merge(StateDelta::messages(messages)).unwrap();
        }

        prop_assert!(state.messages.len() >= initial.len());
        prop_assert_eq!(&state.messages[..initial.len()], &initial[..]);
    }

    // The latest search payload always wins, whatever came before
    #[test]
    fn prop_search_results_overwrite(summaries in proptest::collection::vec("[a-z ]{1,20}", 1..6)) {
        let mut state = ConversationState::default();
        for summary in &summaries {
            let mut delta = StateDelta::empty();
            delta.search_results.insert(
                LATEST_SEARCH_KEY.to_string(),
                SearchPayload { summary: summary.clone(), extract: None },
            );
            state = state.merge(delta).unwrap();
        }

        prop_assert_eq!(state.search_results.len(), 1);
        prop_assert_eq!(
            &state.search_results[LATEST_SEARCH_KEY].summary,
            summaries.last().unwrap()
        );
    }

    // Usage records accumulate; none is ever replaced
    #[test]
    fn prop_tool_history_appends(calls in proptest::collection::vec(arb_tool_call(), 1..8)) {
        let mut state = ConversationState::default();
        for call in &calls {
            let delta = StateDelta {
                tool_history: vec![ToolUsageRecord::started(call, "t")],
                ..StateDelta::default()
            };
            state = state.merge(delta).unwrap();
        }

        prop_assert_eq!(state.tool_history.len(), calls.len());
        for (record, call) in state.tool_history.iter().zip(&calls) {
            prop_assert_eq!(&record.call_id, &call.call_id);
        }
    }

    // Combined-schema states reject any command field, whatever else the delta holds
    #[test]
    fn prop_combined_schema_rejects_commands(messages in arb_messages()) {
        let state = ConversationState::new(StateSchema::Combined);
        let delta = StateDelta {
            messages,
            commands: Some(vec![]),
            ..StateDelta::default()
        };
        let is_rejected = matches!(
            state.merge(delta),
            Err(InvalidDeltaError::FieldNotInSchema { field: DeltaField::Commands, .. })
        );
        prop_assert!(is_rejected);
    }
}
