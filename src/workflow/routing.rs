//! Decides whether the agent loop continues after a model response

use crate::state::{ConversationState, Message};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    InvokeTools,
    Terminate,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::InvokeTools => "invoke_tools",
            Route::Terminate => "terminate",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continue to tools only when the last message is an assistant message
/// that requested at least one tool call. Pure.
pub fn route(state: &ConversationState) -> Route {
    match state.last_message() {
        Some(Message::Assistant { tool_calls, .. }) if !tool_calls.is_empty() => Route::InvokeTools,
        _ => Route::Terminate,
    }
}
