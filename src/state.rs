//! Conversation state threaded through every workflow step
//!
//! Nodes never mutate state directly. Each node returns a [`StateDelta`]
//! that the executor merges into the authoritative [`ConversationState`]
//! using per-field reducer rules.

mod conversation;
mod delta;
mod message;

#[cfg(test)]
mod proptests;

pub use conversation::{
    CommandResult, CommandStatus, ConversationState, SearchPayload, StateSchema,
    ToolUsageRecord, WeatherInfo, LATEST_SEARCH_KEY,
};
pub use delta::{DeltaField, InvalidDeltaError, StateDelta, ToolUsageUpdate};
pub use message::{Artifact, Command, Message, ToolCall};
