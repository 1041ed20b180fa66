//! Agent workflow engine
//!
//! A turn runs a compiled graph of nodes over a [`ConversationState`]:
//! the agent node asks the model for the next message, [`route`] decides
//! whether tools run, and post-processing nodes fold tool output back into
//! the state before control returns to the agent.
//!
//! [`ConversationState`]: crate::state::ConversationState

mod error;
mod executor;
mod graph;
mod nodes;
mod routing;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use error::WorkflowError;
pub use executor::{Conversation, TurnReport, WorkflowExecutor, DEFAULT_MAX_STEPS};
pub use graph::{CompiledWorkflow, GraphError, Target, WorkflowBuilder, WorkflowVariant};
pub use nodes::{NodeContext, NodeKind};
pub use routing::{route, Route};
