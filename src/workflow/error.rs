//! Fatal turn failures

use super::graph::GraphError;
use crate::llm::LlmError;
use crate::state::{InvalidDeltaError, StateSchema};
use std::time::Duration;
use thiserror::Error;

/// Error that aborts a turn
///
/// State merged before the failing node is kept; nothing after it is.
/// Tool faults never appear here, they become tool result messages.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] LlmError),

    #[error("node `{node}` timed out after {timeout:?}")]
    Timeout { node: String, timeout: Duration },

    #[error("node `{node}` produced an invalid delta: {source}")]
    InvalidDelta {
        node: String,
        #[source]
        source: InvalidDeltaError,
    },

    #[error("turn exceeded the limit of {limit} node executions")]
    StepLimit { limit: usize },

    #[error("workflow runs over {expected} state, got {found}")]
    SchemaMismatch {
        expected: StateSchema,
        found: StateSchema,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl WorkflowError {
    /// Whether retrying the same turn could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            WorkflowError::ModelInvocation(e) => e.kind.is_transient(),
            WorkflowError::Timeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeltaField;

    #[test]
    fn test_display_messages() {
        let err = WorkflowError::Timeout {
            node: "agent".to_string(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "node `agent` timed out after 120s");

        let err = WorkflowError::Timeout {
            node: "agent".to_string(),
            timeout: Duration::from_millis(500),
        };
        assert_eq!(err.to_string(), "node `agent` timed out after 500ms");

        let err = WorkflowError::InvalidDelta {
            node: "tools".to_string(),
            source: InvalidDeltaError::FieldNotInSchema {
                field: DeltaField::Commands,
                schema: StateSchema::Combined,
            },
        };
        assert_eq!(
            err.to_string(),
            "node `tools` produced an invalid delta: field `commands` is not part of the combined state schema"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(WorkflowError::ModelInvocation(LlmError::rate_limit("slow down")).is_transient());
        assert!(!WorkflowError::ModelInvocation(LlmError::auth("bad key")).is_transient());
        assert!(!WorkflowError::StepLimit { limit: 25 }.is_transient());
    }
}
