//! Runs compiled workflows one turn at a time

use super::error::WorkflowError;
use super::graph::{CompiledWorkflow, GraphError, Target};
use super::nodes::{abandon_tool_calls, update_tool_execution_time, NodeContext};
use crate::state::{ConversationState, StateSchema};
use std::time::Instant;

/// Node executions allowed per turn before the turn is aborted
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Nodes visited during one turn, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub path: Vec<String>,
}

pub struct WorkflowExecutor {
    workflow: CompiledWorkflow,
    ctx: NodeContext,
    max_steps: usize,
}

impl WorkflowExecutor {
    pub fn new(workflow: CompiledWorkflow, ctx: NodeContext, max_steps: usize) -> Self {
        Self {
            workflow,
            ctx,
            max_steps,
        }
    }

    pub fn schema(&self) -> StateSchema {
        self.workflow.schema()
    }

    /// Drive the graph from its entry node until it reaches END
    ///
    /// Each node's delta is merged before the next node runs, so on error
    /// `state` holds everything merged up to the failing node.
    pub async fn run_turn(
        &self,
        state: &mut ConversationState,
    ) -> Result<TurnReport, WorkflowError> {
        if state.schema != self.workflow.schema() {
            return Err(WorkflowError::SchemaMismatch {
                expected: self.workflow.schema(),
                found: state.schema,
            });
        }

        let unanswered = state.unanswered_tool_calls();
        if !unanswered.is_empty() {
            tracing::warn!(
                count = unanswered.len(),
                "State carries tool calls without results"
            );
        }

        let mut report = TurnReport::default();
        let mut current = Target::node(self.workflow.entry());

        while let Target::Node(name) = current {
            if report.path.len() >= self.max_steps {
                tracing::warn!(limit = self.max_steps, path = ?report.path, "Step limit reached");
                Self::close_pending_calls(state, &name)?;
                return Err(WorkflowError::StepLimit {
                    limit: self.max_steps,
                });
            }
            let kind = self
                .workflow
                .node(&name)
                .ok_or_else(|| GraphError::UnknownNode { name: name.clone() })?;

            let started = Instant::now();
            let delta = kind.run(state, &self.ctx).await?;
            *state = state
                .merge(delta)
                .map_err(|source| WorkflowError::InvalidDelta {
                    node: name.clone(),
                    source,
                })?;
            tracing::debug!(
                node = %name,
                kind = %kind,
                duration_ms = %started.elapsed().as_millis(),
                "Node completed"
            );

            current = self.workflow.next(&name, state)?;
            report.path.push(name);
        }

        Ok(report)
    }

    /// Answer tool calls the aborted turn never ran, so the log stays
    /// replayable to the provider
    fn close_pending_calls(
        state: &mut ConversationState,
        node: &str,
    ) -> Result<(), WorkflowError> {
        if state.pending_tool_calls().is_empty() {
            return Ok(());
        }
        let invalid = |source| WorkflowError::InvalidDelta {
            node: node.to_string(),
            source,
        };
        *state = state
            .merge(abandon_tool_calls(state, "step limit reached"))
            .map_err(invalid)?;
        *state = state
            .merge(update_tool_execution_time(state))
            .map_err(invalid)?;
        Ok(())
    }
}

/// One conversation: its state plus the workflow that advances it
pub struct Conversation {
    id: String,
    executor: WorkflowExecutor,
    state: ConversationState,
}

impl Conversation {
    pub fn new(executor: WorkflowExecutor) -> Self {
        let state = ConversationState::new(executor.schema());
        Self::with_state(executor, state)
    }

    /// Resume from a previously saved state
    pub fn with_state(executor: WorkflowExecutor, state: ConversationState) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            executor,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a user message and run one turn
    ///
    /// Returns the final assistant text, if the turn ended with one.
    pub async fn send(&mut self, text: &str) -> Result<Option<String>, WorkflowError> {
        self.state.push_user_message(text);
        let report = match self.executor.run_turn(&mut self.state).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(conv_id = %self.id, error = %e, "Turn failed");
                return Err(e);
            }
        };
        tracing::info!(
            conv_id = %self.id,
            steps = report.path.len(),
            path = ?report.path,
            "Turn completed"
        );
        Ok(self.state.final_response().map(str::to_string))
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }
}
