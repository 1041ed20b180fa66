//! Workflow graph assembly
//!
//! Nodes and edges are registered on a [`WorkflowBuilder`] and validated
//! once by [`WorkflowBuilder::compile`]. The compiled graph is a static
//! transition table; the only runtime decision is the conditional edge out
//! of the agent node, which consults [`route`].

use super::nodes::NodeKind;
use super::routing::{route, Route};
use crate::state::{ConversationState, StateSchema};
use crate::tools::{RegistryError, ToolConfig, ToolRegistry};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const AGENT_NODE: &str = "agent";
pub const TOOLS_NODE: &str = "tools";
pub const TRACK_TOOLS_NODE: &str = "track_tools";
pub const UPDATE_METRICS_NODE: &str = "update_metrics";
pub const PROCESS_RESULTS_NODE: &str = "process_results";
pub const PROCESS_COMMANDS_NODE: &str = "process_commands";

/// Where an edge leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    End,
}

impl Target {
    pub fn node(name: impl Into<String>) -> Self {
        Target::Node(name.into())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(name) => f.write_str(name),
            Target::End => f.write_str("END"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edge {
    Direct(Target),
    Conditional {
        on_invoke_tools: Target,
        on_terminate: Target,
    },
}

impl Edge {
    fn targets(&self) -> Vec<&Target> {
        match self {
            Edge::Direct(target) => vec![target],
            Edge::Conditional {
                on_invoke_tools,
                on_terminate,
            } => vec![on_invoke_tools, on_terminate],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("workflow has no entry node")]
    MissingEntry,
    #[error("node `{name}` registered twice")]
    DuplicateNode { name: String },
    #[error("node `{from}` already has an outgoing edge")]
    DuplicateEdge { from: String },
    #[error("unknown node `{name}`")]
    UnknownNode { name: String },
    #[error("node `{node}` has no outgoing edge")]
    MissingEdge { node: String },
}

/// Collects nodes and edges; the first registration defect is reported by
/// `compile`
pub struct WorkflowBuilder {
    schema: StateSchema,
    nodes: Vec<(String, NodeKind)>,
    entry: Option<String>,
    edges: HashMap<String, Edge>,
    defect: Option<GraphError>,
}

impl WorkflowBuilder {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            entry: None,
            edges: HashMap::new(),
            defect: None,
        }
    }

    fn record(&mut self, defect: GraphError) {
        if self.defect.is_none() {
            self.defect = Some(defect);
        }
    }

    pub fn add_node(mut self, name: &str, kind: NodeKind) -> Self {
        if self.nodes.iter().any(|(existing, _)| existing == name) {
            self.record(GraphError::DuplicateNode {
                name: name.to_string(),
            });
        } else {
            self.nodes.push((name.to_string(), kind));
        }
        self
    }

    pub fn set_entry(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn add_edge(self, from: &str, to: Target) -> Self {
        self.insert_edge(from, Edge::Direct(to))
    }

    /// Branch on [`route`]: tools when the model asked for them, otherwise
    /// `on_terminate`
    pub fn add_conditional_edges(
        self,
        from: &str,
        on_invoke_tools: Target,
        on_terminate: Target,
    ) -> Self {
        self.insert_edge(
            from,
            Edge::Conditional {
                on_invoke_tools,
                on_terminate,
            },
        )
    }

    fn insert_edge(mut self, from: &str, edge: Edge) -> Self {
        if self.edges.contains_key(from) {
            self.record(GraphError::DuplicateEdge {
                from: from.to_string(),
            });
        } else {
            self.edges.insert(from.to_string(), edge);
        }
        self
    }

    pub fn compile(self) -> Result<CompiledWorkflow, GraphError> {
        if let Some(defect) = self.defect {
            return Err(defect);
        }
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        let nodes: HashMap<String, NodeKind> = self.nodes.iter().cloned().collect();

        if !nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode { name: entry });
        }
        for (from, edge) in &self.edges {
            if !nodes.contains_key(from) {
                return Err(GraphError::UnknownNode { name: from.clone() });
            }
            for target in edge.targets() {
                if let Target::Node(name) = target {
                    if !nodes.contains_key(name) {
                        return Err(GraphError::UnknownNode { name: name.clone() });
                    }
                }
            }
        }
        if let Some((name, _)) = self
            .nodes
            .iter()
            .find(|(name, _)| !self.edges.contains_key(name))
        {
            return Err(GraphError::MissingEdge { node: name.clone() });
        }

        Ok(CompiledWorkflow {
            schema: self.schema,
            entry,
            nodes,
            edges: self.edges,
        })
    }
}

/// Validated, immutable workflow graph
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    schema: StateSchema,
    entry: String,
    nodes: HashMap<String, NodeKind>,
    edges: HashMap<String, Edge>,
}

impl CompiledWorkflow {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn schema(&self) -> StateSchema {
        self.schema
    }

    pub fn node(&self, name: &str) -> Option<NodeKind> {
        self.nodes.get(name).copied()
    }

    /// Resolve the successor of `from` against the state it produced
    pub fn next(&self, from: &str, state: &ConversationState) -> Result<Target, GraphError> {
        match self.edges.get(from) {
            Some(Edge::Direct(target)) => Ok(target.clone()),
            Some(Edge::Conditional {
                on_invoke_tools,
                on_terminate,
            }) => Ok(match route(state) {
                Route::InvokeTools => on_invoke_tools.clone(),
                Route::Terminate => on_terminate.clone(),
            }),
            None => Err(GraphError::MissingEdge {
                node: from.to_string(),
            }),
        }
    }
}

/// The prebuilt agent topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowVariant {
    /// agent, tools, result processing
    #[default]
    Basic,
    /// Basic plus tool usage tracking around the tools node
    Analytics,
    /// Basic plus a command queue drained after every tool round
    Command,
}

impl WorkflowVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowVariant::Basic => "basic",
            WorkflowVariant::Analytics => "analytics",
            WorkflowVariant::Command => "command",
        }
    }

    pub fn schema(self) -> StateSchema {
        match self {
            WorkflowVariant::Basic | WorkflowVariant::Analytics => StateSchema::Combined,
            WorkflowVariant::Command => StateSchema::CommandEnabled,
        }
    }

    pub fn build(self) -> Result<CompiledWorkflow, GraphError> {
        let builder = WorkflowBuilder::new(self.schema())
            .add_node(AGENT_NODE, NodeKind::CallModel)
            .add_node(TOOLS_NODE, NodeKind::InvokeTools)
            .add_node(PROCESS_RESULTS_NODE, NodeKind::ProcessToolResults)
            .set_entry(AGENT_NODE);

        let builder = match self {
            WorkflowVariant::Basic => builder
                .add_conditional_edges(AGENT_NODE, Target::node(TOOLS_NODE), Target::End)
                .add_edge(TOOLS_NODE, Target::node(PROCESS_RESULTS_NODE))
                .add_edge(PROCESS_RESULTS_NODE, Target::node(AGENT_NODE)),
            WorkflowVariant::Analytics => builder
                .add_node(TRACK_TOOLS_NODE, NodeKind::TrackToolUsage)
                .add_node(UPDATE_METRICS_NODE, NodeKind::UpdateToolExecutionTime)
                .add_conditional_edges(AGENT_NODE, Target::node(TRACK_TOOLS_NODE), Target::End)
                .add_edge(TRACK_TOOLS_NODE, Target::node(TOOLS_NODE))
                .add_edge(TOOLS_NODE, Target::node(UPDATE_METRICS_NODE))
                .add_edge(UPDATE_METRICS_NODE, Target::node(PROCESS_RESULTS_NODE))
                .add_edge(PROCESS_RESULTS_NODE, Target::node(AGENT_NODE)),
            WorkflowVariant::Command => builder
                .add_node(PROCESS_COMMANDS_NODE, NodeKind::ProcessCommands)
                .add_conditional_edges(AGENT_NODE, Target::node(TOOLS_NODE), Target::End)
                .add_edge(TOOLS_NODE, Target::node(PROCESS_RESULTS_NODE))
                .add_edge(PROCESS_RESULTS_NODE, Target::node(PROCESS_COMMANDS_NODE))
                .add_edge(PROCESS_COMMANDS_NODE, Target::node(AGENT_NODE)),
        };
        builder.compile()
    }

    /// Tools offered to the model by this variant
    pub fn tool_registry(self, config: &ToolConfig) -> Result<ToolRegistry, RegistryError> {
        match self {
            WorkflowVariant::Basic | WorkflowVariant::Analytics => ToolRegistry::standard(config),
            WorkflowVariant::Command => ToolRegistry::with_commands(config),
        }
    }
}

impl fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(WorkflowVariant::Basic),
            "analytics" => Ok(WorkflowVariant::Analytics),
            "command" => Ok(WorkflowVariant::Command),
            other => Err(format!(
                "unknown workflow variant '{other}', expected basic, analytics or command"
            )),
        }
    }
}
