//! Workflow execution state machine.
//!
//! The state machine tracks:
//! - Overall run state (`idle -> running -> completed`)
//! - Per-node execution state, created lazily when the engine first touches a node
//! - The order in which nodes completed and the failures captured along the way

use crate::error::RunStateError;
use crate::port::PortValues;
use chrono::{DateTime, Utc};
use inkflow_core::{NodeId, WorkflowRunId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The overall state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run has been created but not started.
    Idle,
    /// Run is executing nodes.
    Running,
    /// Every reachable node reached a terminal state.
    Completed,
}

impl RunStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// The execution state of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Node has been seen but not started.
    Pending,
    /// Node is currently executing.
    Running,
    /// Node completed successfully.
    Completed,
    /// Node failed.
    Error,
    /// Node was never invoked (failed upstream or branch not taken).
    Skipped,
}

impl NodeStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Skipped)
    }
}

/// Execution record for a single node within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    status: NodeStatus,
    inputs: PortValues,
    outputs: Option<PortValues>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl NodeState {
    fn new() -> Self {
        Self {
            status: NodeStatus::Pending,
            inputs: PortValues::new(),
            outputs: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Snapshot of the resolved inputs.
    #[must_use]
    pub fn inputs(&self) -> &PortValues {
        &self.inputs
    }

    /// Executor outputs, if the node completed.
    #[must_use]
    pub fn outputs(&self) -> Option<&PortValues> {
        self.outputs.as_ref()
    }

    /// Failure message, if the node errored.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the executor was invoked.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the node reached a terminal state.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    // Terminal states are frozen; every transition below is a no-op once
    // reached and reports whether it applied.

    fn start(&mut self, inputs: PortValues) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = NodeStatus::Running;
        self.inputs = inputs;
        self.started_at = Some(Utc::now());
        true
    }

    fn complete(&mut self, outputs: PortValues) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = NodeStatus::Completed;
        self.outputs = Some(outputs);
        self.finished_at = Some(Utc::now());
        true
    }

    fn fail(&mut self, inputs: PortValues, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.status == NodeStatus::Pending {
            self.inputs = inputs;
        }
        self.status = NodeStatus::Error;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        true
    }

    fn skip(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = NodeStatus::Skipped;
        self.finished_at = Some(Utc::now());
        true
    }
}

/// A failure captured during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    /// The node that failed.
    pub node_id: NodeId,
    /// The captured message.
    pub message: String,
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Nodes in the graph snapshot.
    pub total_nodes: usize,
    /// Nodes that completed or errored.
    pub nodes_executed: usize,
    pub nodes_succeeded: usize,
    pub nodes_failed: usize,
    pub nodes_skipped: usize,
    /// `"<node id>: <message>"` for each failure.
    pub errors: Vec<String>,
    pub execution_time_ms: u64,
}

/// One end-to-end execution of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRun {
    id: WorkflowRunId,
    status: RunStatus,
    total_nodes: usize,
    node_states: HashMap<NodeId, NodeState>,
    execution_order: Vec<NodeId>,
    errors: Vec<NodeFailure>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRun {
    /// Creates an idle run over a graph of `total_nodes` nodes.
    #[must_use]
    pub fn new(total_nodes: usize) -> Self {
        Self {
            id: WorkflowRunId::new(),
            status: RunStatus::Idle,
            total_nodes,
            node_states: HashMap::new(),
            execution_order: Vec::new(),
            errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Unique identifier for this run.
    #[must_use]
    pub fn id(&self) -> WorkflowRunId {
        self.id
    }

    /// Current run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// State of a node, if the engine touched it.
    #[must_use]
    pub fn node_state(&self, node_id: NodeId) -> Option<&NodeState> {
        self.node_states.get(&node_id)
    }

    /// Status of a node, if the engine touched it.
    #[must_use]
    pub fn node_status(&self, node_id: NodeId) -> Option<NodeStatus> {
        self.node_state(node_id).map(NodeState::status)
    }

    /// All touched nodes and their states.
    #[must_use]
    pub fn node_states(&self) -> &HashMap<NodeId, NodeState> {
        &self.node_states
    }

    /// Nodes in the order they completed.
    #[must_use]
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    /// Failures in the order they happened.
    #[must_use]
    pub fn errors(&self) -> &[NodeFailure] {
        &self.errors
    }

    /// Starts the run.
    ///
    /// # Errors
    ///
    /// Fails unless the run is idle.
    pub fn start(&mut self) -> Result<(), RunStateError> {
        self.transition(RunStatus::Idle, RunStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the run as completed.
    ///
    /// # Errors
    ///
    /// Fails unless the run is running.
    pub fn complete(&mut self) -> Result<(), RunStateError> {
        self.transition(RunStatus::Running, RunStatus::Completed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), RunStateError> {
        if self.status != from {
            return Err(RunStateError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    fn state_mut(&mut self, node_id: NodeId) -> &mut NodeState {
        self.node_states.entry(node_id).or_insert_with(NodeState::new)
    }

    /// Records that the node is being invoked with `inputs`.
    pub(crate) fn mark_node_running(&mut self, node_id: NodeId, inputs: PortValues) -> bool {
        self.state_mut(node_id).start(inputs)
    }

    /// Records a successful execution.
    pub(crate) fn mark_node_completed(&mut self, node_id: NodeId, outputs: PortValues) -> bool {
        let applied = self.state_mut(node_id).complete(outputs);
        if applied {
            self.execution_order.push(node_id);
        }
        applied
    }

    /// Records a failure, with or without an executor invocation.
    pub(crate) fn mark_node_failed(
        &mut self,
        node_id: NodeId,
        inputs: PortValues,
        message: String,
    ) -> bool {
        let applied = self.state_mut(node_id).fail(inputs, message.clone());
        if applied {
            self.errors.push(NodeFailure { node_id, message });
        }
        applied
    }

    /// Records that the node will never be invoked in this run.
    pub(crate) fn mark_node_skipped(&mut self, node_id: NodeId) -> bool {
        self.state_mut(node_id).skip()
    }

    /// Outputs a completed node produced in this run.
    #[must_use]
    pub fn outputs_of(&self, node_id: NodeId) -> Option<&PortValues> {
        self.node_state(node_id).and_then(NodeState::outputs)
    }

    fn count(&self, status: NodeStatus) -> usize {
        self.node_states
            .values()
            .filter(|s| s.status == status)
            .count()
    }

    /// Summarizes the run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let nodes_succeeded = self.count(NodeStatus::Completed);
        let nodes_failed = self.count(NodeStatus::Error);
        let execution_time_ms = match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => u64::try_from((end - start).num_milliseconds()).unwrap_or(0),
            _ => 0,
        };
        RunSummary {
            total_nodes: self.total_nodes,
            nodes_executed: nodes_succeeded + nodes_failed,
            nodes_succeeded,
            nodes_failed,
            nodes_skipped: self.count(NodeStatus::Skipped),
            errors: self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.node_id, e.message))
                .collect(),
            execution_time_ms,
        }
    }
}
