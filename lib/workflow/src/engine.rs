//! Single-pass workflow execution.
//!
//! The engine runs on a graph snapshot and never writes back to it:
//! 1. Plan: collect the nodes reachable from source nodes and order them
//!    topologically, breaking ties by insertion order.
//! 2. Walk the plan one node at a time. Each node's inputs are resolved from
//!    the outputs upstream nodes produced in this run.
//! 3. A node fed by an upstream node that failed or was skipped is skipped
//!    without invoking its executor, as is a node whose only inputs come
//!    through branch ports that were not taken.
//!
//! Node failures are captured on the run; `run` itself never fails.

use crate::edge::Edge;
use crate::error::ExecutionError;
use crate::execution::{ExecutionRun, NodeStatus};
use crate::graph::WorkflowGraph;
use crate::node::Node;
use crate::port::PortValues;
use crate::progress::ProgressObserver;
use crate::registry::{NodeRegistry, NodeTypeDefinition};
use futures::FutureExt;
use inkflow_core::NodeId;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The nodes a run will visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Reachable nodes in topological order.
    pub order: Vec<NodeId>,
    /// Reachable nodes that never became ready because they sit on a cycle.
    pub stranded: Vec<NodeId>,
}

/// What an incoming edge delivers at the moment its target is visited.
enum Feed<'a> {
    /// The upstream node produced a value on the port.
    Active(&'a JsonValue),
    /// The upstream node failed or was skipped.
    Failed,
    /// The upstream node completed without taking this branch.
    Untaken,
    /// Nothing arrived but the path is not cut off.
    Empty,
}

enum Resolution {
    Ready(PortValues),
    Skip,
    Missing { inputs: PortValues, port_id: String },
}

/// Executes workflow graphs against a node registry.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<NodeRegistry>,
}

impl ExecutionEngine {
    /// Creates an engine resolving node types through `registry`.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry }
    }

    fn is_source(&self, graph: &WorkflowGraph, node: &Node) -> bool {
        match self.registry.lookup(&node.node_type) {
            Some(definition) => definition.is_source(),
            // Unknown types start a run only when nothing feeds them.
            None => graph.incoming(node.id).is_empty(),
        }
    }

    /// Computes the order a run over `graph` will follow.
    #[must_use]
    pub fn plan(&self, graph: &WorkflowGraph) -> ExecutionPlan {
        let position: HashMap<NodeId, usize> = graph
            .nodes()
            .enumerate()
            .map(|(index, node)| (node.id, index))
            .collect();
        let position_of = |id: &NodeId| position.get(id).copied().unwrap_or(usize::MAX);

        let mut reachable = HashSet::new();
        let mut queue: VecDeque<NodeId> = graph
            .nodes()
            .filter(|node| self.is_source(graph, node))
            .map(|node| node.id)
            .collect();
        while let Some(node_id) = queue.pop_front() {
            if !reachable.insert(node_id) {
                continue;
            }
            queue.extend(graph.outgoing(node_id).into_iter().map(|e| e.target_node));
        }

        let mut in_degree: HashMap<NodeId, usize> =
            reachable.iter().map(|id| (*id, 0)).collect();
        for edge in graph.edges() {
            if reachable.contains(&edge.source_node)
                && let Some(degree) = in_degree.get_mut(&edge.target_node)
            {
                *degree += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<(usize, NodeId)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| Reverse((position_of(id), *id)))
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse((_, node_id))) = ready.pop() {
            order.push(node_id);
            for edge in graph.outgoing(node_id) {
                if let Some(degree) = in_degree.get_mut(&edge.target_node) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push(Reverse((position_of(&edge.target_node), edge.target_node)));
                    }
                }
            }
        }

        let placed: HashSet<NodeId> = order.iter().copied().collect();
        let stranded = graph
            .nodes()
            .map(|node| node.id)
            .filter(|id| reachable.contains(id) && !placed.contains(id))
            .collect();

        ExecutionPlan { order, stranded }
    }

    /// Runs every node reachable from a source node.
    ///
    /// Always resolves with a completed run; inspect
    /// [`ExecutionRun::summary`] for failures.
    #[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
    pub async fn run(&self, graph: &WorkflowGraph, progress: &dyn ProgressObserver) -> ExecutionRun {
        let mut run = ExecutionRun::new(graph.node_count());
        if let Err(error) = run.start() {
            warn!(%error, "run could not start");
            return run;
        }

        let plan = self.plan(graph);
        info!(run_id = %run.id(), planned = plan.order.len(), "run started");

        for node_id in &plan.order {
            if let Some(node) = graph.node(*node_id) {
                self.step(graph, node, &mut run, progress).await;
            }
        }
        for node_id in plan.stranded {
            warn!(%node_id, "node sits on a cycle, skipping");
            if run.mark_node_skipped(node_id) {
                progress.on_node_skipped(node_id);
            }
        }

        if let Err(error) = run.complete() {
            warn!(%error, "run could not complete");
        }
        let summary = run.summary();
        info!(
            run_id = %run.id(),
            succeeded = summary.nodes_succeeded,
            failed = summary.nodes_failed,
            skipped = summary.nodes_skipped,
            elapsed_ms = summary.execution_time_ms,
            "run completed"
        );
        run
    }

    async fn step(
        &self,
        graph: &WorkflowGraph,
        node: &Node,
        run: &mut ExecutionRun,
        progress: &dyn ProgressObserver,
    ) {
        let Some(definition) = self.registry.lookup(&node.node_type) else {
            let error = ExecutionError::UnknownNodeType {
                type_id: node.node_type.clone(),
            };
            fail(run, progress, node.id, PortValues::new(), &error);
            return;
        };

        let inputs = match self.resolve(graph, run, node, definition) {
            Resolution::Ready(inputs) => inputs,
            Resolution::Skip => {
                debug!(node_id = %node.id, "upstream cut off, skipping");
                if run.mark_node_skipped(node.id) {
                    progress.on_node_skipped(node.id);
                }
                return;
            }
            Resolution::Missing { inputs, port_id } => {
                let error = ExecutionError::MissingRequiredInput { port_id };
                fail(run, progress, node.id, inputs, &error);
                return;
            }
        };

        run.mark_node_running(node.id, inputs.clone());
        progress.on_node_start(node.id);
        debug!(node_id = %node.id, node_type = %node.node_type, "executing node");

        let outcome = AssertUnwindSafe(definition.executor().execute(inputs, &node.config))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(outputs)) => {
                debug!(node_id = %node.id, ports = outputs.len(), "node completed");
                if run.mark_node_completed(node.id, outputs)
                    && let Some(outputs) = run.outputs_of(node.id)
                {
                    progress.on_node_complete(node.id, outputs);
                }
            }
            Ok(Err(error)) => {
                let error = ExecutionError::NodeFailed {
                    reason: error.to_string(),
                };
                fail(run, progress, node.id, PortValues::new(), &error);
            }
            Err(payload) => {
                let error = ExecutionError::NodeFailed {
                    reason: panic_message(payload.as_ref()),
                };
                fail(run, progress, node.id, PortValues::new(), &error);
            }
        }
    }

    fn feed<'a>(&self, graph: &WorkflowGraph, run: &'a ExecutionRun, edge: &Edge) -> Feed<'a> {
        let Some(state) = run.node_state(edge.source_node) else {
            return Feed::Empty;
        };
        match state.status() {
            NodeStatus::Completed => {
                match state.outputs().and_then(|outputs| outputs.get(&edge.source_port)) {
                    Some(value) => Feed::Active(value),
                    None if self.is_branch(graph, edge) => Feed::Untaken,
                    None => Feed::Empty,
                }
            }
            NodeStatus::Error | NodeStatus::Skipped => Feed::Failed,
            NodeStatus::Pending | NodeStatus::Running => Feed::Empty,
        }
    }

    fn is_branch(&self, graph: &WorkflowGraph, edge: &Edge) -> bool {
        graph
            .node(edge.source_node)
            .and_then(|source| self.registry.lookup(&source.node_type))
            .and_then(|definition| definition.output_port(&edge.source_port))
            .is_some_and(|port| port.branch)
    }

    fn resolve(
        &self,
        graph: &WorkflowGraph,
        run: &ExecutionRun,
        node: &Node,
        definition: &NodeTypeDefinition,
    ) -> Resolution {
        let feeds: Vec<(&Edge, Feed<'_>)> = graph
            .incoming(node.id)
            .into_iter()
            .map(|edge| (edge, self.feed(graph, run, edge)))
            .collect();
        if feeds.iter().any(|(_, feed)| matches!(feed, Feed::Failed)) {
            return Resolution::Skip;
        }
        if !feeds.is_empty() && feeds.iter().all(|(_, feed)| matches!(feed, Feed::Untaken)) {
            return Resolution::Skip;
        }

        let mut inputs = PortValues::new();
        let mut missing = None;
        for port in &definition.inputs {
            let mut values = Vec::new();
            let mut cut_off = false;
            for (_, feed) in feeds.iter().filter(|(edge, _)| edge.target_port == port.id) {
                match feed {
                    Feed::Active(value) => values.push((*value).clone()),
                    Feed::Untaken => cut_off = true,
                    Feed::Failed | Feed::Empty => {}
                }
            }

            if values.is_empty() {
                if port.required {
                    if cut_off {
                        return Resolution::Skip;
                    }
                    missing.get_or_insert_with(|| port.id.clone());
                }
                continue;
            }

            let value = if port.multiple {
                JsonValue::Array(values)
            } else {
                values.swap_remove(0)
            };
            inputs.insert(port.id.clone(), value);
        }

        match missing {
            Some(port_id) => Resolution::Missing { inputs, port_id },
            None => Resolution::Ready(inputs),
        }
    }
}

fn fail(
    run: &mut ExecutionRun,
    progress: &dyn ProgressObserver,
    node_id: NodeId,
    inputs: PortValues,
    error: &ExecutionError,
) {
    let message = error.to_string();
    warn!(%node_id, error = %message, "node failed");
    if run.mark_node_failed(node_id, inputs, message.clone()) {
        progress.on_node_error(node_id, &message);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("executor panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("executor panicked: {message}")
    } else {
        "executor panicked".to_string()
    }
}
