//! Connection validation.
//!
//! Validation is a pure function over the current graph and the registry.
//! Rules are checked in a fixed order and the first failing rule decides the
//! rejection, so a self-loop onto a missing node reports the self-loop.

use crate::edge::EdgeCandidate;
use crate::graph::WorkflowGraph;
use crate::port::DataKind;
use crate::registry::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a proposed connection was refused.
///
/// Rejections are ordinary values; interactive editing produces them often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConnectionRejected {
    SelfConnection,
    NodeNotFound,
    UnknownPort,
    PortAlreadyConnected,
    IncompatibleKinds {
        source_type: String,
        target_type: String,
    },
    WouldCreateCycle,
}

impl ConnectionRejected {
    /// The human-readable reason shown to the user.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConnectionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConnection => f.write_str("self-connection not allowed"),
            Self::NodeNotFound => f.write_str("source or target node not found"),
            Self::UnknownPort => f.write_str("unknown port"),
            Self::PortAlreadyConnected => f.write_str("port already connected"),
            Self::IncompatibleKinds {
                source_type,
                target_type,
            } => write!(
                f,
                "{source_type} output is incompatible with {target_type} input"
            ),
            Self::WouldCreateCycle => f.write_str("connection would create a cycle"),
        }
    }
}

/// Decides whether `candidate` may be added to `graph`.
///
/// On success returns the data kind to stamp onto the new edge.
///
/// # Errors
///
/// Returns the first rule the candidate violates.
pub fn validate_connection(
    candidate: &EdgeCandidate,
    graph: &WorkflowGraph,
    registry: &NodeRegistry,
) -> Result<DataKind, ConnectionRejected> {
    if candidate.source_node == candidate.target_node {
        return Err(ConnectionRejected::SelfConnection);
    }

    let (Some(source), Some(target)) = (
        graph.node(candidate.source_node),
        graph.node(candidate.target_node),
    ) else {
        return Err(ConnectionRejected::NodeNotFound);
    };

    let source_port = registry
        .lookup(&source.node_type)
        .and_then(|def| def.output_port(&candidate.source_port));
    let target_port = registry
        .lookup(&target.node_type)
        .and_then(|def| def.input_port(&candidate.target_port));
    let (Some(source_port), Some(target_port)) = (source_port, target_port) else {
        return Err(ConnectionRejected::UnknownPort);
    };

    // Single-input ports may take several edges from one node, such as both
    // branches of a conditional.
    let occupied = graph
        .incoming(candidate.target_node)
        .into_iter()
        .filter(|e| e.target_port == candidate.target_port)
        .any(|e| {
            let same_node = e.source_node == candidate.source_node;
            (same_node && e.source_port == candidate.source_port)
                || (!target_port.multiple && !same_node)
        });
    if occupied {
        return Err(ConnectionRejected::PortAlreadyConnected);
    }

    let kind = source_port.kind;
    if !target_port.accepts_kind(kind) {
        return Err(ConnectionRejected::IncompatibleKinds {
            source_type: source.node_type.clone(),
            target_type: target.node_type.clone(),
        });
    }

    if graph.reaches(candidate.target_node, candidate.source_node) {
        return Err(ConnectionRejected::WouldCreateCycle);
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{ConfigKind, Node, NodeConfig};
    use crate::port::{InputPort, OutputPort, PortValues};
    use crate::registry::{NodeExecutionError, NodeTypeDefinition, executor_fn};
    use inkflow_core::NodeId;

    fn registry() -> NodeRegistry {
        let exec = || executor_fn(|_, _| async { Ok::<_, NodeExecutionError>(PortValues::new()) });
        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeTypeDefinition::new("idea", "Idea", ConfigKind::Custom, exec())
                    .with_output(OutputPort::new("output", DataKind::Idea)),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDefinition::new("draft", "Draft", ConfigKind::Custom, exec())
                    .with_input(InputPort::required("input", [DataKind::Idea]))
                    .with_output(OutputPort::new("output", DataKind::Draft)),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDefinition::new("media", "Media", ConfigKind::Custom, exec())
                    .with_input(InputPort::required("input", [DataKind::Media]))
                    .with_output(OutputPort::new("output", DataKind::Media)),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDefinition::new("combine", "Combine", ConfigKind::Custom, exec())
                    .with_input(InputPort::required("parts", [DataKind::Any]).multiple())
                    .with_output(OutputPort::new("output", DataKind::CombinedContent)),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDefinition::new("branch", "Branch", ConfigKind::Custom, exec())
                    .with_output(OutputPort::branch("true", DataKind::Idea))
                    .with_output(OutputPort::branch("false", DataKind::Idea)),
            )
            .unwrap();
        registry
    }

    fn add(graph: &mut WorkflowGraph, node_type: &str) -> NodeId {
        graph.add_node(Node::new(node_type, NodeConfig::custom()))
    }

    fn check(
        graph: &mut WorkflowGraph,
        registry: &NodeRegistry,
        candidate: EdgeCandidate,
    ) -> Result<DataKind, ConnectionRejected> {
        let kind = validate_connection(&candidate, graph, registry)?;
        graph.insert_edge(Edge::from_candidate(candidate, kind));
        Ok(kind)
    }

    #[test]
    fn accepts_matching_kinds() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let idea = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");

        let kind = check(
            &mut graph,
            &registry,
            EdgeCandidate::new(idea, "output", draft, "input"),
        );
        assert_eq!(kind, Ok(DataKind::Idea));
    }

    #[test]
    fn self_loop_wins_over_missing_node() {
        let registry = registry();
        let graph = WorkflowGraph::new();
        let ghost = NodeId::new();

        let err = validate_connection(
            &EdgeCandidate::new(ghost, "output", ghost, "input"),
            &graph,
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "self-connection not allowed");
    }

    #[test]
    fn rejects_missing_node() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let idea = add(&mut graph, "idea");

        let err = validate_connection(
            &EdgeCandidate::new(idea, "output", NodeId::new(), "input"),
            &graph,
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "source or target node not found");
    }

    #[test]
    fn rejects_unknown_port() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let idea = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");

        let err = validate_connection(
            &EdgeCandidate::new(idea, "summary", draft, "input"),
            &graph,
            &registry,
        )
        .unwrap_err();
        assert_eq!(err, ConnectionRejected::UnknownPort);
    }

    #[test]
    fn rejects_second_source_on_single_input() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let first = add(&mut graph, "idea");
        let second = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");

        check(&mut graph, &registry, EdgeCandidate::new(first, "output", draft, "input")).unwrap();
        let err = check(
            &mut graph,
            &registry,
            EdgeCandidate::new(second, "output", draft, "input"),
        )
        .unwrap_err();
        assert_eq!(err.reason(), "port already connected");
    }

    #[test]
    fn single_input_takes_both_branches_of_one_node() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let branch = add(&mut graph, "branch");
        let other = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");

        check(&mut graph, &registry, EdgeCandidate::new(branch, "true", draft, "input")).unwrap();
        check(&mut graph, &registry, EdgeCandidate::new(branch, "false", draft, "input")).unwrap();

        let duplicate = check(
            &mut graph,
            &registry,
            EdgeCandidate::new(branch, "true", draft, "input"),
        );
        assert_eq!(duplicate, Err(ConnectionRejected::PortAlreadyConnected));
        let foreign = check(
            &mut graph,
            &registry,
            EdgeCandidate::new(other, "output", draft, "input"),
        );
        assert_eq!(foreign, Err(ConnectionRejected::PortAlreadyConnected));
        assert_eq!(graph.incoming(draft).len(), 2);
    }

    #[test]
    fn multi_input_port_takes_many_sources() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let idea = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");
        let combine = add(&mut graph, "combine");

        check(&mut graph, &registry, EdgeCandidate::new(idea, "output", draft, "input")).unwrap();
        check(&mut graph, &registry, EdgeCandidate::new(idea, "output", combine, "parts")).unwrap();
        check(&mut graph, &registry, EdgeCandidate::new(draft, "output", combine, "parts")).unwrap();

        let duplicate = check(
            &mut graph,
            &registry,
            EdgeCandidate::new(draft, "output", combine, "parts"),
        );
        assert_eq!(duplicate, Err(ConnectionRejected::PortAlreadyConnected));
    }

    #[test]
    fn rejects_draft_into_media_port() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let idea = add(&mut graph, "idea");
        let draft = add(&mut graph, "draft");
        let media = add(&mut graph, "media");
        check(&mut graph, &registry, EdgeCandidate::new(idea, "output", draft, "input")).unwrap();

        let err = validate_connection(
            &EdgeCandidate::new(draft, "output", media, "input"),
            &graph,
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "draft output is incompatible with media input");
    }

    #[test]
    fn rejects_cycle() {
        let registry = registry();
        let mut graph = WorkflowGraph::new();
        let a = add(&mut graph, "combine");
        let b = add(&mut graph, "combine");
        let c = add(&mut graph, "combine");
        check(&mut graph, &registry, EdgeCandidate::new(a, "output", b, "parts")).unwrap();
        check(&mut graph, &registry, EdgeCandidate::new(b, "output", c, "parts")).unwrap();

        let err = check(&mut graph, &registry, EdgeCandidate::new(c, "output", a, "parts"))
            .unwrap_err();
        assert_eq!(err.reason(), "connection would create a cycle");
        assert!(!graph.is_cyclic());
    }
}
