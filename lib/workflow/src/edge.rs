//! Edge types for workflow graphs.
//!
//! Edges connect ports between nodes. Each edge specifies:
//! - The source port (output from one node)
//! - The target port (input on another node)
//! - The data kind flowing across it, resolved when the edge is created

use crate::port::DataKind;
use inkflow_core::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

/// A proposed connection that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCandidate {
    /// The source node ID.
    pub source_node: NodeId,
    /// The output port on the source node.
    pub source_port: String,
    /// The target node ID.
    pub target_node: NodeId,
    /// The input port on the target node.
    pub target_port: String,
}

impl EdgeCandidate {
    /// Creates a new edge candidate.
    #[must_use]
    pub fn new(
        source_node: NodeId,
        source_port: impl Into<String>,
        target_node: NodeId,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source_node,
            source_port: source_port.into(),
            target_node,
            target_port: target_port.into(),
        }
    }
}

/// An edge connecting two ports in a workflow graph.
///
/// Edges carry data from a source node's output port to a target node's input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// The source node ID.
    pub source_node: NodeId,
    /// The name of the output port on the source node.
    pub source_port: String,
    /// The target node ID.
    pub target_node: NodeId,
    /// The name of the input port on the target node.
    pub target_port: String,
    /// The kind of data flowing across this edge.
    pub kind: DataKind,
}

impl Edge {
    /// Creates an edge from a validated candidate.
    #[must_use]
    pub fn from_candidate(candidate: EdgeCandidate, kind: DataKind) -> Self {
        Self {
            id: EdgeId::new(),
            source_node: candidate.source_node,
            source_port: candidate.source_port,
            target_node: candidate.target_node,
            target_port: candidate.target_port,
            kind,
        }
    }
}
