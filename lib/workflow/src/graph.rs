//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed acyclic graphs where:
//! - Nodes are instances of registered node types
//! - Edges connect output ports to input ports
//!
//! The graph is only mutated through [`crate::store::GraphStore`]; everyone
//! else reads it or works on an owned snapshot.

use crate::edge::Edge;
use crate::node::Node;
use inkflow_core::{EdgeId, NodeId};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A workflow graph using petgraph's stable directed graph.
///
/// Node and edge insertion order is tracked separately because petgraph
/// reuses vacated indices. That order breaks ties during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct WorkflowGraph {
    graph: StableDiGraph<Node, Edge>,
    node_index_map: HashMap<NodeId, NodeIndex>,
    edge_index_map: HashMap<EdgeId, EdgeIndex>,
    node_order: Vec<NodeId>,
    edge_order: Vec<EdgeId>,
    edge_rank: HashMap<EdgeId, u64>,
    next_rank: u64,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_index_map: HashMap::new(),
            edge_index_map: HashMap::new(),
            node_order: Vec::new(),
            edge_order: Vec::new(),
            edge_rank: HashMap::new(),
            next_rank: 0,
        }
    }

    /// Adds a node to the graph.
    ///
    /// Returns the node ID.
    pub(crate) fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        self.node_order.push(node_id);
        node_id
    }

    /// Removes a node from the graph.
    ///
    /// Also removes all edges connected to this node.
    pub(crate) fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Edge>)> {
        let index = self.node_index_map.remove(&node_id)?;
        let incident: Vec<EdgeId> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .chain(self.graph.edges_directed(index, Direction::Outgoing))
            .map(|e| e.weight().id)
            .collect();
        let removed_edges = incident
            .into_iter()
            .filter_map(|edge_id| self.remove_edge(edge_id))
            .collect();
        self.node_order.retain(|id| *id != node_id);
        let node = self.graph.remove_node(index)?;
        Some((node, removed_edges))
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns a mutable reference to a node by its ID.
    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight_mut(*index)
    }

    /// Inserts an already validated edge.
    ///
    /// Returns false if either endpoint is missing.
    pub(crate) fn insert_edge(&mut self, edge: Edge) -> bool {
        let (Some(&source), Some(&target)) = (
            self.node_index_map.get(&edge.source_node),
            self.node_index_map.get(&edge.target_node),
        ) else {
            return false;
        };
        let edge_id = edge.id;
        let index = self.graph.add_edge(source, target, edge);
        self.edge_index_map.insert(edge_id, index);
        self.edge_order.push(edge_id);
        self.edge_rank.insert(edge_id, self.next_rank);
        self.next_rank += 1;
        true
    }

    /// Removes a single edge.
    pub(crate) fn remove_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let index = self.edge_index_map.remove(&edge_id)?;
        self.edge_order.retain(|id| *id != edge_id);
        self.edge_rank.remove(&edge_id);
        self.graph.remove_edge(index)
    }

    /// Returns an edge by its ID.
    #[must_use]
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        let index = self.edge_index_map.get(&edge_id)?;
        self.graph.edge_weight(*index)
    }

    /// Returns all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.node(*id))
    }

    /// Returns all edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edge_order.iter().filter_map(|id| self.edge(*id))
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges ending at `node_id`, in creation order.
    #[must_use]
    pub fn incoming(&self, node_id: NodeId) -> Vec<&Edge> {
        self.incident(node_id, Direction::Incoming)
    }

    /// Edges starting at `node_id`, in creation order.
    #[must_use]
    pub fn outgoing(&self, node_id: NodeId) -> Vec<&Edge> {
        self.incident(node_id, Direction::Outgoing)
    }

    fn incident(&self, node_id: NodeId, direction: Direction) -> Vec<&Edge> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        let mut edges: Vec<&Edge> = self
            .graph
            .edges_directed(index, direction)
            .map(|e| e.weight())
            .collect();
        edges.sort_by_key(|e| self.edge_rank.get(&e.id).copied().unwrap_or(u64::MAX));
        edges
    }

    /// Returns true if a directed path leads from `from` to `to`.
    #[must_use]
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let (Some(&from), Some(&to)) = (self.node_index_map.get(&from), self.node_index_map.get(&to))
        else {
            return false;
        };
        petgraph::algo::has_path_connecting(&self.graph, from, to, None)
    }

    /// Returns true if the edges form a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat serialized form of a [`WorkflowGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes in insertion order.
    pub nodes: Vec<Node>,
    /// Edges in creation order.
    pub edges: Vec<Edge>,
}

impl From<WorkflowGraph> for GraphDocument {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
        }
    }
}

impl TryFrom<GraphDocument> for WorkflowGraph {
    type Error = String;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = WorkflowGraph::new();
        let mut seen = HashSet::new();
        for node in document.nodes {
            if !seen.insert(node.id) {
                return Err(format!("duplicate node id {}", node.id));
            }
            graph.add_node(node);
        }
        for edge in document.edges {
            let edge_id = edge.id;
            if !graph.insert_edge(edge) {
                return Err(format!("edge {edge_id} references a missing node"));
            }
        }
        if graph.is_cyclic() {
            return Err("graph contains cycles".to_string());
        }
        Ok(graph)
    }
}
