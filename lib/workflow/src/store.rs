//! Graph store: the single writer of a workflow graph.
//!
//! Every mutation goes through [`GraphStore`]. Each successful mutation is
//! returned to the caller and also broadcast as a [`GraphEvent`] so editors
//! can animate changes without polling.

use crate::edge::{Edge, EdgeCandidate};
use crate::error::GraphError;
use crate::execution::ExecutionRun;
use crate::graph::WorkflowGraph;
use crate::node::{Node, NodeConfig};
use crate::registry::NodeRegistry;
use crate::validate::{ConnectionRejected, validate_connection};
use inkflow_core::{EdgeId, NodeId, Result, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

const EVENT_CAPACITY: usize = 64;

/// A change applied to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeAdded {
        node_id: NodeId,
        node_type: String,
    },
    NodeRemoved {
        node_id: NodeId,
        removed_edges: Vec<EdgeId>,
    },
    NodeConfigUpdated {
        node_id: NodeId,
    },
    EdgeAdded {
        edge: Edge,
    },
    EdgeRemoved {
        edge_id: EdgeId,
    },
}

/// Owns one workflow graph for the length of an editing session.
#[derive(Debug)]
pub struct GraphStore {
    workflow_id: WorkflowId,
    registry: Arc<NodeRegistry>,
    graph: WorkflowGraph,
    events: broadcast::Sender<GraphEvent>,
}

impl GraphStore {
    /// Creates a store with an empty graph.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_graph(registry, WorkflowGraph::new())
    }

    /// Creates a store around a previously saved graph.
    #[must_use]
    pub fn with_graph(registry: Arc<NodeRegistry>, graph: WorkflowGraph) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            workflow_id: WorkflowId::new(),
            registry,
            graph,
            events,
        }
    }

    /// Identifier of the workflow this store edits.
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// The registry nodes are checked against.
    #[must_use]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Read-only view of the current graph.
    #[must_use]
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// An owned copy of the graph to hand to the engine.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowGraph {
        self.graph.clone()
    }

    /// Subscribes to mutations made after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: GraphEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Adds a node of a registered type with a fresh id.
    ///
    /// # Errors
    ///
    /// Fails if the type is unknown, the config variant belongs to another
    /// type, or the config is out of range.
    #[instrument(skip(self, config), fields(workflow_id = %self.workflow_id))]
    pub fn add_node(&mut self, node_type: &str, config: NodeConfig) -> Result<Node, GraphError> {
        let Some(definition) = self.registry.lookup(node_type) else {
            return Err(GraphError::UnknownNodeType {
                type_id: node_type.to_string(),
            }
            .into());
        };
        if definition.config_kind != config.kind() {
            return Err(GraphError::ConfigMismatch {
                type_id: node_type.to_string(),
                expected: definition.config_kind,
                actual: config.kind(),
            }
            .into());
        }
        config.validate().map_err(|reason| GraphError::InvalidConfig {
            type_id: node_type.to_string(),
            reason,
        })?;

        let node = Node::new(node_type, config);
        self.graph.add_node(node.clone());
        debug!(node_id = %node.id, "node added");
        self.publish(GraphEvent::NodeAdded {
            node_id: node.id,
            node_type: node.node_type.clone(),
        });
        Ok(node)
    }

    /// Removes a node and every edge touching it.
    ///
    /// Returns `None` if the node was not present.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let (node, removed) = self.graph.remove_node(node_id)?;
        let removed_edges: Vec<EdgeId> = removed.iter().map(|e| e.id).collect();
        debug!(edges = removed_edges.len(), "node removed");
        self.publish(GraphEvent::NodeRemoved {
            node_id,
            removed_edges,
        });
        Some(node)
    }

    /// Shallow-merges `patch` into a node's config.
    ///
    /// Execution is not re-run and cached outputs are kept.
    ///
    /// # Errors
    ///
    /// Fails if the node is absent or the merged config is invalid.
    #[instrument(skip(self, patch), fields(workflow_id = %self.workflow_id))]
    pub fn update_node_config(
        &mut self,
        node_id: NodeId,
        patch: &Map<String, JsonValue>,
    ) -> Result<Node, GraphError> {
        let Some(node) = self.graph.node_mut(node_id) else {
            return Err(GraphError::NodeNotFound { node_id }.into());
        };
        let config = node
            .config
            .merged(patch)
            .map_err(|reason| GraphError::InvalidConfig {
                type_id: node.node_type.clone(),
                reason,
            })?;
        node.config = config;
        let updated = node.clone();

        debug!("node config updated");
        self.publish(GraphEvent::NodeConfigUpdated { node_id });
        Ok(updated)
    }

    /// Adds an edge if the validator admits it.
    ///
    /// # Errors
    ///
    /// Returns the rejection unchanged; the graph is untouched.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub fn connect(&mut self, candidate: EdgeCandidate) -> std::result::Result<Edge, ConnectionRejected> {
        let kind = validate_connection(&candidate, &self.graph, &self.registry).inspect_err(
            |rejected| debug!(reason = %rejected, "connection rejected"),
        )?;

        let edge = Edge::from_candidate(candidate, kind);
        if !self.graph.insert_edge(edge.clone()) {
            return Err(ConnectionRejected::NodeNotFound);
        }
        debug!(edge_id = %edge.id, kind = %kind, "edge added");
        self.publish(GraphEvent::EdgeAdded { edge: edge.clone() });
        Ok(edge)
    }

    /// Removes a single edge. No cascade.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.graph.remove_edge(edge_id)?;
        debug!("edge removed");
        self.publish(GraphEvent::EdgeRemoved { edge_id });
        Some(edge)
    }

    /// Caches the outputs of every node that completed in `run`.
    ///
    /// Nodes removed since the snapshot was taken are ignored. Returns the
    /// number of nodes updated.
    pub fn record_outputs(&mut self, run: &ExecutionRun) -> usize {
        let mut updated = 0;
        for node_id in run.execution_order() {
            let (Some(outputs), Some(node)) = (run.outputs_of(*node_id), self.graph.node_mut(*node_id))
            else {
                continue;
            };
            node.last_outputs = Some(outputs.clone());
            updated += 1;
        }
        debug!(run_id = %run.id(), updated, "cached node outputs");
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ConfigKind, Tone};
    use crate::port::{DataKind, InputPort, OutputPort, PortValues};
    use crate::registry::{NodeExecutionError, NodeTypeDefinition, executor_fn};
    use serde_json::json;

    fn registry() -> Arc<NodeRegistry> {
        let exec = || executor_fn(|_, _| async { Ok::<_, NodeExecutionError>(PortValues::new()) });
        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeTypeDefinition::new("idea", "Idea", ConfigKind::Idea, exec())
                    .with_output(OutputPort::new("output", DataKind::Idea)),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDefinition::new("draft", "Draft", ConfigKind::Draft, exec())
                    .with_input(InputPort::required("input", [DataKind::Idea]))
                    .with_output(OutputPort::new("output", DataKind::Draft)),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn idea() -> NodeConfig {
        NodeConfig::Idea {
            topic: "rust".to_string(),
            niche: None,
        }
    }

    fn draft() -> NodeConfig {
        NodeConfig::Draft {
            tone: Tone::Casual,
            max_words: 100,
        }
    }

    fn patch(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn add_node_assigns_fresh_ids() {
        let mut store = GraphStore::new(registry());
        let a = store.add_node("idea", idea()).unwrap();
        let b = store.add_node("idea", idea()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.graph().node_count(), 2);
    }

    #[test]
    fn add_node_rejects_unknown_type() {
        let mut store = GraphStore::new(registry());
        let err = store.add_node("trigger", NodeConfig::custom()).unwrap_err();
        assert!(err.to_string().contains("unknown node type: trigger"));
        assert_eq!(store.graph().node_count(), 0);
    }

    #[test]
    fn add_node_rejects_foreign_config() {
        let mut store = GraphStore::new(registry());
        let err = store.add_node("draft", idea()).unwrap_err();
        assert!(err.to_string().contains("expects draft config, got idea"));
    }

    #[test]
    fn add_node_rejects_out_of_range_config() {
        let mut store = GraphStore::new(registry());
        let config = NodeConfig::Draft {
            tone: Tone::Casual,
            max_words: 0,
        };
        let err = store.add_node("draft", config).unwrap_err();
        assert!(err.to_string().contains("max_words"));
    }

    #[test]
    fn remove_node_cascades_and_is_idempotent() {
        let mut store = GraphStore::new(registry());
        let n1 = store.add_node("idea", idea()).unwrap();
        let n2 = store.add_node("draft", draft()).unwrap();
        store
            .connect(EdgeCandidate::new(n1.id, "output", n2.id, "input"))
            .unwrap();

        assert!(store.remove_node(n1.id).is_some());
        assert_eq!(store.graph().edge_count(), 0);
        assert!(store.remove_node(n1.id).is_none());
    }

    #[test]
    fn update_config_merges_patch() {
        let mut store = GraphStore::new(registry());
        let node = store.add_node("draft", draft()).unwrap();

        let updated = store
            .update_node_config(node.id, &patch(json!({"max_words": 500})))
            .unwrap();
        assert_eq!(
            updated.config,
            NodeConfig::Draft {
                tone: Tone::Casual,
                max_words: 500
            }
        );
        assert_eq!(store.graph().node(node.id).unwrap().config, updated.config);
    }

    #[test]
    fn update_config_on_missing_node_fails() {
        let mut store = GraphStore::new(registry());
        let err = store
            .update_node_config(NodeId::new(), &patch(json!({"topic": "x"})))
            .unwrap_err();
        assert!(err.to_string().contains("node not found"));
    }

    #[test]
    fn invalid_patch_leaves_config_untouched() {
        let mut store = GraphStore::new(registry());
        let node = store.add_node("draft", draft()).unwrap();

        assert!(
            store
                .update_node_config(node.id, &patch(json!({"max_words": 9000})))
                .is_err()
        );
        assert_eq!(store.graph().node(node.id).unwrap().config, draft());
    }

    #[test]
    fn rejected_connect_does_not_mutate() {
        let mut store = GraphStore::new(registry());
        let n1 = store.add_node("idea", idea()).unwrap();
        let n2 = store.add_node("draft", draft()).unwrap();

        let rejected = store
            .connect(EdgeCandidate::new(n1.id, "output", n2.id, "missing"))
            .unwrap_err();
        assert_eq!(rejected, ConnectionRejected::UnknownPort);
        assert_eq!(store.graph().edge_count(), 0);
    }

    #[test]
    fn disconnect_removes_single_edge() {
        let mut store = GraphStore::new(registry());
        let n1 = store.add_node("idea", idea()).unwrap();
        let n2 = store.add_node("draft", draft()).unwrap();
        let edge = store
            .connect(EdgeCandidate::new(n1.id, "output", n2.id, "input"))
            .unwrap();

        assert_eq!(edge.kind, DataKind::Idea);
        assert!(store.disconnect(edge.id).is_some());
        assert!(store.disconnect(edge.id).is_none());
        assert_eq!(store.graph().node_count(), 2);
    }

    #[test]
    fn mutations_are_broadcast() {
        let mut store = GraphStore::new(registry());
        let mut events = store.subscribe();

        let n1 = store.add_node("idea", idea()).unwrap();
        let n2 = store.add_node("draft", draft()).unwrap();
        let edge = store
            .connect(EdgeCandidate::new(n1.id, "output", n2.id, "input"))
            .unwrap();
        store.remove_node(n2.id);

        assert!(matches!(events.try_recv().unwrap(), GraphEvent::NodeAdded { node_id, .. } if node_id == n1.id));
        assert!(matches!(events.try_recv().unwrap(), GraphEvent::NodeAdded { .. }));
        assert_eq!(
            events.try_recv().unwrap(),
            GraphEvent::EdgeAdded { edge: edge.clone() }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            GraphEvent::NodeRemoved {
                node_id: n2.id,
                removed_edges: vec![edge.id]
            }
        );
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = GraphStore::new(registry());
        store.add_node("idea", idea()).unwrap();
        let snapshot = store.snapshot();
        store.add_node("idea", idea()).unwrap();
        assert_eq!(snapshot.node_count(), 1);
        assert_eq!(store.graph().node_count(), 2);
    }
}
