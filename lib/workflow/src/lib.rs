//! Node-graph workflow engine for content pipelines.
//!
//! This crate provides:
//!
//! - **Registry**: Node types with typed ports and host-supplied executors
//! - **Graph Store**: The single writer of a workflow graph, with change events
//! - **Validation**: Pure admit/reject decisions for proposed connections
//! - **Engine**: Single-pass topological execution with branch pruning
//! - **Progress**: Observers for node transitions during a run
//! - **Catalog**: The built-in content pipeline node types

pub mod catalog;
pub mod edge;
pub mod engine;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod port;
pub mod progress;
pub mod registry;
pub mod store;
pub mod validate;

pub use catalog::{ConditionalExecutor, ContentNodeType, register_content_types};
pub use edge::{Edge, EdgeCandidate};
pub use engine::{ExecutionEngine, ExecutionPlan};
pub use error::{ExecutionError, GraphError, RegistryError, RunStateError};
pub use execution::{ExecutionRun, NodeFailure, NodeState, NodeStatus, RunStatus, RunSummary};
pub use graph::{GraphDocument, WorkflowGraph};
pub use node::{
    ConditionOperator, ConditionalConfig, ConfigKind, Node, NodeConfig, Platform, Tone,
};
pub use port::{DataKind, InputPort, OutputPort, PortValues};
pub use progress::{
    ChannelProgress, NoopProgress, ProgressCallbacks, ProgressEvent, ProgressObserver,
};
pub use registry::{
    FnExecutor, NodeExecutionError, NodeExecutor, NodeRegistry, NodeTypeDefinition, executor_fn,
};
pub use store::{GraphEvent, GraphStore};
pub use validate::{ConnectionRejected, validate_connection};
