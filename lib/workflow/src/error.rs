//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `RegistryError`: Node type catalog operations
//! - `GraphError`: Graph store operations (nodes, configs)
//! - `ExecutionError`: Per-node failures captured during a run
//! - `RunStateError`: Illegal run state transitions
//!
//! Connection rejections are not errors; see [`crate::validate::ConnectionRejected`].

use crate::node::ConfigKind;
use inkflow_core::NodeId;
use std::fmt;

/// Errors from the node type registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A node type with this id is already registered.
    DuplicateType { type_id: String },
    /// Two ports on the same node type share an id.
    DuplicatePort { type_id: String, port_id: String },
    /// No node type with this id is registered.
    NotFound { type_id: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType { type_id } => {
                write!(f, "node type '{type_id}' is already registered")
            }
            Self::DuplicatePort { type_id, port_id } => {
                write!(f, "node type '{type_id}' declares port '{port_id}' more than once")
            }
            Self::NotFound { type_id } => write!(f, "node type not found: {type_id}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors from graph store operations.
///
/// These are fatal to the single operation and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The node type is not registered.
    UnknownNodeType { type_id: String },
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// The config variant does not belong to the node type.
    ConfigMismatch {
        type_id: String,
        expected: ConfigKind,
        actual: ConfigKind,
    },
    /// The config failed validation.
    InvalidConfig { type_id: String, reason: String },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { type_id } => write!(f, "unknown node type: {type_id}"),
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::ConfigMismatch {
                type_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "node type '{type_id}' expects {expected} config, got {actual}"
                )
            }
            Self::InvalidConfig { type_id, reason } => {
                write!(f, "invalid config for node type '{type_id}': {reason}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Failures captured for a single node during a run.
///
/// These never abort the run; they are recorded on the node state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// A required input port had no resolved value.
    MissingRequiredInput { port_id: String },
    /// The executor returned an error or panicked.
    NodeFailed { reason: String },
    /// The node references a type that is not in the registry.
    UnknownNodeType { type_id: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredInput { port_id } => {
                write!(f, "missing required input: {port_id}")
            }
            Self::NodeFailed { reason } => f.write_str(reason),
            Self::UnknownNodeType { type_id } => write!(f, "unknown node type: {type_id}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Errors from run state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStateError {
    /// Invalid state transition.
    InvalidStateTransition { from: String, to: String },
}

impl fmt::Display for RunStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateTransition { from, to } => {
                write!(f, "invalid state transition from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for RunStateError {}
