//! Node type registry.
//!
//! The registry maps a node type id to its definition: title, typed ports,
//! the config variant its nodes carry, and the executor that runs them. It is
//! populated once at startup and only read afterwards.

use crate::error::RegistryError;
use crate::node::{ConfigKind, NodeConfig};
use crate::port::{InputPort, OutputPort, PortValues};
use async_trait::async_trait;
use inkflow_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Trait for node execution.
///
/// Host applications implement this for each node type. Implementations
/// typically call out to AI, image search or social APIs; the engine treats
/// the call as opaque and never retries it.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Executes a node with its resolved inputs and configuration.
    ///
    /// Returns the produced values keyed by output port id. Branch ports that
    /// are left out of the result are treated as not taken.
    async fn execute(
        &self,
        inputs: PortValues,
        config: &NodeConfig,
    ) -> std::result::Result<PortValues, NodeExecutionError>;
}

/// Errors returned by node executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeExecutionError {
    /// Input validation failed.
    InvalidInput { message: String },
    /// Execution failed.
    ExecutionFailed { message: String },
    /// External service error.
    ExternalService { service: String, message: String },
    /// The executor gave up waiting.
    Timeout,
}

impl fmt::Display for NodeExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { message } => write!(f, "invalid input: {message}"),
            Self::ExecutionFailed { message } => write!(f, "execution failed: {message}"),
            Self::ExternalService { service, message } => {
                write!(f, "external service error ({service}): {message}")
            }
            Self::Timeout => write!(f, "execution timed out"),
        }
    }
}

impl std::error::Error for NodeExecutionError {}

/// Adapts an async closure into a [`NodeExecutor`].
pub struct FnExecutor<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> NodeExecutor for FnExecutor<F>
where
    F: Fn(PortValues, NodeConfig) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<PortValues, NodeExecutionError>> + Send,
{
    async fn execute(
        &self,
        inputs: PortValues,
        config: &NodeConfig,
    ) -> std::result::Result<PortValues, NodeExecutionError> {
        (self.func)(inputs, config.clone()).await
    }
}

/// Wraps an async closure as a shareable executor.
pub fn executor_fn<F, Fut>(func: F) -> Arc<dyn NodeExecutor>
where
    F: Fn(PortValues, NodeConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<PortValues, NodeExecutionError>> + Send + 'static,
{
    Arc::new(FnExecutor { func })
}

/// A registered node type.
#[derive(Clone)]
pub struct NodeTypeDefinition {
    /// Unique type id (e.g. `"draft"`).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Input ports.
    pub inputs: Vec<InputPort>,
    /// Output ports. Terminal types may have none.
    pub outputs: Vec<OutputPort>,
    /// The config variant nodes of this type carry.
    pub config_kind: ConfigKind,
    executor: Arc<dyn NodeExecutor>,
}

impl NodeTypeDefinition {
    /// Creates a definition without ports.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        config_kind: ConfigKind,
        executor: Arc<dyn NodeExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config_kind,
            executor,
        }
    }

    /// Adds an input port.
    #[must_use]
    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    /// Adds an output port.
    #[must_use]
    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    /// Returns the input port with the given id, if any.
    #[must_use]
    pub fn input_port(&self, id: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Returns the output port with the given id, if any.
    #[must_use]
    pub fn output_port(&self, id: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// True when no input is required, so nodes of this type can start a run.
    #[must_use]
    pub fn is_source(&self) -> bool {
        !self.inputs.iter().any(|p| p.required)
    }

    /// The executor for nodes of this type.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn NodeExecutor> {
        &self.executor
    }

    fn duplicate_port(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.inputs
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.outputs.iter().map(|p| p.id.as_str()))
            .find(|id| !seen.insert(*id))
    }
}

impl fmt::Debug for NodeTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("config_kind", &self.config_kind)
            .finish_non_exhaustive()
    }
}

/// Catalog of node types, keyed by type id.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, NodeTypeDefinition>,
    order: Vec<String>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node type.
    ///
    /// # Errors
    ///
    /// Fails if the type id is taken or the definition repeats a port id.
    pub fn register(&mut self, definition: NodeTypeDefinition) -> Result<(), RegistryError> {
        if self.entries.contains_key(&definition.id) {
            return Err(RegistryError::DuplicateType {
                type_id: definition.id,
            }
            .into());
        }
        if let Some(port_id) = definition.duplicate_port() {
            return Err(RegistryError::DuplicatePort {
                type_id: definition.id.clone(),
                port_id: port_id.to_string(),
            }
            .into());
        }

        debug!(type_id = %definition.id, "registered node type");
        self.order.push(definition.id.clone());
        self.entries.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Returns the definition for a type id.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::NotFound`] for unknown ids.
    pub fn get(&self, type_id: &str) -> Result<&NodeTypeDefinition, RegistryError> {
        self.entries.get(type_id).ok_or_else(|| {
            RegistryError::NotFound {
                type_id: type_id.to_string(),
            }
            .into()
        })
    }

    /// Returns the definition for a type id, if registered.
    #[must_use]
    pub fn lookup(&self, type_id: &str) -> Option<&NodeTypeDefinition> {
        self.entries.get(type_id)
    }

    /// All definitions in registration order.
    pub fn list(&self) -> impl Iterator<Item = &NodeTypeDefinition> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
