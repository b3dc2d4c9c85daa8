//! Built-in content pipeline node types.
//!
//! The catalog fixes the ports and config variant of each content node type.
//! Executors for types that reach out to AI, image search or social APIs are
//! supplied by the host; the conditional executor is pure logic and ships
//! here.

use crate::error::RegistryError;
use crate::node::{ConditionOperator, ConditionalConfig, ConfigKind, NodeConfig};
use crate::port::{DataKind, InputPort, OutputPort, PortValues};
use crate::registry::{NodeExecutionError, NodeExecutor, NodeRegistry, NodeTypeDefinition};
use async_trait::async_trait;
use inkflow_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// The content node types known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentNodeType {
    Idea,
    Draft,
    Media,
    Audience,
    Platform,
    Hashtags,
    Combine,
    Preview,
    Conditional,
    Publish,
}

impl ContentNodeType {
    /// Every catalog type, in registration order.
    pub const ALL: [Self; 10] = [
        Self::Idea,
        Self::Draft,
        Self::Media,
        Self::Audience,
        Self::Platform,
        Self::Hashtags,
        Self::Combine,
        Self::Preview,
        Self::Conditional,
        Self::Publish,
    ];

    /// Registry id of this type.
    #[must_use]
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Draft => "draft",
            Self::Media => "media",
            Self::Audience => "audience",
            Self::Platform => "platform",
            Self::Hashtags => "hashtags",
            Self::Combine => "combine",
            Self::Preview => "preview",
            Self::Conditional => "conditional",
            Self::Publish => "publish",
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Idea => "Idea Generator",
            Self::Draft => "Draft Writer",
            Self::Media => "Media Search",
            Self::Audience => "Target Audience",
            Self::Platform => "Platform Formatter",
            Self::Hashtags => "Hashtag Generator",
            Self::Combine => "Combine Content",
            Self::Preview => "Preview",
            Self::Conditional => "Condition",
            Self::Publish => "Publish",
        }
    }

    /// The config variant nodes of this type carry.
    #[must_use]
    pub fn config_kind(&self) -> ConfigKind {
        match self {
            Self::Idea => ConfigKind::Idea,
            Self::Draft => ConfigKind::Draft,
            Self::Media => ConfigKind::Media,
            Self::Audience => ConfigKind::Audience,
            Self::Platform => ConfigKind::Platform,
            Self::Hashtags => ConfigKind::Hashtags,
            Self::Combine => ConfigKind::Combine,
            Self::Preview => ConfigKind::Preview,
            Self::Conditional => ConfigKind::Conditional,
            Self::Publish => ConfigKind::Publish,
        }
    }

    /// Builds the definition of this type around `executor`.
    #[must_use]
    pub fn definition(&self, executor: Arc<dyn NodeExecutor>) -> NodeTypeDefinition {
        let definition =
            NodeTypeDefinition::new(self.type_id(), self.title(), self.config_kind(), executor);
        match self {
            Self::Idea => definition.with_output(OutputPort::new("idea", DataKind::Idea)),
            Self::Draft => definition
                .with_input(InputPort::required("idea", [DataKind::Idea]))
                .with_input(InputPort::optional("audience", [DataKind::Audience]))
                .with_output(OutputPort::new("draft", DataKind::Draft)),
            Self::Media => definition
                .with_input(InputPort::required("draft", [DataKind::Draft, DataKind::Idea]))
                .with_output(OutputPort::new("media", DataKind::Media)),
            Self::Audience => {
                definition.with_output(OutputPort::new("audience", DataKind::Audience))
            }
            Self::Platform => definition
                .with_input(InputPort::required("draft", [DataKind::Draft]))
                .with_output(OutputPort::new("settings", DataKind::PlatformSettings)),
            Self::Hashtags => definition
                .with_input(InputPort::required("draft", [DataKind::Draft, DataKind::Idea]))
                .with_output(OutputPort::new("hashtags", DataKind::HashtagSet)),
            Self::Combine => definition
                .with_input(
                    InputPort::required(
                        "parts",
                        [
                            DataKind::Draft,
                            DataKind::Media,
                            DataKind::HashtagSet,
                            DataKind::PlatformSettings,
                        ],
                    )
                    .multiple(),
                )
                .with_output(OutputPort::new("combined", DataKind::CombinedContent)),
            Self::Preview => definition
                .with_input(InputPort::required("content", [DataKind::CombinedContent]))
                .with_output(OutputPort::new("preview", DataKind::Preview)),
            Self::Conditional => definition
                .with_input(InputPort::required("value", [DataKind::Any]))
                .with_output(OutputPort::branch("true", DataKind::Boolean))
                .with_output(OutputPort::branch("false", DataKind::Boolean)),
            Self::Publish => definition
                .with_input(InputPort::required("approved", [DataKind::Boolean]))
                .with_input(InputPort::optional(
                    "content",
                    [DataKind::CombinedContent, DataKind::Preview],
                )),
        }
    }
}

impl fmt::Display for ContentNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_id())
    }
}

/// Registers every catalog type.
///
/// `executor_for` supplies the host executor for each type except
/// [`ContentNodeType::Conditional`], which always uses
/// [`ConditionalExecutor`].
///
/// # Errors
///
/// Fails if one of the catalog ids is already registered.
pub fn register_content_types<F>(
    registry: &mut NodeRegistry,
    mut executor_for: F,
) -> Result<(), RegistryError>
where
    F: FnMut(ContentNodeType) -> Arc<dyn NodeExecutor>,
{
    for node_type in ContentNodeType::ALL {
        let executor = match node_type {
            ContentNodeType::Conditional => Arc::new(ConditionalExecutor) as Arc<dyn NodeExecutor>,
            other => executor_for(other),
        };
        registry.register(node_type.definition(executor))?;
    }
    Ok(())
}

/// Routes its input to the `true` or `false` port.
///
/// Only the taken port is populated, and it carries the input value through
/// unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalExecutor;

impl ConditionalExecutor {
    /// Evaluates `config` against `value`.
    #[must_use]
    pub fn evaluate(config: &ConditionalConfig, value: &JsonValue) -> bool {
        let selected = match config.field.as_deref() {
            Some(pointer) if !pointer.is_empty() => value.pointer(pointer),
            _ => Some(value),
        };
        let Some(selected) = selected else {
            return false;
        };

        match &config.operator {
            ConditionOperator::Exists => match selected {
                JsonValue::Null | JsonValue::Bool(false) => false,
                JsonValue::String(s) => !s.is_empty(),
                JsonValue::Array(items) => !items.is_empty(),
                JsonValue::Object(fields) => !fields.is_empty(),
                _ => true,
            },
            ConditionOperator::Equals(expected) => selected == expected,
            ConditionOperator::Contains(needle) => match selected {
                JsonValue::String(s) => s.contains(needle.as_str()),
                JsonValue::Array(items) => items.iter().any(|item| item.as_str() == Some(needle.as_str())),
                _ => false,
            },
            ConditionOperator::GreaterThan(bound) => {
                selected.as_f64().is_some_and(|n| n > *bound)
            }
            ConditionOperator::LessThan(bound) => selected.as_f64().is_some_and(|n| n < *bound),
            ConditionOperator::MinLength(min) => {
                let len = match selected {
                    JsonValue::String(s) => s.chars().count(),
                    JsonValue::Array(items) => items.len(),
                    JsonValue::Object(fields) => fields.len(),
                    _ => return false,
                };
                len >= *min
            }
        }
    }
}

#[async_trait]
impl NodeExecutor for ConditionalExecutor {
    async fn execute(
        &self,
        mut inputs: PortValues,
        config: &NodeConfig,
    ) -> std::result::Result<PortValues, NodeExecutionError> {
        let NodeConfig::Conditional(condition) = config else {
            return Err(NodeExecutionError::InvalidInput {
                message: format!("conditional node got {} config", config.kind()),
            });
        };
        let value = inputs
            .remove("value")
            .ok_or_else(|| NodeExecutionError::InvalidInput {
                message: "no value to test".to_string(),
            })?;

        let port = if Self::evaluate(condition, &value) {
            "true"
        } else {
            "false"
        };
        let mut outputs = PortValues::new();
        outputs.insert(port.to_string(), value);
        Ok(outputs)
    }
}
