//! Workflow node instances and their typed configurations.
//!
//! Every node references a registered node type and carries a config record
//! whose variant is fixed by that type. Configs are validated when the node
//! is added and again after every patch.

use crate::port::PortValues;
use chrono::{DateTime, Utc};
use inkflow_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Tone of generated copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Casual,
    #[default]
    Professional,
    Playful,
    Informative,
}

/// Target social or publishing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
    Facebook,
    Blog,
}

impl Platform {
    /// Maximum post length on this platform, if it has one.
    #[must_use]
    pub fn character_limit(&self) -> Option<usize> {
        match self {
            Self::Twitter => Some(280),
            Self::Linkedin => Some(3000),
            Self::Instagram => Some(2200),
            Self::Facebook => Some(63_206),
            Self::Blog => None,
        }
    }
}

/// Comparison applied by a conditional node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "operand", rename_all = "snake_case")]
pub enum ConditionOperator {
    /// The selected value is present and not null/false/empty.
    Exists,
    Equals(JsonValue),
    /// String contains text, or array contains the string.
    Contains(String),
    GreaterThan(f64),
    LessThan(f64),
    /// String length or array length is at least this many.
    MinLength(usize),
}

/// Configuration for conditional nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfig {
    /// JSON pointer into the input value (e.g. `/text`). `None` tests the whole value.
    #[serde(default)]
    pub field: Option<String>,
    /// The comparison to apply.
    pub operator: ConditionOperator,
}

fn default_max_words() -> u32 {
    280
}

fn default_media_count() -> u32 {
    1
}

fn default_max_tags() -> u32 {
    5
}

/// Configuration for a node, one variant per node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Idea generator seeded with a topic.
    Idea {
        topic: String,
        #[serde(default)]
        niche: Option<String>,
    },
    /// Draft writer.
    Draft {
        #[serde(default)]
        tone: Tone,
        #[serde(default = "default_max_words")]
        max_words: u32,
    },
    /// Image/media search.
    Media {
        #[serde(default)]
        query: Option<String>,
        #[serde(default = "default_media_count")]
        count: u32,
    },
    /// Target audience description.
    Audience { description: String },
    /// Platform formatting settings.
    Platform { platform: Platform },
    /// Hashtag generator.
    Hashtags {
        #[serde(default = "default_max_tags")]
        max_tags: u32,
    },
    /// Combines drafts, media and settings into one post.
    Combine {},
    /// Renders a preview of combined content.
    Preview {},
    /// Boolean branch.
    Conditional(ConditionalConfig),
    /// Publishes to a platform.
    Publish {
        platform: Platform,
        #[serde(default)]
        schedule_at: Option<DateTime<Utc>>,
    },
    /// Free-form settings for host-registered node types.
    Custom {
        #[serde(default)]
        settings: Map<String, JsonValue>,
    },
}

/// The variant tag of a [`NodeConfig`], used by node type definitions to
/// declare which config they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
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
    Custom,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
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
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl NodeConfig {
    /// Returns the variant tag of this configuration.
    #[must_use]
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Idea { .. } => ConfigKind::Idea,
            Self::Draft { .. } => ConfigKind::Draft,
            Self::Media { .. } => ConfigKind::Media,
            Self::Audience { .. } => ConfigKind::Audience,
            Self::Platform { .. } => ConfigKind::Platform,
            Self::Hashtags { .. } => ConfigKind::Hashtags,
            Self::Combine {} => ConfigKind::Combine,
            Self::Preview {} => ConfigKind::Preview,
            Self::Conditional(_) => ConfigKind::Conditional,
            Self::Publish { .. } => ConfigKind::Publish,
            Self::Custom { .. } => ConfigKind::Custom,
        }
    }

    /// Empty settings for a host-registered node type.
    #[must_use]
    pub fn custom() -> Self {
        Self::Custom {
            settings: Map::new(),
        }
    }

    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when a field is out of range.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Draft { max_words, .. } if !(1..=5000).contains(max_words) => {
                Err(format!("max_words must be between 1 and 5000, got {max_words}"))
            }
            Self::Media { count, .. } if !(1..=10).contains(count) => {
                Err(format!("media count must be between 1 and 10, got {count}"))
            }
            Self::Hashtags { max_tags } if !(1..=30).contains(max_tags) => {
                Err(format!("max_tags must be between 1 and 30, got {max_tags}"))
            }
            Self::Conditional(ConditionalConfig {
                field: Some(field), ..
            }) if !field.is_empty() && !field.starts_with('/') => {
                Err(format!("condition field must be a JSON pointer, got '{field}'"))
            }
            _ => Ok(()),
        }
    }

    /// Shallow-merges `patch` into this configuration.
    ///
    /// Top-level keys in `patch` replace the matching fields. For
    /// [`NodeConfig::Custom`] the patch is merged into `settings`. The patch
    /// may not change the variant, and every key must name a field.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the merged config is invalid.
    pub fn merged(&self, patch: &Map<String, JsonValue>) -> Result<Self, String> {
        if let Self::Custom { settings } = self {
            let mut settings = settings.clone();
            settings.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
            return Ok(Self::Custom { settings });
        }

        let JsonValue::Object(mut fields) = serde_json::to_value(self).map_err(|e| e.to_string())?
        else {
            return Err("config did not serialize to an object".to_string());
        };
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }

        let merged: Self =
            serde_json::from_value(JsonValue::Object(fields)).map_err(|e| e.to_string())?;
        if merged.kind() != self.kind() {
            return Err(format!(
                "patch cannot change config type from {} to {}",
                self.kind(),
                merged.kind()
            ));
        }

        let JsonValue::Object(known) = serde_json::to_value(&merged).map_err(|e| e.to_string())?
        else {
            return Err("config did not serialize to an object".to_string());
        };
        if let Some(unknown) = patch.keys().find(|key| !known.contains_key(*key)) {
            return Err(format!("unknown config field '{unknown}'"));
        }

        merged.validate()?;
        Ok(merged)
    }
}

/// A node instance in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// The id of the registered node type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Type-specific configuration.
    pub config: NodeConfig,
    /// Outputs of the most recent successful execution.
    #[serde(default)]
    pub last_outputs: Option<PortValues>,
}

impl Node {
    /// Creates a new node with a fresh ID.
    #[must_use]
    pub fn new(node_type: impl Into<String>, config: NodeConfig) -> Self {
        Self::with_id(NodeId::new(), node_type, config)
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(id: NodeId, node_type: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            config,
            last_outputs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn config_kind_matches_variant() {
        let config = NodeConfig::Platform {
            platform: Platform::Twitter,
        };
        assert_eq!(config.kind(), ConfigKind::Platform);
        assert_eq!(NodeConfig::custom().kind(), ConfigKind::Custom);
    }

    #[test]
    fn config_serializes_with_type_tag() {
        let config = NodeConfig::Idea {
            topic: "rust".to_string(),
            niche: None,
        };
        let json = serde_json::to_value(&config).expect("serialize");
        assert_eq!(json["type"], "idea");
        assert_eq!(json["topic"], "rust");
    }

    #[test]
    fn draft_defaults_apply_on_deserialize() {
        let config: NodeConfig = serde_json::from_value(json!({"type": "draft"})).expect("deserialize");
        assert_eq!(
            config,
            NodeConfig::Draft {
                tone: Tone::Professional,
                max_words: 280
            }
        );
    }

    #[test]
    fn merge_replaces_top_level_fields() {
        let config = NodeConfig::Idea {
            topic: "rust".to_string(),
            niche: None,
        };
        let merged = config
            .merged(&patch(json!({"niche": "embedded"})))
            .expect("merge");
        assert_eq!(
            merged,
            NodeConfig::Idea {
                topic: "rust".to_string(),
                niche: Some("embedded".to_string())
            }
        );
    }

    #[test]
    fn merge_rejects_type_change() {
        let config = NodeConfig::Hashtags { max_tags: 5 };
        let err = config
            .merged(&patch(json!({"type": "media", "count": 2})))
            .unwrap_err();
        assert!(err.contains("cannot change config type"));
    }

    #[test]
    fn merge_rejects_unknown_field() {
        let config = NodeConfig::Hashtags { max_tags: 5 };
        let err = config.merged(&patch(json!({"colour": "red"}))).unwrap_err();
        assert!(err.contains("unknown config field 'colour'"));
    }

    #[test]
    fn merge_revalidates_ranges() {
        let config = NodeConfig::Hashtags { max_tags: 5 };
        let err = config.merged(&patch(json!({"max_tags": 99}))).unwrap_err();
        assert!(err.contains("max_tags"));
    }

    #[test]
    fn merge_into_custom_settings() {
        let config = NodeConfig::custom();
        let merged = config
            .merged(&patch(json!({"webhook": "https://example.com"})))
            .expect("merge");
        match merged {
            NodeConfig::Custom { settings } => {
                assert_eq!(settings["webhook"], "https://example.com");
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn conditional_field_must_be_pointer() {
        let config = NodeConfig::Conditional(ConditionalConfig {
            field: Some("text".to_string()),
            operator: ConditionOperator::Exists,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn conditional_roundtrip() {
        let config = NodeConfig::Conditional(ConditionalConfig {
            field: Some("/words".to_string()),
            operator: ConditionOperator::GreaterThan(10.0),
        });
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: NodeConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, parsed);
    }

    #[test]
    fn platform_limits() {
        assert_eq!(Platform::Twitter.character_limit(), Some(280));
        assert_eq!(Platform::Blog.character_limit(), None);
    }

    #[test]
    fn new_node_has_no_cached_outputs() {
        let node = Node::new("combine", NodeConfig::Combine {});
        assert_eq!(node.node_type, "combine");
        assert!(node.last_outputs.is_none());
    }
}
