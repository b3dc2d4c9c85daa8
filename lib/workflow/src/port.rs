//! Port system for workflow nodes.
//!
//! Ports are named connection points on node types. Each input port lists
//! the data kinds it accepts; each output port declares the single kind it
//! produces. A connection is valid when the produced kind is accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Values flowing through a node's ports, keyed by port id.
pub type PortValues = BTreeMap<String, JsonValue>;

/// The semantic type of a value flowing across an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Idea,
    Draft,
    Media,
    PlatformSettings,
    Audience,
    HashtagSet,
    CombinedContent,
    Preview,
    Boolean,
    StructuredText,
    /// Matches every other kind.
    Any,
}

impl DataKind {
    /// Returns the snake_case name used in serialized graphs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Draft => "draft",
            Self::Media => "media",
            Self::PlatformSettings => "platform_settings",
            Self::Audience => "audience",
            Self::HashtagSet => "hashtag_set",
            Self::CombinedContent => "combined_content",
            Self::Preview => "preview",
            Self::Boolean => "boolean",
            Self::StructuredText => "structured_text",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input port on a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    /// The id of this port, unique within its node type.
    pub id: String,
    /// The data kinds this port accepts.
    pub accepts: Vec<DataKind>,
    /// Whether a value must be resolved before the node may execute.
    pub required: bool,
    /// Whether more than one incoming edge may feed this port.
    #[serde(default)]
    pub multiple: bool,
}

impl InputPort {
    /// Creates a new required, single-input port.
    #[must_use]
    pub fn required(id: impl Into<String>, accepts: impl IntoIterator<Item = DataKind>) -> Self {
        Self {
            id: id.into(),
            accepts: accepts.into_iter().collect(),
            required: true,
            multiple: false,
        }
    }

    /// Creates a new optional, single-input port.
    #[must_use]
    pub fn optional(id: impl Into<String>, accepts: impl IntoIterator<Item = DataKind>) -> Self {
        Self {
            id: id.into(),
            accepts: accepts.into_iter().collect(),
            required: false,
            multiple: false,
        }
    }

    /// Allows several incoming edges on this port.
    ///
    /// Values from all activated edges are collected into a JSON array in
    /// edge creation order.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Returns true if a value of `kind` may flow into this port.
    #[must_use]
    pub fn accepts_kind(&self, kind: DataKind) -> bool {
        kind == DataKind::Any || self.accepts.iter().any(|k| *k == kind || *k == DataKind::Any)
    }
}

/// An output port on a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    /// The id of this port, unique within its node type.
    pub id: String,
    /// The data kind produced on this port.
    pub kind: DataKind,
    /// Branch ports are only activated when the executor populates them.
    #[serde(default)]
    pub branch: bool,
}

impl OutputPort {
    /// Creates a new output port.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: DataKind) -> Self {
        Self {
            id: id.into(),
            kind,
            branch: false,
        }
    }

    /// Creates a branch output port (e.g. the `true`/`false` outputs of a conditional).
    #[must_use]
    pub fn branch(id: impl Into<String>, kind: DataKind) -> Self {
        Self {
            id: id.into(),
            kind,
            branch: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_accepts_listed_kind() {
        let port = InputPort::required("idea", [DataKind::Idea]);
        assert!(port.accepts_kind(DataKind::Idea));
        assert!(!port.accepts_kind(DataKind::Draft));
    }

    #[test]
    fn any_port_accepts_everything() {
        let port = InputPort::required("value", [DataKind::Any]);
        assert!(port.accepts_kind(DataKind::Media));
        assert!(port.accepts_kind(DataKind::Boolean));
    }

    #[test]
    fn any_output_fits_typed_port() {
        let port = InputPort::required("media", [DataKind::Media]);
        assert!(port.accepts_kind(DataKind::Any));
    }

    #[test]
    fn whitelisted_kinds_are_accepted() {
        let port = InputPort::required("source", [DataKind::Draft, DataKind::Idea]);
        assert!(port.accepts_kind(DataKind::Idea));
        assert!(port.accepts_kind(DataKind::Draft));
        assert!(!port.accepts_kind(DataKind::Media));
    }

    #[test]
    fn input_port_flags() {
        let port = InputPort::optional("audience", [DataKind::Audience]);
        assert!(!port.required);
        assert!(!port.multiple);

        let parts = InputPort::required("parts", [DataKind::Draft]).multiple();
        assert!(parts.required);
        assert!(parts.multiple);
    }

    #[test]
    fn branch_output_port() {
        let port = OutputPort::branch("true", DataKind::Boolean);
        assert!(port.branch);
        assert!(!OutputPort::new("draft", DataKind::Draft).branch);
    }

    #[test]
    fn data_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DataKind::PlatformSettings).expect("serialize");
        assert_eq!(json, "\"platform_settings\"");
        assert_eq!(DataKind::HashtagSet.to_string(), "hashtag_set");
    }
}
