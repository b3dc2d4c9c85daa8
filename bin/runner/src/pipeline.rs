//! The canonical content pipeline.
//!
//! ```text
//! audience ─┐
//! idea ─> draft ─┬─> media ────┐
//!                ├─> hashtags ─┤
//!                ├─> platform ─┼─> combine ─┬─> preview
//!                └─────────────┘            └─> gate ─(true)─> publish
//! ```

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use inkflow_core::{NodeId, Result};
use inkflow_workflow::{
    ConditionOperator, ConditionalConfig, ContentNodeType, EdgeCandidate, GraphStore, NodeConfig,
};
use tracing::info;

/// Node ids of a built pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    pub idea: NodeId,
    pub audience: NodeId,
    pub draft: NodeId,
    pub media: NodeId,
    pub hashtags: NodeId,
    pub platform: NodeId,
    pub combine: NodeId,
    pub preview: NodeId,
    pub gate: NodeId,
    pub publish: NodeId,
}

fn add(
    store: &mut GraphStore,
    node_type: ContentNodeType,
    config: NodeConfig,
) -> Result<NodeId, RunnerError> {
    let node = store
        .add_node(node_type.type_id(), config)
        .map_err(|e| RunnerError::Graph {
            details: e.to_string(),
        })?;
    Ok(node.id)
}

fn connect(
    store: &mut GraphStore,
    (from, from_port): (NodeId, &str),
    (to, to_port): (NodeId, &str),
) -> Result<(), RunnerError> {
    store
        .connect(EdgeCandidate::new(from, from_port, to, to_port))
        .map_err(|rejected| RunnerError::Connection {
            from: format!("{from}.{from_port}"),
            to: format!("{to}.{to_port}"),
            reason: rejected.reason(),
        })?;
    Ok(())
}

impl Pipeline {
    /// Adds and wires every pipeline node in `store`.
    ///
    /// # Errors
    ///
    /// Fails if a node config is out of range or a connection is rejected.
    pub fn build(store: &mut GraphStore, config: &RunnerConfig) -> Result<Self, RunnerError> {
        let pipeline = Self {
            idea: add(
                store,
                ContentNodeType::Idea,
                NodeConfig::Idea {
                    topic: config.topic.clone(),
                    niche: config.niche.clone(),
                },
            )?,
            audience: add(
                store,
                ContentNodeType::Audience,
                NodeConfig::Audience {
                    description: config.audience.clone(),
                },
            )?,
            draft: add(
                store,
                ContentNodeType::Draft,
                NodeConfig::Draft {
                    tone: config.tone,
                    max_words: config.max_words,
                },
            )?,
            media: add(
                store,
                ContentNodeType::Media,
                NodeConfig::Media {
                    query: None,
                    count: config.media_count,
                },
            )?,
            hashtags: add(
                store,
                ContentNodeType::Hashtags,
                NodeConfig::Hashtags {
                    max_tags: config.hashtag_limit,
                },
            )?,
            platform: add(
                store,
                ContentNodeType::Platform,
                NodeConfig::Platform {
                    platform: config.platform,
                },
            )?,
            combine: add(store, ContentNodeType::Combine, NodeConfig::Combine {})?,
            preview: add(store, ContentNodeType::Preview, NodeConfig::Preview {})?,
            gate: add(
                store,
                ContentNodeType::Conditional,
                NodeConfig::Conditional(ConditionalConfig {
                    field: Some("/word_count".to_string()),
                    operator: ConditionOperator::GreaterThan(f64::from(
                        config.require_min_words.saturating_sub(1),
                    )),
                }),
            )?,
            publish: add(
                store,
                ContentNodeType::Publish,
                NodeConfig::Publish {
                    platform: config.platform,
                    schedule_at: None,
                },
            )?,
        };

        let p = pipeline;
        for (from, to) in [
            ((p.idea, "idea"), (p.draft, "idea")),
            ((p.audience, "audience"), (p.draft, "audience")),
            ((p.draft, "draft"), (p.media, "draft")),
            ((p.draft, "draft"), (p.hashtags, "draft")),
            ((p.draft, "draft"), (p.platform, "draft")),
            ((p.draft, "draft"), (p.combine, "parts")),
            ((p.media, "media"), (p.combine, "parts")),
            ((p.hashtags, "hashtags"), (p.combine, "parts")),
            ((p.platform, "settings"), (p.combine, "parts")),
            ((p.combine, "combined"), (p.preview, "content")),
            ((p.combine, "combined"), (p.gate, "value")),
            ((p.gate, "true"), (p.publish, "approved")),
        ] {
            connect(store, from, to)?;
        }

        info!(
            nodes = store.graph().node_count(),
            edges = store.graph().edge_count(),
            "pipeline built"
        );
        Ok(pipeline)
    }
}
