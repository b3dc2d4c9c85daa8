//! Deterministic template executors for the content catalog.
//!
//! These stand in for the AI, image search and social publishing services a
//! production host would call. Output depends only on inputs and config, so
//! runs are reproducible.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inkflow_workflow::{NodeConfig, NodeExecutionError, NodeExecutor, Platform, PortValues, Tone};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;
use tracing::debug;

/// A post handed to the publish step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedPost {
    pub platform: Platform,
    pub text: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Executes every catalog node type from templates.
#[derive(Debug, Default)]
pub struct TemplateExecutor {
    outbox: Mutex<Vec<PublishedPost>>,
}

impl TemplateExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts published so far, oldest first.
    pub async fn published(&self) -> Vec<PublishedPost> {
        self.outbox.lock().await.clone()
    }
}

fn input<'a>(inputs: &'a PortValues, port: &str) -> Result<&'a JsonValue, NodeExecutionError> {
    inputs.get(port).ok_or_else(|| NodeExecutionError::InvalidInput {
        message: format!("no value on port '{port}'"),
    })
}

fn text_of(value: &JsonValue) -> &str {
    value
        .get("text")
        .or_else(|| value.get("headline"))
        .and_then(JsonValue::as_str)
        .or_else(|| value.as_str())
        .unwrap_or_default()
}

fn single(port: &str, value: JsonValue) -> PortValues {
    let mut outputs = PortValues::new();
    outputs.insert(port.to_string(), value);
    outputs
}

fn opener(tone: Tone) -> &'static str {
    match tone {
        Tone::Casual => "Quick thought:",
        Tone::Professional => "Insight:",
        Tone::Playful => "Fun fact:",
        Tone::Informative => "Did you know?",
    }
}

fn idea(topic: &str, niche: Option<&str>) -> JsonValue {
    let headline = match niche {
        Some(niche) => format!("Why {topic} matters for {niche}"),
        None => format!("Why {topic} matters"),
    };
    json!({ "topic": topic, "niche": niche, "headline": headline })
}

fn draft(idea: &JsonValue, audience: Option<&JsonValue>, tone: Tone, max_words: u32) -> JsonValue {
    let topic = idea.get("topic").and_then(JsonValue::as_str).unwrap_or("this");
    let reader = audience
        .and_then(|a| a.get("description"))
        .and_then(JsonValue::as_str)
        .unwrap_or("anyone shipping software");
    let full = [
        format!("{} {}.", opener(tone), text_of(idea)),
        format!("This one is for {reader}."),
        format!("Teams that treat {topic} as a habit ship steadier work."),
        "Start small, measure what changes, and keep the loop short.".to_string(),
        "Write down what worked and share what did not.".to_string(),
        format!("Next week, pick one part of {topic} and make it boring."),
    ]
    .join(" ");

    let limit = usize::try_from(max_words).unwrap_or(usize::MAX);
    let words: Vec<&str> = full.split_whitespace().take(limit).collect();
    json!({
        "text": words.join(" "),
        "word_count": words.len(),
        "tone": tone,
    })
}

fn media(draft: &JsonValue, query: Option<&str>, count: u32) -> JsonValue {
    let query = query.map_or_else(
        || {
            text_of(draft)
                .split_whitespace()
                .skip(1)
                .take(4)
                .collect::<Vec<_>>()
                .join(" ")
        },
        str::to_string,
    );
    let slug: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let images: Vec<String> = (1..=count)
        .map(|i| format!("https://images.example.com/{slug}/{i}.jpg"))
        .collect();
    json!({ "query": query, "images": images })
}

fn hashtags(draft: &JsonValue, max_tags: u32) -> JsonValue {
    let mut tags: Vec<String> = Vec::new();
    for word in text_of(draft).split_whitespace() {
        let word: String = word
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        if word.len() < 5 {
            continue;
        }
        let tag = format!("#{word}");
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.truncate(usize::try_from(max_tags).unwrap_or(usize::MAX));
    json!({ "tags": tags })
}

fn platform_settings(draft: &JsonValue, platform: Platform) -> JsonValue {
    let length = text_of(draft).chars().count();
    json!({
        "platform": platform,
        "character_limit": platform.character_limit(),
        "fits": platform.character_limit().is_none_or(|limit| length <= limit),
    })
}

fn combine(parts: &JsonValue) -> JsonValue {
    let mut combined = json!({
        "text": "",
        "word_count": 0,
        "images": [],
        "hashtags": [],
        "platform": null,
    });
    for part in parts.as_array().into_iter().flatten() {
        if let Some(text) = part.get("text") {
            combined["text"] = text.clone();
            combined["word_count"] = part.get("word_count").cloned().unwrap_or(json!(0));
        } else if let Some(images) = part.get("images") {
            combined["images"] = images.clone();
        } else if let Some(tags) = part.get("tags") {
            combined["hashtags"] = tags.clone();
        } else if let Some(platform) = part.get("platform") {
            combined["platform"] = platform.clone();
        }
    }
    combined
}

fn render(content: &JsonValue) -> String {
    let tags: Vec<&str> = content
        .get("hashtags")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(JsonValue::as_str)
        .collect();
    if tags.is_empty() {
        text_of(content).to_string()
    } else {
        format!("{}\n\n{}", text_of(content), tags.join(" "))
    }
}

#[async_trait]
impl NodeExecutor for TemplateExecutor {
    async fn execute(
        &self,
        inputs: PortValues,
        config: &NodeConfig,
    ) -> Result<PortValues, NodeExecutionError> {
        debug!(kind = %config.kind(), "template executor");
        let outputs = match config {
            NodeConfig::Idea { topic, niche } => single("idea", idea(topic, niche.as_deref())),
            NodeConfig::Draft { tone, max_words } => single(
                "draft",
                draft(
                    input(&inputs, "idea")?,
                    inputs.get("audience"),
                    *tone,
                    *max_words,
                ),
            ),
            NodeConfig::Media { query, count } => single(
                "media",
                media(input(&inputs, "draft")?, query.as_deref(), *count),
            ),
            NodeConfig::Audience { description } => {
                single("audience", json!({ "description": description }))
            }
            NodeConfig::Platform { platform } => single(
                "settings",
                platform_settings(input(&inputs, "draft")?, *platform),
            ),
            NodeConfig::Hashtags { max_tags } => {
                single("hashtags", hashtags(input(&inputs, "draft")?, *max_tags))
            }
            NodeConfig::Combine {} => single("combined", combine(input(&inputs, "parts")?)),
            NodeConfig::Preview {} => {
                let content = input(&inputs, "content")?;
                single("preview", json!({ "rendered": render(content) }))
            }
            NodeConfig::Publish {
                platform,
                schedule_at,
            } => {
                let content = match inputs.get("content") {
                    Some(content) => content,
                    None => input(&inputs, "approved")?,
                };
                let post = PublishedPost {
                    platform: *platform,
                    text: render(content),
                    scheduled_at: *schedule_at,
                };
                if let Some(limit) = platform.character_limit()
                    && post.text.chars().count() > limit
                {
                    return Err(NodeExecutionError::ExternalService {
                        service: "publisher".to_string(),
                        message: format!("post exceeds the {limit} character limit"),
                    });
                }
                self.outbox.lock().await.push(post);
                PortValues::new()
            }
            NodeConfig::Conditional(_) | NodeConfig::Custom { .. } => {
                return Err(NodeExecutionError::InvalidInput {
                    message: format!("no template for {} nodes", config.kind()),
                });
            }
        };
        Ok(outputs)
    }
}
