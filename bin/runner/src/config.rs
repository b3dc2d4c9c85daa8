//! Runner configuration.
//!
//! Loaded via the `config` crate from an optional file named by
//! `INKFLOW_CONFIG`, overridden by `INKFLOW_*` environment variables.

use inkflow_workflow::{Platform, Tone};
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an optional config file.
pub const CONFIG_PATH_VAR: &str = "INKFLOW_CONFIG";

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunnerConfig {
    /// Seed topic for the idea node.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Optional niche to narrow the idea.
    #[serde(default)]
    pub niche: Option<String>,

    /// Who the post is written for.
    #[serde(default = "default_audience")]
    pub audience: String,

    #[serde(default = "default_platform")]
    pub platform: Platform,

    #[serde(default)]
    pub tone: Tone,

    /// Upper bound on draft length.
    #[serde(default = "default_max_words")]
    pub max_words: u32,

    #[serde(default = "default_media_count")]
    pub media_count: u32,

    #[serde(default = "default_hashtag_limit")]
    pub hashtag_limit: u32,

    /// Drafts shorter than this are not published.
    #[serde(default = "default_require_min_words")]
    pub require_min_words: u32,
}

fn default_topic() -> String {
    "shipping content pipelines".to_string()
}

fn default_audience() -> String {
    "developers who write about their work".to_string()
}

fn default_platform() -> Platform {
    Platform::Linkedin
}

fn default_max_words() -> u32 {
    120
}

fn default_media_count() -> u32 {
    2
}

fn default_hashtag_limit() -> u32 {
    5
}

fn default_require_min_words() -> u32 {
    20
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            niche: None,
            audience: default_audience(),
            platform: default_platform(),
            tone: Tone::default(),
            max_words: default_max_words(),
            media_count: default_media_count(),
            hashtag_limit: default_hashtag_limit(),
            require_min_words: default_require_min_words(),
        }
    }
}

impl RunnerConfig {
    /// Loads configuration from `INKFLOW_CONFIG` (if set) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or a value fails to parse.
    pub fn load() -> Result<Self, config::ConfigError> {
        let file = std::env::var_os(CONFIG_PATH_VAR);
        Self::from_sources(file.as_deref().map(Path::new))
    }

    /// Loads configuration from an optional file layered under the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or a value fails to parse.
    pub fn from_sources(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("INKFLOW")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
