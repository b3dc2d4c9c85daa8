//! inkflow content pipeline runner.
//!
//! Wires the workflow engine to deterministic template executors so the
//! whole idea-to-publish pipeline can be exercised without external services.

pub mod config;
pub mod error;
pub mod executors;
pub mod pipeline;
