//! Core domain types and utilities for the inkflow content pipeline engine.
//!
//! This crate provides the strongly-typed identifiers and the error handling
//! foundation shared by the workflow engine and the runner.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{EdgeId, NodeId, ParseIdError, WorkflowId, WorkflowRunId};
