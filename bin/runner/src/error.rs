//! Domain error types for the runner.

use std::fmt;

/// Errors that stop the runner before or after a run.
///
/// Node failures inside a run are not errors here; they are reported in the
/// run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// Node types could not be registered.
    Registry { details: String },
    /// A pipeline node could not be added.
    Graph { details: String },
    /// A pipeline connection was rejected.
    Connection { from: String, to: String, reason: String },
    /// The summary could not be rendered.
    Output { details: String },
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Registry { details } => write!(f, "node registry error: {details}"),
            Self::Graph { details } => write!(f, "pipeline graph error: {details}"),
            Self::Connection { from, to, reason } => {
                write!(f, "cannot connect {from} to {to}: {reason}")
            }
            Self::Output { details } => write!(f, "output error: {details}"),
        }
    }
}

impl std::error::Error for RunnerError {}
