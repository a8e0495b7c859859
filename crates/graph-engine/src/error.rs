//! Error types for graph construction and execution.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or running a [`crate::graph::StateGraph`].
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("graph contains a cycle reachable from {0}")]
    Cycle(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("node execution failed: {0}")]
    Execution(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl GraphError {
    /// Whether this error originated from a node body failing rather than a
    /// structural/config problem with the graph itself.
    pub fn is_execution(&self) -> bool {
        matches!(self, GraphError::Execution(_))
    }
}
