//! Error types for the LLM call facade.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors a [`crate::facade::LlmClient`] call can raise.
///
/// `Connection` is the classifier the adaptive throttle watches: a run of
/// consecutive connection-like failures shrinks concurrency, a run of
/// successes grows it back.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("connection to upstream LLM API failed: {0}")]
    Connection(String),

    #[error("upstream LLM API returned an error (correlation_id={correlation_id:?}): {message}")]
    Upstream {
        message: String,
        correlation_id: Option<String>,
    },

    #[error("LLM call timed out")]
    Timeout,

    #[error("LLM call was cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether this failure should count against the adaptive throttle's
    /// connection-failure streak.
    pub fn is_connection_like(&self) -> bool {
        matches!(self, LlmError::Connection(_) | LlmError::Timeout)
    }
}
