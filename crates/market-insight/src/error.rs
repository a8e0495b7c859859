//! Top-level error type for the orchestrator.

use graph_engine::GraphError;
use llm_client::LlmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Non-fatal: logged, never propagated to the caller.
    #[error("guardrail: {0}")]
    Guardrail(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),
}
