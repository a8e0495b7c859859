use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckpointError>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("invalid checkpoint request: {0}")]
    Invalid(String),

    #[error("checkpoint not found: {0}")]
    NotFound(String),
}
