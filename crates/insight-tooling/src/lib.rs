//! Shared ambient concerns: error context, configuration loading, logging.

pub mod config;
pub mod error;
pub mod logging;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("{0}")]
    General(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ToolingError>;
