//! Database error type, grounded in the teacher's `orchestrator::db::error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("query failed: {0}")]
    Query(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound("no matching row".to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Query(format!("serialization failed: {err}"))
    }
}
