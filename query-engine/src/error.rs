//! Engine-level errors.
//!
//! Adapters let driver errors escape as [`EngineError`]; only the dispatcher
//! turns them into the caller-facing taxonomy.

use std::time::Duration;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out after {}s", .0.as_secs())]
    ConnectTimeout(Duration),

    #[error("{0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    NotSupported(String),
}

impl EngineError {
    pub fn connection_failed(err: impl std::fmt::Display) -> Self {
        EngineError::ConnectionFailed(err.to_string())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        EngineError::InvalidQuery(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        EngineError::NotSupported(msg.into())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Execution(err.to_string())
    }
}

impl From<mongodb::error::Error> for EngineError {
    fn from(err: mongodb::error::Error) -> Self {
        EngineError::Execution(err.to_string())
    }
}

impl From<oracle::Error> for EngineError {
    fn from(err: oracle::Error) -> Self {
        EngineError::Execution(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidQuery(format!("Invalid JSON: {}", err))
    }
}
