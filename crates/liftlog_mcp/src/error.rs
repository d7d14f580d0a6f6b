//! Custom error types for the MCP server.

use thiserror::Error;

/// MCP server errors.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("{0}")]
    Pipeline(#[from] liftlog_core::LiftlogError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No export loaded: call load_export first")]
    NotLoaded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<McpError> for String {
    fn from(err: McpError) -> Self {
        err.to_string()
    }
}

impl From<tokio::task::JoinError> for McpError {
    fn from(err: tokio::task::JoinError) -> Self {
        McpError::Internal(format!("pipeline task failed: {err}"))
    }
}

/// Result type alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;
