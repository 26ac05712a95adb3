//! Error types for cinder-tool

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures that abort the whole turn. Everything recoverable becomes a
/// `ToolCallOutcome::Failed` instead.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("tool {tool} returned unsupported content type: {kind}")]
    UnsupportedContentType { tool: String, kind: String },
}

/// Errors raised by locally implemented tools
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
