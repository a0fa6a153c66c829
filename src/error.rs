//! Error types for the chat-assist core.

use std::time::Duration;

/// Top-level error type for the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

/// LLM transport errors.
///
/// The session reports these via `on_error` and leaves history untouched.
/// Parse anomalies and policy rejections are never errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} stream ended without a final message")]
    StreamTruncated { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout {
        provider: String,
        timeout: Duration,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tool invocation errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Side-effect execution errors internal to the orchestrator.
///
/// Most execution problems are *not* errors at this layer; a failing
/// command is an `ok = false` outcome recorded to history. These variants
/// cover the machinery itself.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn command: {0}")]
    Spawn(String),

    #[error("Side-effect task panicked: {0}")]
    TaskPanicked(String),

    #[error("Command timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Failed to append entry: {0}")]
    Append(String),

    #[error("Failed to save history: {0}")]
    Save(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the core.
pub type Result<T> = std::result::Result<T, Error>;
