//! Tool abstraction for model-invoked capabilities.

pub mod registry;

pub use registry::ToolRegistry;

use async_trait::async_trait;

use crate::error::ToolError;

/// An external tool the model can invoke through a `tool_call` chunk.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, matched against the tool-call's `name` field.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Execute with structured arguments.
    ///
    /// `Ok(None)` means the invocation was cancelled and contributes
    /// nothing — no Console entry, no continuation.
    async fn execute(&self, args: serde_json::Value) -> Result<Option<String>, ToolError>;
}
