//! LLM interface seam.
//!
//! The core never talks to a provider directly; the surrounding application
//! injects an `LlmClient`. The client yields incremental `Delta` events
//! followed by one terminal `Done` event carrying the complete text and
//! usage stats.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::LlmError;
use crate::history::ChatEntry;

/// Usage stats for one completed generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_seconds: f64,
}

/// One event on a generation stream.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    /// Incremental text.
    Delta(String),
    /// Terminal event with the complete text and usage stats.
    Done {
        text: String,
        stats: GenerationStats,
    },
}

/// A generation stream. Ends after `Done`; a stream that ends without one
/// is treated as a transport failure.
pub type LlmStream = Pin<Box<dyn Stream<Item = std::result::Result<LlmEvent, LlmError>> + Send>>;

/// External LLM interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Start a generation over the given history and system prompts.
    async fn generate(
        &self,
        history: &[ChatEntry],
        system_prompts: &[String],
    ) -> std::result::Result<LlmStream, LlmError>;

    /// Ask the provider to stop the in-flight generation. Best effort; the
    /// session ignores any events that still arrive.
    async fn stop(&self);

    /// Model identifier, for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}
