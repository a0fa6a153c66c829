//! Chat-assist core — streaming parse, reconcile, execute, continue.
//!
//! Turns a raw, possibly still-arriving, model output string into typed
//! chunks, executes the side effects those chunks carry (shell commands,
//! tool calls, extension codeblocks) under a concurrency policy, and
//! decides whether the conversation continues automatically. Rendering,
//! audio, and persistence formats live in the surrounding application.

pub mod chunk;
pub mod config;
pub mod error;
pub mod exec;
pub mod extensions;
pub mod history;
pub mod llm;
pub mod logging;
pub mod session;
pub mod shell;
pub mod tools;

pub use chunk::{Chunk, Op, parse, reconcile, render_all};
pub use config::{CoreConfig, ExecPolicy};
pub use error::{Error, Result};
pub use exec::{ExecutionState, Mode, Orchestrator, Outcome, SKIPPED_OUTPUT};
pub use history::{ChatEntry, EntryMetadata, HistoryStore, InMemoryHistory, Role};
pub use llm::{GenerationStats, LlmClient, LlmEvent, LlmStream};
pub use session::{GenerationSession, NullObserver, SessionObserver, SessionStatus, Token};
pub use shell::{CommandOutcome, ProcessShellExecutor, ShellExecutor};
