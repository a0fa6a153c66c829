//! Side-effect detection, policy, and execution.

pub mod handler;
pub mod orchestrator;
pub mod policy;
pub mod state;

pub use handler::{CONSOLE_LANG, LangHandler, LanguageTable};
pub use orchestrator::{Mode, Orchestrator, Outcome, SKIPPED_OUTPUT};
pub use policy::{AutoRunPolicy, Decision};
pub use state::{ExecutionState, PendingExecution, SideEffect};
