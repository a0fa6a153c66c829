//! Configuration types.

use std::time::Duration;

/// How queued side-effect tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecPolicy {
    /// Every queued task starts immediately; one barrier join at the end.
    #[default]
    Parallel,
    /// Each task starts only after the previous one has fully completed,
    /// so commands observe each other's filesystem effects in issue order.
    Sequential,
}

/// Core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Scheduling policy for queued side effects.
    pub exec_policy: ExecPolicy,
    /// Maximum number of auto-executed commands per conversation.
    pub max_auto_runs: u32,
    /// Command prefixes that are never auto-executed.
    pub denylist: Vec<String>,
    /// Minimum interval between parse/reconcile flushes while streaming.
    pub flush_interval: Duration,
    /// System prompts passed to the LLM on every generation.
    pub system_prompts: Vec<String>,
    /// Timeout for a single shell command.
    pub command_timeout: Duration,
}

/// Command prefixes denied by default. First word of the command is
/// compared case-insensitively against this list.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "rm", "sudo", "doas", "apt", "apt-get", "yum", "dnf", "pacman", "mkfs",
    "dd", "shutdown", "reboot", "poweroff", "chmod", "chown", "kill",
    "pkill", "killall", "mv", "format",
];

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            exec_policy: ExecPolicy::Parallel,
            max_auto_runs: 10,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            flush_interval: Duration::from_millis(100),
            system_prompts: Vec::new(),
            command_timeout: Duration::from_secs(120),
        }
    }
}
