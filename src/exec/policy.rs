//! Auto-run policy for commands.

use std::collections::HashSet;

use crate::config::CoreConfig;

/// Why a command was (not) allowed to auto-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// The command's first word matches the destructive-prefix denylist.
    DeniedPrefix(String),
    /// The per-conversation auto-run cap is exhausted.
    CapExhausted,
}

/// A denied or capped command is recorded as skipped, never surfaced as a
/// failure, and contributes no continuation.
#[derive(Debug, Clone)]
pub struct AutoRunPolicy {
    denylist: HashSet<String>,
    max_auto_runs: u32,
}

impl AutoRunPolicy {
    pub fn new(denylist: impl IntoIterator<Item = String>, max_auto_runs: u32) -> Self {
        Self {
            denylist: denylist.into_iter().map(|s| s.to_lowercase()).collect(),
            max_auto_runs,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.denylist.iter().cloned(), config.max_auto_runs)
    }

    /// Decide whether a command may auto-run, given how many auto-runs this
    /// conversation has already used.
    pub fn decide(&self, command: &str, runs_so_far: u32) -> Decision {
        if let Some(first) = command.trim().split_whitespace().next() {
            let first = first.to_lowercase();
            if self.denylist.contains(&first) {
                return Decision::DeniedPrefix(first);
            }
        }
        if runs_so_far >= self.max_auto_runs {
            return Decision::CapExhausted;
        }
        Decision::Allow
    }
}
