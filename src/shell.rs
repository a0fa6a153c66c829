//! Shell command execution.
//!
//! Commands run through `sh -c` (or `cmd /C` on Windows) with captured
//! output, a timeout, and truncation at UTF-8 boundaries. The spawned child
//! has `kill_on_drop` set, so aborting the owning task on user stop also
//! terminates the process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ExecError;

/// Maximum captured output size before truncation (64KB).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Default command timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit status zero.
    pub ok: bool,
    /// Merged stdout/stderr, truncated.
    pub output: String,
}

/// External shell executor interface.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run a command to completion. Infrastructure problems (spawn failure,
    /// timeout) surface as a failed outcome, not an error.
    async fn run(&self, command: &str) -> CommandOutcome;
}

/// Shell executor backed by a real subprocess.
#[derive(Debug)]
pub struct ProcessShellExecutor {
    /// Working directory for commands (if None, uses cwd).
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessShellExecutor {
    pub fn new() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Set the command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn execute(&self, cmd: &str) -> Result<CommandOutcome, ExecError> {
        let mut command = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", cmd]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", cmd]);
            c
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ExecError::Spawn(e.to_string()))?;

        // Dropping the future on timeout kills the child via kill_on_drop.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let merged = if stderr.is_empty() {
                    stdout
                } else if stdout.is_empty() {
                    stderr
                } else {
                    format!("{stdout}\n\n--- stderr ---\n{stderr}")
                };
                Ok(CommandOutcome {
                    ok: output.status.success(),
                    output: truncate_output(&merged),
                })
            }
            Ok(Err(e)) => Err(ExecError::Spawn(e.to_string())),
            Err(_) => Err(ExecError::Timeout {
                timeout: self.timeout,
            }),
        }
    }
}

impl Default for ProcessShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellExecutor for ProcessShellExecutor {
    async fn run(&self, command: &str) -> CommandOutcome {
        match self.execute(command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "Command did not complete");
                CommandOutcome {
                    ok: false,
                    output: e.to_string(),
                }
            }
        }
    }
}

/// Truncate output to fit within limits (UTF-8 safe).
fn truncate_output(s: &str) -> String {
    if s.len() <= MAX_OUTPUT_SIZE {
        return s.to_string();
    }
    let half = MAX_OUTPUT_SIZE / 2;
    let head_end = floor_char_boundary(s, half);
    let tail_start = floor_char_boundary(s, s.len() - half);
    format!(
        "{}\n\n... [truncated {} bytes] ...\n\n{}",
        &s[..head_end],
        s.len() - MAX_OUTPUT_SIZE,
        &s[tail_start..]
    )
}

/// Find the largest byte index <= `i` that is a valid char boundary.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}
