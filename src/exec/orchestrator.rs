//! Side-effect orchestration.
//!
//! `process` classifies side-effect chunks and queues them on the
//! execution state — it never runs anything, which is what defers
//! execution while the owning session is still streaming (the chunk a
//! side effect belongs to may still be textually incomplete). The queue
//! runs exactly once, at session finalizing, through `run_pending`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::chunk::Chunk;
use crate::config::{CoreConfig, ExecPolicy};
use crate::exec::handler::{LangHandler, LanguageTable};
use crate::exec::policy::{AutoRunPolicy, Decision};
use crate::exec::state::{ExecutionState, PendingExecution, SideEffect};
use crate::extensions::ExtensionRegistry;
use crate::history::{ChatEntry, Role};
use crate::session::token::Token;
use crate::shell::{CommandOutcome, ShellExecutor};
use crate::tools::ToolRegistry;

/// Console text recorded for a skipped (policy-denied) side effect.
pub const SKIPPED_OUTPUT: &str = "None";

/// How `run_pending` treats the queue.
#[derive(Clone, Copy)]
pub enum Mode<'a> {
    /// Execute queued effects; results are guarded by the session token.
    Live { token: &'a Token },
    /// Never execute. Replay persisted Console entries matched against the
    /// Assistant entry at `assistant_index`.
    Restore {
        history: &'a [ChatEntry],
        assistant_index: usize,
    },
}

/// Result of one orchestrator pass.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Console entries in issue order.
    pub entries: Vec<ChatEntry>,
    /// Whether something new should be fed back to the model.
    pub should_continue: bool,
    /// The run was abandoned because the session token went stale; all
    /// results were discarded.
    pub cancelled: bool,
}

impl Outcome {
    fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

/// What a spawned side-effect task resolved to.
enum TaskResult {
    Command(CommandOutcome),
    /// Tool or extension answer; `None` means cancelled, contribute nothing.
    Answer(Option<String>),
    /// Tool/extension machinery failed; recorded so the model can react.
    Failed(String),
}

/// A planned queue slot: either already decided (skipped) or a running task.
enum Launch {
    Skipped,
    Task {
        handle: JoinHandle<TaskResult>,
        is_tool: bool,
    },
}

/// Schedules queued side effects, collects their results, and folds them
/// into Console entries. One orchestrator serves one conversation; its
/// auto-run counter spans the whole continuation chain.
pub struct Orchestrator {
    shell: Arc<dyn ShellExecutor>,
    tools: Arc<ToolRegistry>,
    extensions: Arc<ExtensionRegistry>,
    languages: LanguageTable,
    policy: AutoRunPolicy,
    exec_policy: ExecPolicy,
    auto_runs: AtomicU32,
}

impl Orchestrator {
    pub fn new(
        shell: Arc<dyn ShellExecutor>,
        tools: Arc<ToolRegistry>,
        extensions: Arc<ExtensionRegistry>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            shell,
            tools,
            languages: LanguageTable::new(Arc::clone(&extensions)),
            extensions,
            policy: AutoRunPolicy::from_config(config),
            exec_policy: config.exec_policy,
            auto_runs: AtomicU32::new(0),
        }
    }

    /// Auto-runs used by this conversation so far.
    pub fn auto_runs_used(&self) -> u32 {
        self.auto_runs.load(Ordering::SeqCst)
    }

    /// Classify side-effect chunks and queue them on the state, advancing
    /// the counters. Classification is identical in both modes; only the
    /// execution step differs.
    pub async fn process(&self, chunks: &[Chunk], state: &mut ExecutionState, _mode: Mode<'_>) {
        for chunk in chunks {
            match chunk {
                Chunk::CodeBlock { lang, body } => {
                    state.codeblock_counter += 1;
                    match self.languages.resolve(lang).await {
                        Some(LangHandler::Console) => state.queue(SideEffect::Command {
                            command: body.clone(),
                        }),
                        Some(LangHandler::Extension(_)) => state.queue(SideEffect::Extension {
                            lang: lang.clone(),
                            body: body.clone(),
                        }),
                        None => {}
                    }
                }
                Chunk::ToolCall { name, args } => {
                    state.tool_call_counter += 1;
                    state.queue(SideEffect::Tool {
                        name: name.clone(),
                        args: serde_json::Value::Object(args.clone()),
                    });
                }
                _ => {}
            }
        }
    }

    /// Drain and resolve the queue. Invoked exactly once per cycle, at
    /// session finalizing.
    pub async fn run_pending(&self, state: &mut ExecutionState, mode: Mode<'_>) -> Outcome {
        match mode {
            Mode::Live { token } => {
                if !token.is_current() {
                    state.pending.clear();
                    return Outcome::cancelled();
                }
                let pending = std::mem::take(&mut state.pending);
                let outcome = match self.exec_policy {
                    ExecPolicy::Parallel => {
                        self.run_parallel(pending, state.message_id, token).await
                    }
                    ExecPolicy::Sequential => {
                        self.run_sequential(pending, state.message_id, token).await
                    }
                };
                state.should_continue = outcome.should_continue;
                outcome
            }
            Mode::Restore {
                history,
                assistant_index,
            } => {
                let outcome = self.replay(state, history, assistant_index);
                state.pending.clear();
                outcome
            }
        }
    }

    /// Replay a persisted message without executing anything: each queued
    /// effect is matched to its stored Console entry by message index, and
    /// tool calls additionally by the Assistant entry's UUID. This is what
    /// keeps destructive commands from re-running when a past chat is
    /// reopened.
    pub async fn restore_message(
        &self,
        chunks: &[Chunk],
        history: &[ChatEntry],
        assistant_index: usize,
    ) -> Outcome {
        let mut state = ExecutionState::new();
        let mode = Mode::Restore {
            history,
            assistant_index,
        };
        self.process(chunks, &mut state, mode).await;
        self.run_pending(&mut state, mode).await
    }

    // ── Live execution ──────────────────────────────────────────────

    /// Start every allowed task immediately, then barrier-join in issue
    /// order so Console entries flush deterministically regardless of
    /// completion order. The join races token supersession; a stale token
    /// aborts the remaining tasks and discards all results.
    async fn run_parallel(
        &self,
        pending: Vec<PendingExecution>,
        message_id: Uuid,
        token: &Token,
    ) -> Outcome {
        let mut slots: Vec<Option<Launch>> = Vec::with_capacity(pending.len());
        for p in pending {
            slots.push(Some(self.launch(p.effect).await));
        }

        let mut outcome = Outcome::default();
        for i in 0..slots.len() {
            let launch = match slots[i].take() {
                Some(l) => l,
                None => continue,
            };
            match launch {
                Launch::Skipped => outcome.entries.push(ChatEntry::console(SKIPPED_OUTPUT)),
                Launch::Task {
                    mut handle,
                    is_tool,
                } => {
                    let result = tokio::select! {
                        biased;
                        _ = token.superseded() => None,
                        res = &mut handle => Some(flatten_join(res)),
                    };
                    match result {
                        Some(res) => fold(res, is_tool, message_id, &mut outcome),
                        None => {
                            handle.abort();
                            for slot in slots.iter_mut().skip(i + 1) {
                                if let Some(Launch::Task { handle, .. }) = slot.take() {
                                    handle.abort();
                                }
                            }
                            return Outcome::cancelled();
                        }
                    }
                }
            }
        }
        outcome
    }

    /// Start each task only after the previous one has fully completed, so
    /// commands observe each other's filesystem effects in issue order.
    async fn run_sequential(
        &self,
        pending: Vec<PendingExecution>,
        message_id: Uuid,
        token: &Token,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        for p in pending {
            if !token.is_current() {
                return Outcome::cancelled();
            }
            match self.launch(p.effect).await {
                Launch::Skipped => outcome.entries.push(ChatEntry::console(SKIPPED_OUTPUT)),
                Launch::Task {
                    mut handle,
                    is_tool,
                } => {
                    let result = tokio::select! {
                        biased;
                        _ = token.superseded() => None,
                        res = &mut handle => Some(flatten_join(res)),
                    };
                    match result {
                        Some(res) => fold(res, is_tool, message_id, &mut outcome),
                        None => {
                            handle.abort();
                            return Outcome::cancelled();
                        }
                    }
                }
            }
        }
        outcome
    }

    /// Apply the auto-run policy and spawn the task for one queued effect.
    /// Tasks run under `tokio::spawn` so a panic is caught at the join
    /// boundary and can never take down sibling tasks.
    async fn launch(&self, effect: SideEffect) -> Launch {
        match effect {
            SideEffect::Command { command } => {
                let decision = self
                    .policy
                    .decide(&command, self.auto_runs.load(Ordering::SeqCst));
                match decision {
                    Decision::Allow => {
                        self.auto_runs.fetch_add(1, Ordering::SeqCst);
                        let shell = Arc::clone(&self.shell);
                        Launch::Task {
                            handle: tokio::spawn(async move {
                                TaskResult::Command(shell.run(&command).await)
                            }),
                            is_tool: false,
                        }
                    }
                    Decision::DeniedPrefix(prefix) => {
                        tracing::info!(%command, %prefix, "Auto-run denied by denylist");
                        Launch::Skipped
                    }
                    Decision::CapExhausted => {
                        tracing::info!(%command, "Auto-run denied: cap exhausted");
                        Launch::Skipped
                    }
                }
            }
            SideEffect::Tool { name, args } => {
                let tools = Arc::clone(&self.tools);
                Launch::Task {
                    handle: tokio::spawn(async move {
                        match tools.get(&name).await {
                            None => TaskResult::Failed(format!("Tool {name} not found")),
                            Some(tool) => match tool.execute(args).await {
                                Ok(answer) => TaskResult::Answer(answer),
                                Err(e) => TaskResult::Failed(e.to_string()),
                            },
                        }
                    }),
                    is_tool: true,
                }
            }
            SideEffect::Extension { lang, body } => {
                let handler = self.extensions.get(&lang).await;
                Launch::Task {
                    handle: tokio::spawn(async move {
                        match handler {
                            None => TaskResult::Failed(format!(
                                "No handler for codeblock language '{lang}'"
                            )),
                            Some(h) => match h.get_answer(&body).await {
                                Ok(answer) => TaskResult::Answer(answer),
                                Err(e) => TaskResult::Failed(e.to_string()),
                            },
                        }
                    }),
                    is_tool: false,
                }
            }
        }
    }

    // ── Restore replay ──────────────────────────────────────────────

    fn replay(
        &self,
        state: &ExecutionState,
        history: &[ChatEntry],
        assistant_index: usize,
    ) -> Outcome {
        let assistant_id = history.get(assistant_index).and_then(|e| e.id);
        let tail = if assistant_index + 1 <= history.len() {
            &history[assistant_index + 1..]
        } else {
            &[]
        };

        let mut outcome = Outcome::default();
        for p in &state.pending {
            let matched = match (&p.effect, assistant_id) {
                (SideEffect::Tool { .. }, Some(id)) => {
                    // n-th Console entry carrying this message's UUID.
                    let n = state.pending[..p.seq]
                        .iter()
                        .filter(|q| matches!(q.effect, SideEffect::Tool { .. }))
                        .count();
                    tail.iter()
                        .filter(|e| e.role == Role::Console && e.id == Some(id))
                        .nth(n)
                }
                _ => tail
                    .get(p.entry_index)
                    .filter(|e| e.role == Role::Console),
            };
            match matched {
                Some(entry) => outcome.entries.push(entry.clone()),
                None => tracing::warn!(
                    seq = p.seq,
                    "No persisted Console entry for side effect; nothing to replay"
                ),
            }
        }
        // Restore never re-enters the continuation loop.
        outcome
    }
}

/// Convert a join result, trapping panics at the task boundary.
fn flatten_join(res: Result<TaskResult, JoinError>) -> TaskResult {
    match res {
        Ok(r) => r,
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "Side-effect task panicked");
            TaskResult::Failed(format!("task panicked: {e}"))
        }
        // Aborted: cancelled, contribute nothing.
        Err(_) => TaskResult::Answer(None),
    }
}

/// Fold one task result into the outcome. Continuation is driven by "was
/// there something new to tell the model", not by success.
fn fold(res: TaskResult, is_tool: bool, message_id: Uuid, outcome: &mut Outcome) {
    match res {
        TaskResult::Command(CommandOutcome { ok, output }) => {
            if ok && !output.trim().is_empty() {
                outcome.should_continue = true;
            }
            outcome.entries.push(ChatEntry::console(output));
        }
        TaskResult::Answer(None) => {}
        TaskResult::Answer(Some(text)) => {
            if !text.trim().is_empty() {
                outcome.should_continue = true;
            }
            let mut entry = ChatEntry::console(text);
            if is_tool {
                entry = entry.with_id(message_id);
            }
            outcome.entries.push(entry);
        }
        TaskResult::Failed(reason) => {
            let mut entry = ChatEntry::console(reason);
            if is_tool {
                entry = entry.with_id(message_id);
            }
            outcome.entries.push(entry);
        }
    }
}
