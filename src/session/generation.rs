//! Generation session — the top-level loop.
//!
//! A session drives one conversation: it invokes the LLM client off the
//! caller's control flow, feeds incremental text through parse/reconcile
//! at a throttled rate, hands the finished chunks to the orchestrator, and
//! starts a new generation automatically when side-effect output should be
//! fed back to the model. The session token is the sole cancellation
//! primitive: superseding it turns every pending callback into a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;

use crate::chunk::{self, Chunk, Op};
use crate::config::CoreConfig;
use crate::error::{Error, LlmError};
use crate::exec::{ExecutionState, Mode, Orchestrator};
use crate::history::{ChatEntry, EntryMetadata, HistoryStore, Role};
use crate::llm::{GenerationStats, LlmClient, LlmEvent};
use crate::session::token::{Token, TokenCell};

/// Lifecycle of a generation cycle.
///
/// Cancellation is implicit: a superseded token ends the cycle from any
/// state without a status of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    /// Incremental text is arriving.
    Streaming,
    /// Stream complete; side effects resolving.
    Finalizing,
    /// Side effects resolved, no continuation requested.
    Done,
}

/// Callbacks exposed to the surrounding renderer/UI layer.
pub trait SessionObserver: Send + Sync {
    /// Throttled streaming tick: the accumulated text and the reconciler
    /// ops against the previous tick's chunks.
    fn on_update(&self, _text: &str, _ops: &[Op]) {}

    /// The generation finished and its Assistant entry was appended.
    fn on_finalized(&self, _text: &str, _stats: &GenerationStats) {}

    /// Transport or store failure; history is left as it was.
    fn on_error(&self, _error: &Error) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl SessionObserver for NullObserver {}

enum RunResult {
    /// Side effects produced new output; start another generation.
    Continue,
    Done,
    /// Token went stale or transport failed; all pending work dropped.
    Cancelled,
}

/// The top-level conversation driver. Cheap to clone; clones share the
/// same token cell, history, and orchestrator.
#[derive(Clone)]
pub struct GenerationSession {
    llm: Arc<dyn LlmClient>,
    orchestrator: Arc<Orchestrator>,
    history: Arc<dyn HistoryStore>,
    observer: Arc<dyn SessionObserver>,
    config: CoreConfig,
    tokens: Arc<TokenCell>,
    status: Arc<watch::Sender<SessionStatus>>,
    /// History length at the current cycle's start; the stop-trim target.
    cycle_base: Arc<AtomicUsize>,
}

impl GenerationSession {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        orchestrator: Arc<Orchestrator>,
        history: Arc<dyn HistoryStore>,
        observer: Arc<dyn SessionObserver>,
        config: CoreConfig,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self {
            llm,
            orchestrator,
            history,
            observer,
            config,
            tokens: TokenCell::new(),
            status: Arc::new(status),
            cycle_base: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start a generation over the current history.
    ///
    /// Issues a fresh token, invalidating any in-flight session, and
    /// spawns the drive loop off the caller's control flow. Returns the
    /// issued token so the caller can correlate staleness if it wants to.
    pub fn start(&self) -> Token {
        let token = self.tokens.issue();
        let session = self.clone();
        let drive_token = token.clone();
        tokio::spawn(async move {
            session.drive(drive_token).await;
        });
        token
    }

    /// User-initiated stop: supersedes the token (all pending callbacks
    /// become no-ops and running side-effect tasks are aborted), asks the
    /// provider to stop, and trims trailing not-yet-finalized history
    /// entries from the interrupted cycle.
    pub async fn stop(&self) {
        // Supersede first: the drive loop can no longer change status or
        // append entries, so the snapshot below is stable.
        self.tokens.supersede();
        let status = *self.status.borrow();
        self.llm.stop().await;
        if matches!(
            status,
            SessionStatus::Streaming | SessionStatus::Finalizing
        ) {
            let base = self.cycle_base.load(Ordering::SeqCst);
            if let Err(e) = self.history.truncate(base).await {
                tracing::warn!(error = %e, "Failed to trim unfinalized history entries");
            }
        }
        let _ = self.status.send_replace(SessionStatus::Done);
    }

    /// Watch status transitions (Idle → Streaming → Finalizing → Done).
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    // ── Drive loop ──────────────────────────────────────────────────

    async fn drive(self, mut token: Token) {
        loop {
            match self.run_generation(&token).await {
                RunResult::Continue => {
                    // The continuation supersedes the finished cycle.
                    token = self.tokens.issue();
                }
                RunResult::Done => {
                    self.set_status(&token, SessionStatus::Done);
                    return;
                }
                RunResult::Cancelled => return,
            }
        }
    }

    async fn run_generation(&self, token: &Token) -> RunResult {
        self.set_status(token, SessionStatus::Streaming);
        let base_len = self.history.len().await;
        self.cycle_base.store(base_len, Ordering::SeqCst);

        let snapshot = self.history.entries().await;
        let prompt = snapshot
            .iter()
            .rev()
            .find(|e| e.role == Role::User)
            .map(|e| e.text.clone());
        let started = Instant::now();

        let mut stream = match self
            .llm
            .generate(&snapshot, &self.config.system_prompts)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                if token.is_current() {
                    self.observer.on_error(&Error::Llm(e));
                }
                return RunResult::Cancelled;
            }
        };

        // ── Streaming ───────────────────────────────────────────────
        let mut accumulated = String::new();
        let mut last_chunks: Vec<Chunk> = Vec::new();
        let mut last_flush: Option<Instant> = None;
        let mut finished: Option<(String, GenerationStats)> = None;

        while let Some(event) = stream.next().await {
            if !token.is_current() {
                return RunResult::Cancelled;
            }
            match event {
                Ok(LlmEvent::Delta(delta)) => {
                    accumulated.push_str(&delta);
                    let due = last_flush
                        .is_none_or(|t| t.elapsed() >= self.config.flush_interval);
                    if due {
                        let chunks = chunk::parse(&accumulated);
                        let ops = chunk::reconcile(&last_chunks, &chunks);
                        self.observer.on_update(&accumulated, &ops);
                        last_chunks = chunks;
                        last_flush = Some(Instant::now());
                    }
                }
                Ok(LlmEvent::Done { text, stats }) => {
                    finished = Some((text, stats));
                    break;
                }
                Err(e) => {
                    if token.is_current() {
                        self.observer.on_error(&Error::Llm(e));
                    }
                    return RunResult::Cancelled;
                }
            }
        }

        let Some((text, mut stats)) = finished else {
            if token.is_current() {
                self.observer.on_error(&Error::Llm(LlmError::StreamTruncated {
                    provider: self.llm.model_name().to_string(),
                }));
            }
            return RunResult::Cancelled;
        };
        stats.elapsed_seconds = started.elapsed().as_secs_f64();

        // ── Finalizing ──────────────────────────────────────────────
        if !token.is_current() {
            return RunResult::Cancelled;
        }
        self.set_status(token, SessionStatus::Finalizing);

        // One last parse with the complete text.
        let chunks = chunk::parse(&text);
        let ops = chunk::reconcile(&last_chunks, &chunks);
        self.observer.on_update(&text, &ops);

        let mut state = ExecutionState::new();
        let mode = Mode::Live { token };
        self.orchestrator.process(&chunks, &mut state, mode).await;

        // The Assistant entry lands before any Console entry it caused.
        let mut entry = ChatEntry::assistant(&text).with_metadata(EntryMetadata {
            prompt,
            input_tokens: Some(stats.input_tokens),
            output_tokens: Some(stats.output_tokens),
            elapsed_seconds: Some(stats.elapsed_seconds),
        });
        if state.tool_call_counter > 0 {
            entry = entry.with_id(state.message_id);
        }
        if !token.is_current() {
            return RunResult::Cancelled;
        }
        if let Err(e) = self.history.append(entry).await {
            self.observer.on_error(&Error::History(e));
            return RunResult::Cancelled;
        }
        self.observer.on_finalized(&text, &stats);

        // Run the deferred queue exactly once.
        let outcome = self.orchestrator.run_pending(&mut state, mode).await;
        if outcome.cancelled || !token.is_current() {
            return RunResult::Cancelled;
        }
        for console in outcome.entries {
            if !token.is_current() {
                return RunResult::Cancelled;
            }
            if let Err(e) = self.history.append(console).await {
                self.observer.on_error(&Error::History(e));
                return RunResult::Cancelled;
            }
        }
        if let Err(e) = self.history.save().await {
            tracing::warn!(error = %e, "Failed to save history");
        }

        if outcome.should_continue && token.is_current() {
            tracing::debug!("Side effects produced new output; continuing generation");
            return RunResult::Continue;
        }
        RunResult::Done
    }

    fn set_status(&self, token: &Token, status: SessionStatus) {
        if token.is_current() {
            let _ = self.status.send_replace(status);
        }
    }
}
