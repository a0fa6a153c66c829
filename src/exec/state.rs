//! Per-message execution state.

use uuid::Uuid;

/// A side effect detected in a chunk, queued for deferred execution.
///
/// The queue is explicit data rather than closures so restore mode can
/// match each effect against persisted history without running anything.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// A `console` codeblock body to run through the shell executor.
    Command { command: String },
    /// A structured tool invocation.
    Tool {
        name: String,
        args: serde_json::Value,
    },
    /// An extension-registered codeblock language.
    Extension { lang: String, body: String },
}

/// One queued execution, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExecution {
    /// Position in the queue (issue order).
    pub seq: usize,
    /// Offset of this effect's Console entry relative to the Assistant
    /// entry: the history-cursor value when the effect was queued.
    pub entry_index: usize,
    pub effect: SideEffect,
}

/// Mutable state owned by exactly one in-flight parse/execute cycle for
/// one Assistant message. Constructed fresh per message and discarded once
/// the message's side effects are resolved.
#[derive(Debug)]
pub struct ExecutionState {
    /// Stable handle for this message, used to correlate tool-call Console
    /// entries in restore mode.
    pub message_id: Uuid,
    /// Codeblock chunks seen (side-effect-bearing or not).
    pub codeblock_counter: usize,
    /// Tool-call chunks seen.
    pub tool_call_counter: usize,
    /// Index the next Console entry should occupy, relative to the
    /// Assistant entry. Incremented once per side-effect chunk, not once
    /// per codeblock; most codeblocks map to no history entry at all.
    pub history_cursor: usize,
    /// Whether any side-effect chunk was detected.
    pub has_side_effect: bool,
    /// Deferred executions, in issue order.
    pub pending: Vec<PendingExecution>,
    /// Whether the conversation should automatically continue.
    pub should_continue: bool,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            codeblock_counter: 0,
            tool_call_counter: 0,
            history_cursor: 0,
            has_side_effect: false,
            pending: Vec::new(),
            should_continue: false,
        }
    }

    /// Queue a detected side effect and advance the history cursor.
    pub fn queue(&mut self, effect: SideEffect) {
        self.pending.push(PendingExecution {
            seq: self.pending.len(),
            entry_index: self.history_cursor,
            effect,
        });
        self.history_cursor += 1;
        self.has_side_effect = true;
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}
