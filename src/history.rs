//! Chat history: the logical entry shape and the store seam.
//!
//! The core does not own a persistence format; it hands entries to a
//! `HistoryStore` in this shape. Ordering is append-only: a Console entry
//! reporting a side-effect outcome always lands after the Assistant entry
//! that requested it, and the core never reorders or deletes entries except
//! the explicit stop-trim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::HistoryError;

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Output of a side effect (command, tool, extension codeblock).
    Console,
}

/// Generation metadata attached to Assistant entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The prompt text the generation was issued for.
    pub prompt: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub elapsed_seconds: Option<f64>,
}

/// One chat history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    /// Stable handle for restore-mode correlation. Set on Assistant entries
    /// that carry tool calls, and mirrored on the Console entries answering
    /// them.
    pub id: Option<Uuid>,
    pub metadata: Option<EntryMetadata>,
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn console(text: impl Into<String>) -> Self {
        Self::new(Role::Console, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            id: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Backend-agnostic history store.
///
/// Appends are serialized through the owning session (single writer); reads
/// are used by restore mode and the renderer.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry at the end.
    async fn append(&self, entry: ChatEntry) -> Result<(), HistoryError>;

    /// Flush to the backing medium.
    async fn save(&self) -> Result<(), HistoryError>;

    /// Snapshot of all entries, in append order.
    async fn entries(&self) -> Vec<ChatEntry>;

    /// Number of entries.
    async fn len(&self) -> usize;

    /// Drop entries past `len`. Used only by the session's stop-trim for
    /// trailing, not-yet-finalized entries.
    async fn truncate(&self, len: usize) -> Result<(), HistoryError>;
}

/// In-memory reference store.
#[derive(Default)]
pub struct InMemoryHistory {
    entries: RwLock<Vec<ChatEntry>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing entries, e.g. a reopened conversation.
    pub fn with_entries(entries: Vec<ChatEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, entry: ChatEntry) -> Result<(), HistoryError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn save(&self) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn entries(&self) -> Vec<ChatEntry> {
        self.entries.read().await.clone()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn truncate(&self, len: usize) -> Result<(), HistoryError> {
        self.entries.write().await.truncate(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryHistory::new();
        store.append(ChatEntry::user("hi")).await.unwrap();
        store.append(ChatEntry::assistant("hello")).await.unwrap();
        store.append(ChatEntry::console("ok")).await.unwrap();

        let entries = store.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[2].role, Role::Console);
    }

    #[tokio::test]
    async fn test_truncate_drops_tail() {
        let store = InMemoryHistory::new();
        store.append(ChatEntry::user("hi")).await.unwrap();
        store.append(ChatEntry::assistant("partial")).await.unwrap();
        store.truncate(1).await.unwrap();

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "hi");
    }

    #[test]
    fn test_entry_builders() {
        let id = Uuid::new_v4();
        let entry = ChatEntry::assistant("x")
            .with_id(id)
            .with_metadata(EntryMetadata {
                prompt: Some("p".into()),
                input_tokens: Some(10),
                output_tokens: Some(5),
                elapsed_seconds: Some(1.5),
            });
        assert_eq!(entry.id, Some(id));
        assert_eq!(entry.metadata.unwrap().input_tokens, Some(10));
    }
}
