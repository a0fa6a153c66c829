//! Session tokens — the single cancellation/ordering primitive.
//!
//! A `TokenCell` hands out monotonically increasing token values. Every
//! asynchronous callback captures the `Token` issued for its session and
//! must verify it is still current before mutating shared state; a
//! mismatch means "discard, do not mutate" and is never an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Issues and invalidates session tokens for one conversation.
pub struct TokenCell {
    current: AtomicU64,
    notify: watch::Sender<u64>,
}

impl TokenCell {
    pub fn new() -> Arc<Self> {
        let (notify, _) = watch::channel(0);
        Arc::new(Self {
            current: AtomicU64::new(0),
            notify,
        })
    }

    /// Issue a fresh token, superseding every previously issued one.
    pub fn issue(self: &Arc<Self>) -> Token {
        let value = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.notify.send_replace(value);
        tracing::debug!(token = value, "Issued session token");
        Token {
            value,
            cell: Arc::clone(self),
        }
    }

    /// Invalidate all outstanding tokens without issuing a usable one.
    pub fn supersede(&self) {
        let value = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.notify.send_replace(value);
        tracing::debug!(token = value, "Superseded session tokens");
    }

    /// The currently authoritative token value.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// A captured token value tied to its issuing cell.
#[derive(Clone)]
pub struct Token {
    value: u64,
    cell: Arc<TokenCell>,
}

impl Token {
    /// Whether this token is still the authoritative one.
    pub fn is_current(&self) -> bool {
        self.cell.current() == self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Resolve once this token has been superseded. Used to race barrier
    /// joins against cancellation.
    pub async fn superseded(&self) {
        let mut rx = self.cell.notify.subscribe();
        loop {
            if *rx.borrow_and_update() != self.value {
                return;
            }
            // The cell outlives this token, so the sender cannot drop here;
            // treat a closed channel as superseded anyway.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.value)
            .field("current", &self.is_current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_supersedes_previous() {
        let cell = TokenCell::new();
        let first = cell.issue();
        assert!(first.is_current());

        let second = cell.issue();
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn test_supersede_invalidates_without_issuing() {
        let cell = TokenCell::new();
        let token = cell.issue();
        cell.supersede();
        assert!(!token.is_current());
    }

    #[tokio::test]
    async fn test_superseded_wakes_waiter() {
        let cell = TokenCell::new();
        let token = cell.issue();

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.superseded().await }
        });

        cell.supersede();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on supersession")
            .unwrap();
    }

    #[tokio::test]
    async fn test_superseded_returns_immediately_when_stale() {
        let cell = TokenCell::new();
        let token = cell.issue();
        let _newer = cell.issue();
        // Already stale: must not block.
        tokio::time::timeout(std::time::Duration::from_millis(50), token.superseded())
            .await
            .expect("stale token must resolve immediately");
    }
}
