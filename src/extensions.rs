//! Extension codeblock registry.
//!
//! Extensions contribute side-effect handlers for fence languages beyond
//! the built-in `console` and `tool_call` forms (e.g. a plotting or
//! calculator language). The registry is the `lang -> handler` table the
//! orchestrator resolves per chunk.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// A side-effect handler for one extension-provided fence language.
#[async_trait]
pub trait CodeblockHandler: Send + Sync {
    /// The fence language this handler answers for.
    fn language(&self) -> &str;

    /// Produce the console answer for a codeblock body.
    ///
    /// `Ok(None)` means the handler declined / was cancelled and
    /// contributes nothing.
    async fn get_answer(&self, body: &str) -> anyhow::Result<Option<String>>;
}

/// Registry of extension codeblock handlers, keyed by fence language.
pub struct ExtensionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn CodeblockHandler>>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under its own language.
    pub async fn register(&self, handler: Arc<dyn CodeblockHandler>) {
        let lang = handler.language().to_string();
        self.handlers.write().await.insert(lang.clone(), handler);
        tracing::debug!("Registered codeblock handler: {}", lang);
    }

    /// Get the handler for a fence language.
    pub async fn get(&self, lang: &str) -> Option<Arc<dyn CodeblockHandler>> {
        self.handlers.read().await.get(lang).cloned()
    }

    /// Check whether a language has a registered handler.
    pub async fn has(&self, lang: &str) -> bool {
        self.handlers.read().await.contains_key(lang)
    }

    /// All registered languages.
    pub async fn languages(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl CodeblockHandler for Upper {
        fn language(&self) -> &str {
            "upper"
        }
        async fn get_answer(&self, body: &str) -> anyhow::Result<Option<String>> {
            Ok(Some(body.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = ExtensionRegistry::new();
        registry.register(Arc::new(Upper)).await;

        assert!(registry.has("upper").await);
        assert!(!registry.has("lower").await);

        let handler = registry.get("upper").await.unwrap();
        let answer = handler.get_answer("abc").await.unwrap();
        assert_eq!(answer.as_deref(), Some("ABC"));
    }
}
