//! Fence-language dispatch.
//!
//! Side-effect classification of a codeblock is a lookup on its language
//! string: `console` is built in, extensions contribute their own
//! languages, and the default fallback is render-only (no side effect).

use std::sync::Arc;

use crate::extensions::{CodeblockHandler, ExtensionRegistry};

/// The built-in fence language for shell commands.
pub const CONSOLE_LANG: &str = "console";

/// Resolved handler for a fence language.
pub enum LangHandler {
    /// Run the body through the shell executor, subject to auto-run policy.
    Console,
    /// Ask the extension handler for an answer.
    Extension(Arc<dyn CodeblockHandler>),
}

/// The `lang -> handler` table the orchestrator resolves once per chunk.
pub struct LanguageTable {
    extensions: Arc<ExtensionRegistry>,
}

impl LanguageTable {
    pub fn new(extensions: Arc<ExtensionRegistry>) -> Self {
        Self { extensions }
    }

    /// Resolve the handler for a fence language. `None` is the default
    /// fallback: the block renders but carries no side effect.
    pub async fn resolve(&self, lang: &str) -> Option<LangHandler> {
        if lang == CONSOLE_LANG {
            return Some(LangHandler::Console);
        }
        self.extensions.get(lang).await.map(LangHandler::Extension)
    }
}
