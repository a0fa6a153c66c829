//! Chunk value objects.

use serde::{Deserialize, Serialize};

/// One structurally-typed unit of parsed assistant output.
///
/// Chunks are immutable value objects produced fresh on every parse; they
/// carry no identity across parses. Continuity is reconstructed by the
/// reconciler via positional comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Plain prose, newlines preserved.
    Text { text: String },
    /// A fenced code block with its (possibly empty) language tag.
    CodeBlock { lang: String, body: String },
    /// Consecutive `|…|` lines sharing one pipe count, one raw line per row.
    Table { rows: Vec<String> },
    /// A `$$ … $$` display-math block.
    LatexBlock { body: String },
    /// A single `$…$` inline-math span.
    LatexInline { body: String },
    /// Text interleaved with inline math; subchunks alternate
    /// `Text` / `LatexInline` so a renderer can flow them as one paragraph.
    InlineMixed { parts: Vec<Chunk> },
    /// Model reasoning between think delimiters.
    Thinking { body: String },
    /// A structured tool invocation.
    ToolCall {
        name: String,
        args: serde_json::Map<String, serde_json::Value>,
    },
}

/// Discriminant for positional comparison between parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Text,
    CodeBlock,
    Table,
    LatexBlock,
    LatexInline,
    InlineMixed,
    Thinking,
    ToolCall,
}

impl Chunk {
    /// The chunk's structural kind.
    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Text { .. } => ChunkKind::Text,
            Chunk::CodeBlock { .. } => ChunkKind::CodeBlock,
            Chunk::Table { .. } => ChunkKind::Table,
            Chunk::LatexBlock { .. } => ChunkKind::LatexBlock,
            Chunk::LatexInline { .. } => ChunkKind::LatexInline,
            Chunk::InlineMixed { .. } => ChunkKind::InlineMixed,
            Chunk::Thinking { .. } => ChunkKind::Thinking,
            Chunk::ToolCall { .. } => ChunkKind::ToolCall,
        }
    }

    /// Reconstruct the source text this chunk was parsed from.
    ///
    /// Re-parsing the rendered form yields the same chunk, which is what
    /// makes `parse(render_all(parse(x))) == parse(x)` hold.
    pub fn render(&self) -> String {
        match self {
            Chunk::Text { text } => text.clone(),
            Chunk::CodeBlock { lang, body } => {
                if body.is_empty() {
                    format!("```{lang}\n```")
                } else {
                    format!("```{lang}\n{body}\n```")
                }
            }
            Chunk::Table { rows } => rows.join("\n"),
            Chunk::LatexBlock { body } => {
                if body.is_empty() {
                    "$$\n$$".to_string()
                } else {
                    format!("$$\n{body}\n$$")
                }
            }
            Chunk::LatexInline { body } => format!("${body}$"),
            Chunk::InlineMixed { parts } => {
                parts.iter().map(Chunk::render).collect::<String>()
            }
            Chunk::Thinking { body } => {
                if body.is_empty() {
                    "<think>\n</think>".to_string()
                } else {
                    format!("<think>\n{body}\n</think>")
                }
            }
            Chunk::ToolCall { name, args } => {
                let payload = serde_json::json!({
                    "name": name,
                    "arguments": serde_json::Value::Object(args.clone()),
                });
                format!("```tool_call\n{payload}\n```")
            }
        }
    }
}

/// Reconstruct source text from a full chunk list.
pub fn render_all(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(Chunk::render)
        .collect::<Vec<_>>()
        .join("\n")
}
