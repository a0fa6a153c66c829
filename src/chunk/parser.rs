//! Streaming-safe chunk parser.
//!
//! `parse` is total and deterministic: malformed input degrades to `Text`,
//! and unterminated structures (a fence, table, think span, or math block
//! cut off mid-stream) are emitted provisionally with all remaining text as
//! their body. Re-parsing as more text arrives replaces the provisional
//! interpretation, which is what makes the parser safe to call on a
//! half-received stream.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::model::Chunk;

/// A `$…$` span with no `$` or newline inside.
static INLINE_LATEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$\n]+)\$").expect("inline latex regex"));

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// The fence language reserved for structured tool invocations.
pub const TOOL_CALL_LANG: &str = "tool_call";

/// Parse accumulated assistant text into an ordered chunk list.
pub fn parse(text: &str) -> Vec<Chunk> {
    Parser::default().run(text)
}

#[derive(Default)]
struct Parser {
    chunks: Vec<Chunk>,
    text_buf: Vec<String>,
}

impl Parser {
    fn run(mut self, text: &str) -> Vec<Chunk> {
        let mut lines: VecDeque<String> = text.split('\n').map(str::to_string).collect();

        while let Some(line) = lines.pop_front() {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                self.flush_text();
                let lang = trimmed.trim_start_matches('`').trim().to_string();
                self.scan_codeblock(lang, &mut lines);
            } else if trimmed == "$$" {
                self.flush_text();
                self.scan_latex_block(&mut lines);
            } else if trimmed.len() > 3 && trimmed.starts_with("$$") && trimmed.ends_with("$$") {
                self.flush_text();
                let body = trimmed[2..trimmed.len() - 2].trim().to_string();
                self.chunks.push(Chunk::LatexBlock { body });
            } else if let Some(rest) = trimmed.strip_prefix(THINK_OPEN) {
                self.flush_text();
                self.scan_thinking(rest, &mut lines);
            } else if is_table_row(trimmed) {
                self.flush_text();
                self.scan_table(trimmed.to_string(), &mut lines);
            } else {
                self.text_buf.push(line);
            }
        }

        self.flush_text();
        self.chunks
    }

    /// Consume fence body lines up to the closing fence (or EOF).
    fn scan_codeblock(&mut self, lang: String, lines: &mut VecDeque<String>) {
        let mut body: Vec<String> = Vec::new();
        while let Some(line) = lines.pop_front() {
            if line.trim() == "```" {
                break;
            }
            body.push(line);
        }
        self.chunks.push(close_fence(lang, body.join("\n")));
    }

    /// Consume display-math lines up to the closing `$$` (or EOF).
    fn scan_latex_block(&mut self, lines: &mut VecDeque<String>) {
        let mut body: Vec<String> = Vec::new();
        while let Some(line) = lines.pop_front() {
            if line.trim() == "$$" {
                break;
            }
            body.push(line);
        }
        self.chunks.push(Chunk::LatexBlock {
            body: body.join("\n"),
        });
    }

    /// Consume think-span lines up to `</think>` (or EOF). Content on the
    /// delimiter lines belongs to the span; anything after the close
    /// delimiter is re-queued for normal scanning.
    fn scan_thinking(&mut self, first: &str, lines: &mut VecDeque<String>) {
        if !first.is_empty() {
            lines.push_front(first.to_string());
        }
        let mut body: Vec<String> = Vec::new();
        while let Some(line) = lines.pop_front() {
            if let Some(idx) = line.find(THINK_CLOSE) {
                let before = &line[..idx];
                if !before.is_empty() {
                    body.push(before.to_string());
                }
                let tail = &line[idx + THINK_CLOSE.len()..];
                if !tail.is_empty() {
                    lines.push_front(tail.to_string());
                }
                break;
            }
            body.push(line);
        }
        self.chunks.push(Chunk::Thinking {
            body: body.join("\n"),
        });
    }

    /// Consume table rows sharing the first row's pipe count. A row with a
    /// different count closes the table and is re-queued; it may open a new
    /// table on the next scan.
    fn scan_table(&mut self, first: String, lines: &mut VecDeque<String>) {
        let count = pipe_count(&first);
        let mut rows = vec![first];
        while let Some(line) = lines.pop_front() {
            let trimmed = line.trim();
            if is_table_row(trimmed) && pipe_count(trimmed) == count {
                rows.push(trimmed.to_string());
            } else {
                lines.push_front(line);
                break;
            }
        }
        self.chunks.push(Chunk::Table { rows });
    }

    /// Emit the accumulated plain-text run, splitting out inline math.
    fn flush_text(&mut self) {
        if self.text_buf.is_empty() {
            return;
        }
        let joined = self.text_buf.join("\n");
        self.text_buf.clear();
        if joined.is_empty() {
            return;
        }
        self.chunks.push(scan_inline(&joined));
    }
}

/// Finish a fence: `tool_call` blocks with a well-formed payload become
/// `ToolCall`; anything else stays a `CodeBlock` so execution can never
/// crash on bad structured input.
fn close_fence(lang: String, body: String) -> Chunk {
    if lang == TOOL_CALL_LANG
        && let Some(chunk) = parse_tool_call(&body)
    {
        return chunk;
    }
    Chunk::CodeBlock { lang, body }
}

/// `{ "name": string, "arguments": object }`, `arguments` optional.
fn parse_tool_call(body: &str) -> Option<Chunk> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;
    let name = obj.get("name")?.as_str()?.to_string();
    let args = match obj.get("arguments") {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(serde_json::Value::Object(map)) => map.clone(),
        Some(_) => return None,
    };
    Some(Chunk::ToolCall { name, args })
}

fn is_table_row(trimmed: &str) -> bool {
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

fn pipe_count(row: &str) -> usize {
    row.matches('|').count()
}

/// Split a text run on `$…$` spans. A run with no spans stays `Text`; a run
/// that is exactly one span collapses to a bare `LatexInline`.
fn scan_inline(text: &str) -> Chunk {
    let mut parts: Vec<Chunk> = Vec::new();
    let mut last = 0;
    for m in INLINE_LATEX.find_iter(text) {
        if m.start() > last {
            parts.push(Chunk::Text {
                text: text[last..m.start()].to_string(),
            });
        }
        parts.push(Chunk::LatexInline {
            body: text[m.start() + 1..m.end() - 1].to_string(),
        });
        last = m.end();
    }
    if parts.is_empty() {
        return Chunk::Text {
            text: text.to_string(),
        };
    }
    if last < text.len() {
        parts.push(Chunk::Text {
            text: text[last..].to_string(),
        });
    }
    if parts.len() == 1 {
        return parts.remove(0);
    }
    Chunk::InlineMixed { parts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::model::render_all;

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_plain_text_single_chunk() {
        let chunks = parse("hello\nworld");
        assert_eq!(
            chunks,
            vec![Chunk::Text {
                text: "hello\nworld".into()
            }]
        );
    }

    #[test]
    fn test_fenced_codeblock() {
        let chunks = parse("before\n```py\nprint(1)\n```\nafter");
        assert_eq!(
            chunks,
            vec![
                Chunk::Text {
                    text: "before".into()
                },
                Chunk::CodeBlock {
                    lang: "py".into(),
                    body: "print(1)".into()
                },
                Chunk::Text {
                    text: "after".into()
                },
            ]
        );
    }

    #[test]
    fn test_unterminated_fence_is_provisional_codeblock() {
        let chunks = parse("```py\nprint(1)");
        assert_eq!(
            chunks,
            vec![Chunk::CodeBlock {
                lang: "py".into(),
                body: "print(1)".into()
            }]
        );
    }

    #[test]
    fn test_fence_without_language() {
        let chunks = parse("```\nraw\n```");
        assert_eq!(
            chunks,
            vec![Chunk::CodeBlock {
                lang: String::new(),
                body: "raw".into()
            }]
        );
    }

    #[test]
    fn test_console_fence_is_not_special_cased() {
        // Side-effect classification belongs to the orchestrator.
        let chunks = parse("```console\nls -la\n```");
        assert_eq!(
            chunks,
            vec![Chunk::CodeBlock {
                lang: "console".into(),
                body: "ls -la".into()
            }]
        );
    }

    #[test]
    fn test_tool_call_well_formed() {
        let chunks = parse("```tool_call\n{\"name\": \"web_search\", \"arguments\": {\"query\": \"rust\"}}\n```");
        match &chunks[0] {
            Chunk::ToolCall { name, args } => {
                assert_eq!(name, "web_search");
                assert_eq!(args["query"], "rust");
            }
            other => panic!("expected ToolCall, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_call_without_arguments_gets_empty_args() {
        let chunks = parse("```tool_call\n{\"name\": \"ping\"}\n```");
        assert_eq!(
            chunks,
            vec![Chunk::ToolCall {
                name: "ping".into(),
                args: serde_json::Map::new()
            }]
        );
    }

    #[test]
    fn test_tool_call_malformed_falls_back_to_codeblock() {
        let raw = "{\"name\": \"broken\"";
        let chunks = parse(&format!("```tool_call\n{raw}\n```"));
        assert_eq!(
            chunks,
            vec![Chunk::CodeBlock {
                lang: "tool_call".into(),
                body: raw.into()
            }]
        );
    }

    #[test]
    fn test_tool_call_non_object_arguments_falls_back() {
        let raw = "{\"name\": \"x\", \"arguments\": [1, 2]}";
        let chunks = parse(&format!("```tool_call\n{raw}\n```"));
        assert!(matches!(chunks[0], Chunk::CodeBlock { .. }));
    }

    #[test]
    fn test_table_rows_grouped_by_pipe_count() {
        let chunks = parse("| a | b |\n|---|---|\n| 1 | 2 |");
        assert_eq!(
            chunks,
            vec![Chunk::Table {
                rows: vec!["| a | b |".into(), "|---|---|".into(), "| 1 | 2 |".into()]
            }]
        );
    }

    #[test]
    fn test_table_split_on_differing_pipe_count() {
        let chunks = parse("| a | b |\n| c |");
        assert_eq!(
            chunks,
            vec![
                Chunk::Table {
                    rows: vec!["| a | b |".into()]
                },
                Chunk::Table {
                    rows: vec!["| c |".into()]
                },
            ]
        );
    }

    #[test]
    fn test_table_then_text() {
        let chunks = parse("| a |\ndone");
        assert_eq!(
            chunks,
            vec![
                Chunk::Table {
                    rows: vec!["| a |".into()]
                },
                Chunk::Text {
                    text: "done".into()
                },
            ]
        );
    }

    #[test]
    fn test_latex_block_multiline() {
        let chunks = parse("$$\nx^2 + y^2\n$$");
        assert_eq!(
            chunks,
            vec![Chunk::LatexBlock {
                body: "x^2 + y^2".into()
            }]
        );
    }

    #[test]
    fn test_latex_block_single_line() {
        let chunks = parse("$$e = mc^2$$");
        assert_eq!(
            chunks,
            vec![Chunk::LatexBlock {
                body: "e = mc^2".into()
            }]
        );
    }

    #[test]
    fn test_latex_block_unterminated() {
        let chunks = parse("$$\nx +");
        assert_eq!(chunks, vec![Chunk::LatexBlock { body: "x +".into() }]);
    }

    #[test]
    fn test_inline_latex_produces_inline_mixed() {
        let chunks = parse("the area is $\\pi r^2$ exactly");
        assert_eq!(
            chunks,
            vec![Chunk::InlineMixed {
                parts: vec![
                    Chunk::Text {
                        text: "the area is ".into()
                    },
                    Chunk::LatexInline {
                        body: "\\pi r^2".into()
                    },
                    Chunk::Text {
                        text: " exactly".into()
                    },
                ]
            }]
        );
    }

    #[test]
    fn test_lone_inline_span_collapses_to_latex_inline() {
        let chunks = parse("$x$");
        assert_eq!(chunks, vec![Chunk::LatexInline { body: "x".into() }]);
    }

    #[test]
    fn test_single_dollar_stays_text() {
        let chunks = parse("it costs $5 today");
        assert_eq!(
            chunks,
            vec![Chunk::Text {
                text: "it costs $5 today".into()
            }]
        );
    }

    #[test]
    fn test_thinking_block() {
        let chunks = parse("<think>\nhmm\nokay\n</think>\nanswer");
        assert_eq!(
            chunks,
            vec![
                Chunk::Thinking {
                    body: "hmm\nokay".into()
                },
                Chunk::Text {
                    text: "answer".into()
                },
            ]
        );
    }

    #[test]
    fn test_thinking_inline_delimiters() {
        let chunks = parse("<think>quick</think>done");
        assert_eq!(
            chunks,
            vec![
                Chunk::Thinking {
                    body: "quick".into()
                },
                Chunk::Text {
                    text: "done".into()
                },
            ]
        );
    }

    #[test]
    fn test_thinking_unterminated() {
        let chunks = parse("<think>\nstill going");
        assert_eq!(
            chunks,
            vec![Chunk::Thinking {
                body: "still going".into()
            }]
        );
    }

    #[test]
    fn test_fence_inside_thinking_is_not_a_fence() {
        let chunks = parse("<think>\n```py\n</think>");
        assert_eq!(chunks, vec![Chunk::Thinking { body: "```py".into() }]);
    }

    #[test]
    fn test_parse_is_idempotent_through_render() {
        let inputs = [
            "plain text",
            "a\n\nb",
            "before\n```py\nprint(1)\n```\nafter",
            "```py\nprint(1)",
            "| a | b |\n|---|---|\n| 1 | 2 |",
            "$$\nx^2\n$$",
            "inline $x$ math",
            "$x$",
            "<think>\nhmm\n</think>\nanswer",
            "```tool_call\n{\"name\": \"t\", \"arguments\": {\"k\": 1}}\n```",
            "```tool_call\n{broken\n```",
            "mixed $a$ and\n```sh\nls\n```\n| x |",
        ];
        for input in inputs {
            let once = parse(input);
            let twice = parse(&render_all(&once));
            assert_eq!(once, twice, "not idempotent for input: {input:?}");
        }
    }
}
