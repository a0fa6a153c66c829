//! Positional diff between successive parses.
//!
//! Chunk boundaries shift as streamed text accrues (a table row may split
//! differently once more lines arrive), so positions cannot be trusted past
//! the first divergence: everything from the first mismatch on is replaced,
//! not patched.

use crate::chunk::model::Chunk;

/// Fence languages whose renderers cannot be mutated in place; a same-kind
/// content change still replaces the tail for these.
const HARD_UPDATE_LANGS: &[&str] = &["video", "image", "chart", "file"];

/// One reconciliation instruction for position `i`.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `old[i]` and `new[i]` are identical; nothing to do.
    Keep(usize),
    /// Same soft kind at `i`; the renderer may update the widget in place.
    UpdateInPlace(usize, Chunk),
    /// Positions from `i` on no longer correspond; rebuild from the tail.
    ReplaceFrom(usize, Vec<Chunk>),
}

/// Diff `old` against `new` by index.
///
/// Emits `Keep`/`UpdateInPlace` for the trusted prefix and a single
/// `ReplaceFrom` for everything after the first mismatch (including pure
/// appends and shrinks). `reconcile(old, old)` yields only `Keep` ops.
pub fn reconcile(old: &[Chunk], new: &[Chunk]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut i = 0;

    while i < old.len() && i < new.len() {
        let (prev, next) = (&old[i], &new[i]);
        if prev == next {
            ops.push(Op::Keep(i));
        } else if soft_match(prev, next) {
            ops.push(Op::UpdateInPlace(i, next.clone()));
        } else {
            ops.push(Op::ReplaceFrom(i, new[i..].to_vec()));
            return ops;
        }
        i += 1;
    }

    if i < new.len() {
        ops.push(Op::ReplaceFrom(i, new[i..].to_vec()));
    } else if i < old.len() {
        ops.push(Op::ReplaceFrom(i, Vec::new()));
    }
    ops
}

/// Soft kinds tolerate in-place content updates: `Text`, `Thinking`, and
/// `CodeBlock` with an unchanged, in-place-renderable language.
fn soft_match(old: &Chunk, new: &Chunk) -> bool {
    match (old, new) {
        (Chunk::Text { .. }, Chunk::Text { .. }) => true,
        (Chunk::Thinking { .. }, Chunk::Thinking { .. }) => true,
        (Chunk::CodeBlock { lang: a, .. }, Chunk::CodeBlock { lang: b, .. }) => {
            a == b && !HARD_UPDATE_LANGS.contains(&a.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Chunk {
        Chunk::Text { text: s.into() }
    }

    fn code(lang: &str, body: &str) -> Chunk {
        Chunk::CodeBlock {
            lang: lang.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_identical_lists_yield_only_keep() {
        let chunks = vec![text("a"), code("py", "x"), text("b")];
        let ops = reconcile(&chunks, &chunks);
        assert_eq!(ops, vec![Op::Keep(0), Op::Keep(1), Op::Keep(2)]);
    }

    #[test]
    fn test_empty_lists() {
        assert!(reconcile(&[], &[]).is_empty());
    }

    #[test]
    fn test_growing_text_updates_in_place() {
        let old = vec![text("hel")];
        let new = vec![text("hello")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::UpdateInPlace(0, text("hello"))]
        );
    }

    #[test]
    fn test_growing_codeblock_same_lang_updates_in_place() {
        let old = vec![code("py", "prin")];
        let new = vec![code("py", "print(1)")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::UpdateInPlace(0, code("py", "print(1)"))]
        );
    }

    #[test]
    fn test_codeblock_lang_change_replaces_tail() {
        let old = vec![code("", "x"), text("tail")];
        let new = vec![code("py", "x"), text("tail")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::ReplaceFrom(0, new.clone())]
        );
    }

    #[test]
    fn test_hard_language_never_updates_in_place() {
        let old = vec![code("image", "a.png")];
        let new = vec![code("image", "a.png\nb.png")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::ReplaceFrom(0, new.clone())]
        );
    }

    #[test]
    fn test_kind_mismatch_replaces_everything_after() {
        let old = vec![text("a"), text("| not yet a table"), text("c")];
        let new = vec![
            text("a"),
            Chunk::Table {
                rows: vec!["| a |".into()],
            },
            text("c"),
        ];
        let ops = reconcile(&old, &new);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], Op::Keep(0));
        assert_eq!(ops[1], Op::ReplaceFrom(1, new[1..].to_vec()));
    }

    #[test]
    fn test_append_is_replace_of_tail() {
        let old = vec![text("a")];
        let new = vec![text("a"), code("py", "x")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::Keep(0), Op::ReplaceFrom(1, vec![code("py", "x")])]
        );
    }

    #[test]
    fn test_shrink_truncates_tail() {
        let old = vec![text("a"), text("b")];
        let new = vec![text("a")];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::Keep(0), Op::ReplaceFrom(1, Vec::new())]
        );
    }

    #[test]
    fn test_table_content_change_is_hard() {
        let old = vec![Chunk::Table {
            rows: vec!["| a |".into()],
        }];
        let new = vec![Chunk::Table {
            rows: vec!["| a |".into(), "| b |".into()],
        }];
        assert_eq!(
            reconcile(&old, &new),
            vec![Op::ReplaceFrom(0, new.clone())]
        );
    }
}
