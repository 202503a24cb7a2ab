//! Incremental text synchronization.
//!
//! `didChange` delivers either whole-document replacements or range edits in
//! UTF-16 code-unit positions. Edits apply in array order, each against the
//! result of the previous one, so the line index is rebuilt per change.

use tower_lsp::lsp_types::TextDocumentContentChangeEvent;

use csharp_analysis::text::LineIndex;

/// Apply a `didChange` payload to `text`, returning the new buffer.
pub fn apply_content_changes(text: &str, changes: &[TextDocumentContentChangeEvent]) -> String {
    let mut current = text.to_string();
    for change in changes {
        match change.range {
            Some(range) => {
                let index = LineIndex::new(&current);
                let start = index.offset_of(&current, range.start);
                let end = index.offset_of(&current, range.end);
                let (start, end) = (start.min(end), start.max(end));
                current.replace_range(start..end, &change.text);
            }
            None => {
                current = change.text.clone();
            }
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    fn change(range: Option<((u32, u32), (u32, u32))>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: range.map(|((sl, sc), (el, ec))| Range {
                start: Position::new(sl, sc),
                end: Position::new(el, ec),
            }),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn full_replacement_discards_previous_text() {
        let result = apply_content_changes("old", &[change(None, "brand new")]);
        assert_eq!(result, "brand new");
    }

    #[test]
    fn ranged_insert_at_utf16_position() {
        let text = "class C\n{\n}\n";
        let result = apply_content_changes(text, &[change(Some(((1, 1), (1, 1))), "\n    int x;")]);
        assert_eq!(result, "class C\n{\n    int x;\n}\n");
    }

    #[test]
    fn sequential_changes_apply_against_intermediate_text() {
        let text = "ab";
        let result = apply_content_changes(
            text,
            &[
                change(Some(((0, 1), (0, 1))), "X"),
                // Position 3 only exists after the first change landed.
                change(Some(((0, 3), (0, 3))), "Y"),
            ],
        );
        assert_eq!(result, "aXbY");
    }

    #[test]
    fn utf16_columns_count_surrogate_pairs() {
        // '𐐷' occupies two UTF-16 units; column 3 is after the closing quote.
        let text = "\"𐐷\"x";
        let result = apply_content_changes(text, &[change(Some(((0, 4), (0, 5))), "y")]);
        assert_eq!(result, "\"𐐷\"y");
    }

    #[test]
    fn deletion_by_range() {
        let text = "int xyz = 1;";
        let result = apply_content_changes(text, &[change(Some(((0, 4), (0, 7))), "n")]);
        assert_eq!(result, "int n = 1;");
    }
}
