//! Whitespace formatting: brace-depth reindentation.
//!
//! The formatter normalizes leading indentation to four spaces per brace
//! level and trims trailing whitespace. It never reflows tokens, so every
//! edit it produces is confined to the whitespace of a single line.

use crate::syntax::code_mask;
use crate::text::{LineIndex, TextEditSpan};

pub const INDENT_WIDTH: usize = 4;

/// Formatting edits for the whole document.
pub fn format_document(text: &str) -> Vec<TextEditSpan> {
    format_line_range(text, 0, usize::MAX)
}

/// Formatting edits restricted to lines `start_line..=end_line`.
pub fn format_lines(text: &str, start_line: usize, end_line: usize) -> Vec<TextEditSpan> {
    format_line_range(text, start_line, end_line)
}

/// Formatting edits for the single line containing `offset`, produced when
/// the editor reports a trigger character was typed.
pub fn format_on_type(text: &str, offset: usize, trigger: char) -> Vec<TextEditSpan> {
    if !matches!(trigger, ';' | '}' | ')') {
        return Vec::new();
    }
    let index = LineIndex::new(text);
    let line = index.line_of(offset);
    format_line_range(text, line, line)
}

fn format_line_range(text: &str, start_line: usize, end_line: usize) -> Vec<TextEditSpan> {
    let masked = code_mask(text);
    let index = LineIndex::new(text);
    let mut edits = Vec::new();
    let mut depth = 0usize;

    for line in 0..index.line_count() {
        let line_start = index.line_start(line);
        let line_end = match line + 1 < index.line_count() {
            true => index.line_start(line + 1) - 1,
            false => text.len(),
        };
        if line_start >= line_end {
            continue;
        }
        let raw = &text[line_start..line_end];
        let masked_line = &masked[line_start..line_end];
        let trimmed = raw.trim_end_matches('\r');
        let content = trimmed.trim_start();

        // Closers at the start of the line pull it back one level.
        let mut line_depth = depth;
        for ch in masked_line.trim_start().chars() {
            if ch == '}' || ch == ')' {
                line_depth = line_depth.saturating_sub(1);
            } else {
                break;
            }
        }

        if !content.is_empty() && line >= start_line && line <= end_line {
            let desired: String = " ".repeat(line_depth * INDENT_WIDTH);
            let current_len = trimmed.len() - content.len();
            let current = &trimmed[..current_len];
            // Preprocessor directives stay in column zero.
            let desired = if content.starts_with('#') {
                String::new()
            } else {
                desired
            };
            if current != desired {
                edits.push(TextEditSpan {
                    start: line_start,
                    end: line_start + current_len,
                    new_text: desired,
                });
            }
            let content_end = line_start + trimmed.trim_end().len();
            if content_end < line_start + trimmed.len() {
                edits.push(TextEditSpan {
                    start: content_end,
                    end: line_start + trimmed.len(),
                    new_text: String::new(),
                });
            }
        }

        for ch in masked_line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    edits
}
