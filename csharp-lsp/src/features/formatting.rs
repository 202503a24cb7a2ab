//! Document, range and on-type formatting.

use tower_lsp::lsp_types::{Position, Range, TextEdit};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::text::LineIndex;

use crate::convert;
use crate::scope::ScopeDocument;

pub fn formatting<B: CompilerBackend>(backend: &B, document: &ScopeDocument) -> Vec<TextEdit> {
    let edits = backend.format_document(document.document());
    convert::edits_to_lsp(document.text(), &edits)
}

pub fn range_formatting<B: CompilerBackend>(
    backend: &B,
    document: &ScopeDocument,
    range: Range,
) -> Vec<TextEdit> {
    let (start_line, end_line) = line_range(range);
    let edits = backend.format_range(document.document(), start_line, end_line);
    convert::edits_to_lsp(document.text(), &edits)
}

pub fn on_type_formatting<B: CompilerBackend>(
    backend: &B,
    document: &ScopeDocument,
    position: Position,
    character: &str,
) -> Vec<TextEdit> {
    let Some(trigger) = character.chars().next() else {
        return Vec::new();
    };
    let text = document.text();
    let offset = LineIndex::new(text).offset_of(text, position);
    let edits = backend.format_on_type(document.document(), offset, trigger);
    convert::edits_to_lsp(text, &edits)
}

/// Inclusive line range covered by an LSP range. An end position in column
/// zero excludes its line, matching how editors send line selections.
fn line_range(range: Range) -> (usize, usize) {
    let start = range.start.line as usize;
    let mut end = range.end.line as usize;
    if range.end.character == 0 && end > start {
        end -= 1;
    }
    (start, end)
}
