//! Completion items from backend candidates.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionList, CompletionResponse, InsertTextFormat, Position,
};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::text::LineIndex;

use crate::convert;
use crate::scope::{ReadScope, ScopeDocument};

/// Completion at a position. Always a complete list (`isIncomplete: false`),
/// plain-text insertion, kind derived from the candidate's first Roslyn tag.
pub fn completion<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
) -> Option<CompletionResponse> {
    let solution = scope.snapshot().solution.as_ref()?;
    let text = document.text();
    let offset = LineIndex::new(text).offset_of(text, position);
    let items: Vec<CompletionItem> = backend
        .completions(solution, document.document(), offset)
        .into_iter()
        .map(|candidate| CompletionItem {
            label: candidate.label,
            kind: candidate
                .tags
                .first()
                .map(|tag| convert::completion_kind(tag)),
            detail: candidate.detail,
            insert_text: candidate.insert_text,
            insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
            ..CompletionItem::default()
        })
        .collect();
    Some(CompletionResponse::List(CompletionList {
        is_incomplete: false,
        items,
    }))
}
