//! Rename, and the solution-diff machinery it shares with code actions.
//!
//! The backend produces a whole new solution; this module diffs it against
//! the snapshot the handler started from and ships the difference as a
//! `WorkspaceEdit`, shaped to what the client can consume (versioned
//! `documentChanges` or the plain `changes` map).

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    DocumentChanges, OneOf, OptionalVersionedTextDocumentIdentifier, Position, TextDocumentEdit,
    TextEdit, Url, WorkspaceEdit,
};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::cancel::CancelToken;
use csharp_analysis::solution::{DocumentKind, Solution};
use csharp_analysis::text::{LineIndex, TextSpan};

use crate::scope::{symbol_at_position, ReadScope, ScopeDocument};
use crate::state::StateSnapshot;

/// Rename the symbol at `position` across the solution. Only meaningful on
/// user documents; metadata documents are read-only.
pub fn rename<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
    new_name: &str,
    cancel: &CancelToken,
) -> Option<WorkspaceEdit> {
    if matches!(document, ScopeDocument::Metadata(_)) {
        return None;
    }
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    let solution = scope.snapshot().solution.as_ref()?;
    let renamed = backend.rename(solution, &symbol, new_name, cancel).ok()?;
    Some(solution_workspace_edit(solution, &renamed, scope.snapshot()))
}

/// Diff two solutions into a `WorkspaceEdit`. Document versions are
/// attached for editor-open documents when the client takes
/// `documentChanges`.
pub fn solution_workspace_edit(
    old: &Solution,
    new: &Solution,
    snapshot: &StateSnapshot,
) -> WorkspaceEdit {
    let mut per_document: Vec<(Url, Vec<TextEdit>)> = Vec::new();
    for (_, document) in old.documents() {
        if document.kind != DocumentKind::Source {
            continue;
        }
        let Some(updated) = new.document(document.id) else {
            continue;
        };
        if updated.text == document.text {
            continue;
        }
        let Ok(uri) = Url::from_file_path(&document.path) else {
            continue;
        };
        let edits = diff_texts(&document.text, &updated.text);
        if !edits.is_empty() {
            per_document.push((uri, edits));
        }
    }

    if supports_document_changes(snapshot) {
        let edits = per_document
            .into_iter()
            .map(|(uri, edits)| TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    version: snapshot.open_documents.get(&uri).copied(),
                    uri,
                },
                edits: edits.into_iter().map(OneOf::Left).collect(),
            })
            .collect();
        WorkspaceEdit {
            document_changes: Some(DocumentChanges::Edits(edits)),
            ..WorkspaceEdit::default()
        }
    } else {
        let changes: HashMap<Url, Vec<TextEdit>> = per_document.into_iter().collect();
        WorkspaceEdit {
            changes: Some(changes),
            ..WorkspaceEdit::default()
        }
    }
}

fn supports_document_changes(snapshot: &StateSnapshot) -> bool {
    snapshot
        .client_capabilities
        .as_ref()
        .and_then(|caps| caps.workspace.as_ref())
        .and_then(|workspace| workspace.workspace_edit.as_ref())
        .and_then(|edit| edit.document_changes)
        .unwrap_or(false)
}

/// Single minimal edit between two versions of a text: strip the common
/// prefix and suffix, replace what remains. Positions address the old text.
fn diff_texts(old: &str, new: &str) -> Vec<TextEdit> {
    if old == new {
        return Vec::new();
    }
    let prefix = old
        .char_indices()
        .zip(new.char_indices())
        .take_while(|((_, a), (_, b))| a == b)
        .last()
        .map(|((idx, ch), _)| idx + ch.len_utf8())
        .unwrap_or(0);

    let old_rest = &old[prefix..];
    let new_rest = &new[prefix..];
    let suffix = old_rest
        .chars()
        .rev()
        .zip(new_rest.chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(ch, _)| ch.len_utf8())
        .sum::<usize>();

    let span = TextSpan::new(prefix, old.len() - suffix);
    let replacement = &new[prefix..new.len() - suffix];
    let index = LineIndex::new(old);
    vec![TextEdit {
        range: tower_lsp::lsp_types::Range {
            start: index.position_of(old, span.start),
            end: index.position_of(old, span.end),
        },
        new_text: replacement.to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;
    use crate::state::{spawn_state_actor, StateEvent, StateHandle};
    use csharp_analysis::test_support::sample_solution;
    use csharp_analysis::ScannerBackend;
    use std::sync::Arc;
    use tower_lsp::async_trait;
    use tower_lsp::lsp_types::{Diagnostic, MessageType};

    #[derive(Clone, Default)]
    struct NoopClient;

    #[async_trait]
    impl crate::server::LspClient for NoopClient {
        async fn publish_diagnostics(&self, _: Url, _: Vec<Diagnostic>, _: Option<i32>) {}
        async fn show_message(&self, _: MessageType, _: String) {}
    }

    fn state_with_sample() -> StateHandle {
        let state = spawn_state_actor(NoopClient, Arc::new(ScannerBackend::new()));
        state.emit(StateEvent::SolutionChange(Arc::new(sample_solution())));
        state
    }

    /// Apply edits back onto text to confirm the diff reconstructs the
    /// renamed solution.
    fn apply_workspace_edit_to(text: &str, edits: &[TextEdit]) -> String {
        let mut spans: Vec<(TextSpan, &str)> = edits
            .iter()
            .map(|edit| (convert::range_to_span(text, edit.range), edit.new_text.as_str()))
            .collect();
        spans.sort_by_key(|(span, _)| span.start);
        let mut result = text.to_string();
        for (span, replacement) in spans.into_iter().rev() {
            result.replace_range(span.start..span.end, replacement);
        }
        result
    }

    #[test]
    fn diff_is_minimal_and_reconstructs() {
        let old = "class Greeter { Greeter g; }";
        let new = "class Welcomer { Welcomer g; }";
        let edits = diff_texts(old, new);
        assert_eq!(edits.len(), 1);
        assert_eq!(apply_workspace_edit_to(old, &edits), new);
    }

    #[test]
    fn identical_texts_diff_to_nothing() {
        assert!(diff_texts("same", "same").is_empty());
    }

    #[tokio::test]
    async fn rename_produces_edits_for_every_referencing_file() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Greeter.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let text = document.text();
        let offset = text.find("class Greeter").unwrap() + "class ".len();
        let position = LineIndex::new(text).position_of(text, offset);

        let edit = rename(
            &backend,
            &scope,
            &document,
            position,
            "Welcomer",
            &CancelToken::new(),
        )
        .unwrap();
        let changes = edit.changes.expect("plain changes without capabilities");
        // Greeter.cs declares it, Program.cs constructs it.
        assert_eq!(changes.len(), 2);
        for (uri, edits) in &changes {
            let document = scope.document_for_uri(uri).unwrap();
            let applied = apply_workspace_edit_to(document.text(), edits);
            assert!(!applied.contains("Greeter"));
            assert!(applied.contains("Welcomer"));
        }
    }

    #[tokio::test]
    async fn document_changes_carry_open_versions_when_supported() {
        let state = state_with_sample();
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        state.emit(StateEvent::ClientCapabilityChange(Box::new(
            serde_json::from_value(serde_json::json!({
                "workspace": { "workspaceEdit": { "documentChanges": true } }
            }))
            .unwrap(),
        )));
        state.emit(StateEvent::OpenDocVersionAdd {
            uri: uri.clone(),
            version: 7,
        });

        let scope = state.read_scope().await.unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let text = document.text();
        let offset = text.find("Greeter()").unwrap();
        let position = LineIndex::new(text).position_of(text, offset);

        let edit = rename(
            &backend,
            &scope,
            &document,
            position,
            "Welcomer",
            &CancelToken::new(),
        )
        .unwrap();
        let Some(DocumentChanges::Edits(edits)) = edit.document_changes else {
            panic!("expected documentChanges");
        };
        let program = edits
            .iter()
            .find(|e| e.text_document.uri == uri)
            .expect("edit for Program.cs");
        assert_eq!(program.text_document.version, Some(7));
    }

    #[tokio::test]
    async fn rename_on_metadata_documents_is_refused() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let entry = Arc::new(crate::state::MetadataEntry {
            info: crate::state::MetadataInfo {
                project_name: "Sample".into(),
                assembly_name: "System.Runtime".into(),
                symbol_name: "Console".into(),
                source: "class Console { }".into(),
            },
            document: csharp_analysis::solution::Document::metadata(
                "/metadata/Console.cs".into(),
                "class Console { }".into(),
            ),
        });
        let document = ScopeDocument::Metadata(entry);
        let backend = ScannerBackend::new();
        assert!(rename(
            &backend,
            &scope,
            &document,
            Position::new(0, 7),
            "Terminal",
            &CancelToken::new(),
        )
        .is_none());
    }
}
