//! Code actions: lazy resolution when the client supports it, eager
//! otherwise.
//!
//! Unresolved actions carry a JSON-text `data` payload naming the document
//! and range; `codeAction/resolve` re-enumerates the same fixes for that
//! span and matches the chosen one by title. Eager resolution applies the
//! fix to a cloned solution and diffs the result into workspace edits.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, CodeActionResponse, ClientCapabilities,
    Range, Url, WorkspaceEdit,
};

use csharp_analysis::backend::{CodeFix, CodeFixKind, CompilerBackend};

use crate::convert;
use crate::features::rename::solution_workspace_edit;
use crate::scope::{ReadScope, ScopeDocument};
use crate::state::StateSnapshot;

/// Payload carried by unresolved actions, serialized as JSON text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeActionData {
    pub document_uri: Url,
    pub range: Range,
}

/// Actions available for a range, preferred-first.
pub fn code_actions<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    uri: &Url,
    range: Range,
) -> CodeActionResponse {
    let ScopeDocument::Source(source) = document else {
        // Decompiled documents are read-only.
        return Vec::new();
    };
    let Some(solution) = scope.snapshot().solution.as_ref() else {
        return Vec::new();
    };
    let span = convert::range_to_span(&source.text, range);
    let mut fixes = backend.code_fixes(solution, source, span);
    fixes.sort_by_key(|fix| !fix.is_preferred);

    let lazy = client_resolves_edits(scope.snapshot());
    fixes
        .into_iter()
        .map(|fix| {
            let mut action = CodeAction {
                title: fix.title.clone(),
                kind: Some(action_kind(fix.kind)),
                is_preferred: Some(fix.is_preferred),
                ..CodeAction::default()
            };
            if lazy {
                let data = CodeActionData {
                    document_uri: uri.clone(),
                    range,
                };
                action.data = serde_json::to_string(&data)
                    .ok()
                    .map(serde_json::Value::String);
            } else {
                action.edit = resolve_fix(backend, scope.snapshot(), &fix);
            }
            CodeActionOrCommand::CodeAction(action)
        })
        .collect()
}

/// Fill in the edit of an action returned unresolved. Unknown or stale
/// payloads leave the action untouched rather than erroring.
pub fn resolve_code_action<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    mut action: CodeAction,
) -> CodeAction {
    let Some(data) = action.data.clone().and_then(parse_data) else {
        return action;
    };
    let Some(ScopeDocument::Source(source)) = scope.document_for_uri(&data.document_uri) else {
        return action;
    };
    let Some(solution) = scope.snapshot().solution.as_ref() else {
        return action;
    };
    let span = convert::range_to_span(&source.text, data.range);
    let fixes = backend.code_fixes(solution, &source, span);
    if let Some(fix) = fixes.into_iter().find(|fix| fix.title == action.title) {
        action.edit = resolve_fix(backend, scope.snapshot(), &fix);
    }
    action
}

fn parse_data(data: serde_json::Value) -> Option<CodeActionData> {
    match data {
        serde_json::Value::String(text) => serde_json::from_str(&text).ok(),
        other => serde_json::from_value(other).ok(),
    }
}

fn resolve_fix<B: CompilerBackend>(
    backend: &B,
    snapshot: &StateSnapshot,
    fix: &CodeFix,
) -> Option<WorkspaceEdit> {
    let solution = snapshot.solution.as_ref()?;
    let fixed = backend.apply_code_fix(solution, fix);
    Some(solution_workspace_edit(solution, &fixed, snapshot))
}

fn action_kind(kind: CodeFixKind) -> CodeActionKind {
    match kind {
        CodeFixKind::QuickFix => CodeActionKind::QUICKFIX,
        CodeFixKind::Refactoring => CodeActionKind::REFACTOR,
    }
}

/// True when the client advertises `dataSupport` and resolve support that
/// covers the `edit` property.
fn client_resolves_edits(snapshot: &StateSnapshot) -> bool {
    fn check(capabilities: &ClientCapabilities) -> Option<bool> {
        let code_action = capabilities.text_document.as_ref()?.code_action.as_ref()?;
        let resolves_edit = code_action
            .resolve_support
            .as_ref()
            .is_some_and(|support| support.properties.iter().any(|p| p == "edit"));
        Some(code_action.data_support == Some(true) && resolves_edit)
    }
    snapshot
        .client_capabilities
        .as_ref()
        .and_then(|caps| check(caps))
        .unwrap_or(false)
}
