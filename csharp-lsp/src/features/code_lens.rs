//! Code lenses: one reference-count lens per declaration.
//!
//! Listing is cheap and unresolved (`data` only); counting references for a
//! lens happens in `codeLens/resolve`, which the server wraps in a ten
//! second budget wired to the same cancellation token the reference walk
//! checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{CodeLens, Command, Position, Url};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::cancel::CancelToken;
use csharp_analysis::syntax::{self, CsSymbolKind};

use crate::convert;
use crate::scope::{symbol_at_position, ReadScope, ScopeDocument};

/// Editor-side command used to display found references.
pub const SHOW_REFERENCES_COMMAND: &str = "csharp.showReferences";

/// Budget for resolving a single lens.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload carried by unresolved lenses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLensData {
    pub document_uri: Url,
    pub position: Position,
}

/// One lens per declaration in the document, commandless until resolved.
pub fn code_lenses<B: CompilerBackend>(
    backend: &B,
    document: &ScopeDocument,
    uri: &Url,
) -> Vec<CodeLens> {
    let text = document.text();
    let declarations = backend.document_declarations(document.document());
    syntax::flatten(&declarations)
        .into_iter()
        .filter(|decl| decl.kind != CsSymbolKind::Namespace)
        .map(|decl| {
            let range = convert::span_to_range(text, decl.selection_span);
            let data = CodeLensData {
                document_uri: uri.clone(),
                position: range.start,
            };
            CodeLens {
                range,
                command: None,
                data: serde_json::to_value(&data).ok(),
            }
        })
        .collect()
}

/// Resolve a lens into its reference-count command. A lens whose document or
/// symbol vanished resolves to a zero count rather than an error.
pub fn resolve_code_lens<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    mut lens: CodeLens,
    cancel: &CancelToken,
) -> CodeLens {
    let count = reference_count(backend, scope, &lens, cancel).unwrap_or(0);
    lens.command = Some(Command {
        title: format!("{count} Reference(s)"),
        command: SHOW_REFERENCES_COMMAND.to_string(),
        arguments: None,
    });
    lens
}

fn reference_count<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    lens: &CodeLens,
    cancel: &CancelToken,
) -> Option<usize> {
    let data: CodeLensData = serde_json::from_value(lens.data.clone()?).ok()?;
    let document = scope.document_for_uri(&data.document_uri)?;
    let symbol = symbol_at_position(backend, scope.snapshot(), &document, data.position)?;
    let solution = scope.snapshot().solution.as_ref()?;
    let references = backend.find_references(solution, &symbol, cancel).ok()?;
    Some(references.len())
}
