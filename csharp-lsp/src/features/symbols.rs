//! Document and workspace symbol listings.

use tower_lsp::lsp_types::{Location, SymbolInformation, Url};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::syntax::{self, Declaration};

use crate::convert;
use crate::scope::{ReadScope, ScopeDocument};

/// Flat symbol list for one document, in declaration order. The scanner
/// never emits attribute lists, so they are naturally suppressed here.
pub fn document_symbols<B: CompilerBackend>(
    backend: &B,
    document: &ScopeDocument,
    uri: &Url,
) -> Vec<SymbolInformation> {
    let text = document.text();
    let declarations = backend.document_declarations(document.document());
    syntax::flatten(&declarations)
        .into_iter()
        .map(|decl| symbol_information(decl, uri.clone(), text))
        .collect()
}

/// Up to `limit` declarations matching `query` across the solution.
pub fn workspace_symbols<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    query: &str,
    limit: usize,
) -> Vec<SymbolInformation> {
    let Some(solution) = scope.snapshot().solution.as_ref() else {
        return Vec::new();
    };
    backend
        .search_declarations(solution, query, limit)
        .into_iter()
        .filter_map(|(document_id, decl)| {
            let document = solution.document(document_id)?;
            let uri = Url::from_file_path(&document.path).ok()?;
            Some(symbol_information(&decl, uri, &document.text))
        })
        .collect()
}

#[allow(deprecated)]
fn symbol_information(decl: &Declaration, uri: Url, text: &str) -> SymbolInformation {
    SymbolInformation {
        name: decl.name.clone(),
        kind: decl.kind.lsp_symbol_kind(),
        tags: None,
        deprecated: None,
        location: Location {
            uri,
            range: convert::span_to_range(text, decl.selection_span),
        },
        container_name: decl.container.clone(),
    }
}
