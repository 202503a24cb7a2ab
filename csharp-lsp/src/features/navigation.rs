//! Definition, implementation, references and document highlight.

use tower_lsp::lsp_types::{
    DocumentHighlight, DocumentHighlightKind, GotoDefinitionResponse, Location, Position,
};

use csharp_analysis::backend::{CompilerBackend, SymbolLocation};
use csharp_analysis::cancel::CancelToken;
use csharp_analysis::references;
use csharp_analysis::syntax::CsSymbolKind;

use crate::convert;
use crate::metadata;
use crate::scope::{symbol_at_position, ReadScope, ScopeDocument};

/// Definition locations for the symbol under the cursor. Source definitions
/// map straight to `file:` locations; metadata definitions go through the
/// decompiled-document cache.
pub fn definition<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    let solution = scope.snapshot().solution.as_ref()?;
    let mut locations = Vec::new();
    for location in &symbol.locations {
        match location {
            SymbolLocation::Source { document, span } => {
                if let Some(location) = convert::source_location(solution, *document, *span) {
                    locations.push(location);
                }
            }
            SymbolLocation::Metadata(metadata_location) => {
                if let Some((uri, range)) =
                    metadata::resolve_metadata_location(scope, backend, metadata_location)
                {
                    locations.push(Location { uri, range });
                }
            }
        }
    }
    if locations.is_empty() {
        None
    } else {
        Some(GotoDefinitionResponse::Array(locations))
    }
}

/// Implementations of the symbol under the cursor (types whose base list
/// names it).
pub fn implementation<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
    cancel: &CancelToken,
) -> Option<GotoDefinitionResponse> {
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    let solution = scope.snapshot().solution.as_ref()?;
    let implementations = backend.find_implementations(solution, &symbol, cancel).ok()?;
    let locations: Vec<Location> = implementations
        .iter()
        .filter_map(|location| match location {
            SymbolLocation::Source { document, span } => {
                convert::source_location(solution, *document, *span)
            }
            SymbolLocation::Metadata(_) => None,
        })
        .collect();
    if locations.is_empty() {
        None
    } else {
        Some(GotoDefinitionResponse::Array(locations))
    }
}

/// Every reference to the symbol across the solution.
pub fn references_in_solution<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
    cancel: &CancelToken,
) -> Option<Vec<Location>> {
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    let solution = scope.snapshot().solution.as_ref()?;
    let found = backend.find_references(solution, &symbol, cancel).ok()?;
    let locations: Vec<Location> = found
        .into_iter()
        .filter_map(|(document, span)| convert::source_location(solution, document, span))
        .collect();
    Some(locations)
}

/// Occurrences of the symbol within the requested document only. Namespaces
/// are skipped.
pub fn document_highlights<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
) -> Option<Vec<DocumentHighlight>> {
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    if symbol.kind == CsSymbolKind::Namespace {
        return None;
    }
    let text = document.text();
    let highlights: Vec<DocumentHighlight> = references::document_references(text, &symbol.name)
        .into_iter()
        .map(|span| DocumentHighlight {
            range: convert::span_to_range(text, span),
            kind: Some(DocumentHighlightKind::READ),
        })
        .collect();
    Some(highlights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{spawn_state_actor, StateEvent, StateHandle};
    use csharp_analysis::test_support::sample_solution;
    use csharp_analysis::text::LineIndex;
    use csharp_analysis::ScannerBackend;
    use std::sync::Arc;
    use tower_lsp::async_trait;
    use tower_lsp::lsp_types::{Diagnostic, MessageType, Url};

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

    fn position_of(document: &ScopeDocument, needle: &str, extra: usize) -> Position {
        let text = document.text();
        let offset = text.find(needle).unwrap() + extra;
        LineIndex::new(text).position_of(text, offset)
    }

    #[tokio::test]
    async fn definition_of_source_symbol_is_a_file_location() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let position = position_of(&document, "Greeter()", 2);
        let Some(GotoDefinitionResponse::Array(locations)) =
            definition(&backend, &scope, &document, position)
        else {
            panic!("expected definition locations");
        };
        assert_eq!(locations.len(), 1);
        assert!(locations[0].uri.path().ends_with("Greeter.cs"));
    }

    #[tokio::test]
    async fn definition_of_metadata_symbol_uses_csharp_scheme() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let position = position_of(&document, "Console", 3);
        let Some(GotoDefinitionResponse::Array(locations)) =
            definition(&backend, &scope, &document, position)
        else {
            panic!("expected definition locations");
        };
        assert!(locations[0]
            .uri
            .as_str()
            .starts_with("csharp:/metadata/projects/"));
    }

    #[tokio::test]
    async fn implementations_resolve_interface_to_class() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/IGreeter.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let position = position_of(&document, "IGreeter", 2);
        let Some(GotoDefinitionResponse::Array(locations)) =
            implementation(&backend, &scope, &document, position, &CancelToken::new())
        else {
            panic!("expected implementation locations");
        };
        assert_eq!(locations.len(), 1);
        assert!(locations[0].uri.path().ends_with("Greeter.cs"));
    }

    #[tokio::test]
    async fn highlights_stay_inside_the_requested_document() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Greeter.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let backend = ScannerBackend::new();
        let position = position_of(&document, "prefix", 2);
        let highlights = document_highlights(&backend, &scope, &document, position).unwrap();
        assert_eq!(highlights.len(), 2);
        assert!(highlights
            .iter()
            .all(|h| h.kind == Some(DocumentHighlightKind::READ)));
    }
}
