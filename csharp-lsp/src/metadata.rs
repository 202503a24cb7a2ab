//! The decompiled-metadata virtual document cache.
//!
//! Symbols defined in compiled references have no source on disk. The first
//! time navigation lands on one, the containing top-level type is decompiled
//! and cached under a stable `csharp:` URI; every later request for the same
//! (assembly, type) pair reuses the same synthesized document. The cache is
//! append-only and survives every solution change.

use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range, Url};

use csharp_analysis::backend::{CompilerBackend, MetadataLocation};
use csharp_analysis::solution::Document;
use csharp_analysis::syntax;
use csharp_analysis::text::LineIndex;

use crate::scope::ReadScope;
use crate::state::{MetadataEntry, MetadataInfo};

/// Stable URI for a decompiled type:
/// `csharp:/metadata/projects/{P}/assemblies/{A}/symbols/{FullName}.cs`.
pub fn metadata_uri(project: &str, assembly: &str, type_full_name: &str) -> Option<Url> {
    Url::parse(&format!(
        "csharp:/metadata/projects/{project}/assemblies/{assembly}/symbols/{type_full_name}.cs"
    ))
    .ok()
}

/// Resolve a metadata location to a navigable `(uri, range)`.
///
/// Cache hit: reuse the stored document. Miss: decompile through the
/// backend, record the entry (the read scope's one permitted mutation) and
/// locate the symbol in the synthesized source. Decompilation failure
/// degrades to `None` rather than an error.
pub fn resolve_metadata_location<B: CompilerBackend>(
    scope: &ReadScope,
    backend: &B,
    location: &MetadataLocation,
) -> Option<(Url, Range)> {
    let solution = scope.snapshot().solution.as_ref()?;
    let project = solution.project(location.project)?;
    let uri = metadata_uri(&project.name, &location.assembly_name, &location.type_full_name)?;

    if let Some(entry) = scope.snapshot().decompiled_metadata.get(&uri) {
        return Some((uri, symbol_range(&entry.document.text, &location.symbol_name)));
    }

    let source = backend.decompile(solution, location).ok()?;
    let document = Document::metadata(PathBuf::from(uri.path()), source.clone());
    let range = symbol_range(&document.text, &location.symbol_name);
    let entry = Arc::new(MetadataEntry {
        info: MetadataInfo {
            project_name: project.name.clone(),
            assembly_name: location.assembly_name.clone(),
            symbol_name: location.symbol_name.clone(),
            source,
        },
        document,
    });
    scope.record_decompiled(uri.clone(), entry);
    Some((uri, range))
}

/// Descriptor lookup backing the `csharp/metadata` request.
pub fn lookup(scope: &ReadScope, uri: &Url) -> Option<MetadataInfo> {
    scope
        .snapshot()
        .decompiled_metadata
        .get(uri)
        .map(|entry| entry.info.clone())
}

/// Best-matching range for a symbol inside decompiled source: the declared
/// identifier when the scanner finds one, else the first textual occurrence,
/// else the degenerate `(0,0)-(0,1)` range. Never an error.
fn symbol_range(text: &str, symbol_name: &str) -> Range {
    let declarations = syntax::scan_declarations(text);
    if let Some(decl) = syntax::find_by_name(&declarations, symbol_name).first() {
        let index = LineIndex::new(text);
        return Range {
            start: index.position_of(text, decl.selection_span.start),
            end: index.position_of(text, decl.selection_span.end),
        };
    }
    if let Some(span) = syntax::identifier_occurrences(text, symbol_name).first() {
        let index = LineIndex::new(text);
        return Range {
            start: index.position_of(text, span.start),
            end: index.position_of(text, span.end),
        };
    }
    Range {
        start: Position::new(0, 0),
        end: Position::new(0, 1),
    }
}
