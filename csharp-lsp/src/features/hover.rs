//! Hover contents: display name, defining assembly and documentation.

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::syntax::CsSymbolKind;

use crate::scope::{symbol_at_position, ReadScope, ScopeDocument};

/// Markdown hover for the symbol under the cursor: the backticked display
/// name, a `from assembly` note when the definition lives outside the
/// current project's assembly, then the formatted documentation.
pub fn hover<B: CompilerBackend>(
    backend: &B,
    scope: &ReadScope,
    document: &ScopeDocument,
    position: Position,
) -> Option<Hover> {
    let symbol = symbol_at_position(backend, scope.snapshot(), document, position)?;
    if symbol.kind == CsSymbolKind::Local && symbol.locations.is_empty() {
        // Unresolved identifier; nothing useful to show.
        return None;
    }

    let current_assembly = current_assembly(scope, document);
    let mut value = format!("`{}`", symbol.display);
    if let Some(assembly) = &symbol.assembly_name {
        if current_assembly.as_deref() != Some(assembly.as_str()) {
            value.push_str(&format!(" from assembly {assembly}"));
        }
    }
    if let Some(documentation) = &symbol.documentation {
        value.push_str("\n\n");
        value.push_str(documentation);
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    })
}

fn current_assembly(scope: &ReadScope, document: &ScopeDocument) -> Option<String> {
    match document {
        ScopeDocument::Source(source) => scope
            .snapshot()
            .solution
            .as_ref()?
            .project_of(source.id)
            .map(|project| project.assembly_name.clone()),
        ScopeDocument::Metadata(entry) => Some(entry.info.assembly_name.clone()),
    }
}
