//! Conversions between analysis-layer byte offsets and LSP wire types.
//!
//! Positions on the wire are UTF-16 code units; everything below the server
//! works in UTF-8 byte offsets. These helpers are the only place the two
//! meet.

use tower_lsp::lsp_types::{
    CompletionItemKind, Diagnostic, Location, NumberOrString, Position, Range, TextEdit, Url,
};

use csharp_analysis::diagnostics::SemanticDiagnostic;
use csharp_analysis::solution::{DocumentId, Solution};
use csharp_analysis::text::{LineIndex, TextEditSpan, TextSpan};

pub fn position_to_offset(text: &str, position: Position) -> usize {
    LineIndex::new(text).offset_of(text, position)
}

pub fn offset_to_position(text: &str, offset: usize) -> Position {
    LineIndex::new(text).position_of(text, offset)
}

pub fn span_to_range(text: &str, span: TextSpan) -> Range {
    let index = LineIndex::new(text);
    Range {
        start: index.position_of(text, span.start),
        end: index.position_of(text, span.end),
    }
}

pub fn range_to_span(text: &str, range: Range) -> TextSpan {
    let index = LineIndex::new(text);
    let start = index.offset_of(text, range.start);
    let end = index.offset_of(text, range.end);
    TextSpan::new(start.min(end), start.max(end))
}

pub fn edits_to_lsp(text: &str, edits: &[TextEditSpan]) -> Vec<TextEdit> {
    let index = LineIndex::new(text);
    edits
        .iter()
        .map(|edit| TextEdit {
            range: Range {
                start: index.position_of(text, edit.start),
                end: index.position_of(text, edit.end),
            },
            new_text: edit.new_text.clone(),
        })
        .collect()
}

pub fn diagnostics_to_lsp(text: &str, diagnostics: &[SemanticDiagnostic]) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .map(|diagnostic| Diagnostic {
            range: span_to_range(text, diagnostic.span),
            severity: Some(diagnostic.severity),
            code: Some(NumberOrString::String(diagnostic.code.clone())),
            source: Some("csharp".to_string()),
            message: diagnostic.message.clone(),
            ..Diagnostic::default()
        })
        .collect()
}

/// LSP location of a span inside a solution source document.
pub fn source_location(solution: &Solution, document: DocumentId, span: TextSpan) -> Option<Location> {
    let document = solution.document(document)?;
    let uri = Url::from_file_path(&document.path).ok()?;
    Some(Location {
        uri,
        range: span_to_range(&document.text, span),
    })
}

/// Completion kind derived from the first Roslyn tag of a candidate.
pub fn completion_kind(tag: &str) -> CompletionItemKind {
    match tag {
        "Keyword" => CompletionItemKind::KEYWORD,
        "Class" => CompletionItemKind::CLASS,
        "Structure" => CompletionItemKind::STRUCT,
        "Interface" => CompletionItemKind::INTERFACE,
        "Enum" => CompletionItemKind::ENUM,
        "EnumMember" => CompletionItemKind::ENUM_MEMBER,
        "Method" => CompletionItemKind::METHOD,
        "Property" => CompletionItemKind::PROPERTY,
        "Field" => CompletionItemKind::FIELD,
        "Event" => CompletionItemKind::EVENT,
        "Namespace" => CompletionItemKind::MODULE,
        "Local" | "Parameter" => CompletionItemKind::VARIABLE,
        "Delegate" => CompletionItemKind::FUNCTION,
        _ => CompletionItemKind::TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::DiagnosticSeverity;

    #[test]
    fn range_round_trips_through_spans() {
        let text = "class A\n{\n    int x;\n}\n";
        let span = TextSpan::new(text.find("int").unwrap(), text.find("x;").unwrap() + 1);
        let range = span_to_range(text, span);
        assert_eq!(range_to_span(text, range), span);
    }

    #[test]
    fn inverted_ranges_normalize() {
        let text = "int x;\n";
        let range = Range {
            start: Position::new(0, 5),
            end: Position::new(0, 1),
        };
        let span = range_to_span(text, range);
        assert!(span.start <= span.end);
    }

    #[test]
    fn diagnostics_carry_code_and_source() {
        let text = "class A {\n";
        let diagnostics = vec![SemanticDiagnostic {
            span: TextSpan::new(8, 9),
            severity: DiagnosticSeverity::ERROR,
            code: "CS1513".into(),
            message: "'}' expected".into(),
        }];
        let lsp = diagnostics_to_lsp(text, &diagnostics);
        assert_eq!(lsp.len(), 1);
        assert_eq!(lsp[0].source.as_deref(), Some("csharp"));
        assert_eq!(
            lsp[0].code,
            Some(NumberOrString::String("CS1513".to_string()))
        );
    }

    #[test]
    fn unknown_completion_tag_is_text() {
        assert_eq!(completion_kind("Snippet"), CompletionItemKind::TEXT);
        assert_eq!(completion_kind("Class"), CompletionItemKind::CLASS);
    }
}
