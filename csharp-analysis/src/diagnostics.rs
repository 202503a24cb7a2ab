//! Semantic diagnostics derivable from the scanner: delimiter balance and
//! duplicate type declarations.

use std::collections::HashMap;

use lsp_types::DiagnosticSeverity;

use crate::syntax;
use crate::text::TextSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticDiagnostic {
    pub span: TextSpan,
    pub severity: DiagnosticSeverity,
    pub code: String,
    pub message: String,
}

/// Diagnostics for one document's text.
pub fn document_diagnostics(text: &str) -> Vec<SemanticDiagnostic> {
    let mut diagnostics = delimiter_diagnostics(text);
    diagnostics.extend(duplicate_type_diagnostics(text));
    diagnostics.sort_by_key(|d| d.span.start);
    diagnostics
}

fn delimiter_diagnostics(text: &str) -> Vec<SemanticDiagnostic> {
    let masked = syntax::code_mask(text);
    let mut diagnostics = Vec::new();
    let mut braces: Vec<usize> = Vec::new();
    let mut parens: Vec<usize> = Vec::new();

    for (idx, ch) in masked.char_indices() {
        match ch {
            '{' => braces.push(idx),
            '(' => parens.push(idx),
            '}' => {
                if braces.pop().is_none() {
                    diagnostics.push(SemanticDiagnostic {
                        span: TextSpan::new(idx, idx + 1),
                        severity: DiagnosticSeverity::ERROR,
                        code: "CS1022".to_string(),
                        message: "Unexpected '}'".to_string(),
                    });
                }
            }
            ')' => {
                if parens.pop().is_none() {
                    diagnostics.push(SemanticDiagnostic {
                        span: TextSpan::new(idx, idx + 1),
                        severity: DiagnosticSeverity::ERROR,
                        code: "CS1022".to_string(),
                        message: "Unexpected ')'".to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    for open in braces {
        diagnostics.push(SemanticDiagnostic {
            span: TextSpan::new(open, open + 1),
            severity: DiagnosticSeverity::ERROR,
            code: "CS1513".to_string(),
            message: "'}' expected".to_string(),
        });
    }
    for open in parens {
        diagnostics.push(SemanticDiagnostic {
            span: TextSpan::new(open, open + 1),
            severity: DiagnosticSeverity::ERROR,
            code: "CS1026".to_string(),
            message: "')' expected".to_string(),
        });
    }
    diagnostics
}

fn duplicate_type_diagnostics(text: &str) -> Vec<SemanticDiagnostic> {
    let declarations = syntax::scan_declarations(text);
    let mut by_full_name: HashMap<&str, Vec<&syntax::Declaration>> = HashMap::new();
    for decl in syntax::flatten(&declarations) {
        if decl.kind.is_type() {
            by_full_name.entry(&decl.full_name).or_default().push(decl);
        }
    }
    let mut diagnostics = Vec::new();
    for (full_name, decls) in by_full_name {
        if decls.len() < 2 {
            continue;
        }
        for decl in decls.iter().skip(1) {
            diagnostics.push(SemanticDiagnostic {
                span: decl.selection_span,
                severity: DiagnosticSeverity::WARNING,
                code: "CS0101".to_string(),
                message: format!("The namespace already contains a definition for '{full_name}'"),
            });
        }
    }
    diagnostics
}
