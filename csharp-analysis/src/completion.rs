//! Completion candidates at a cursor position.
//!
//! Two contexts are recognized: after a `.` the candidates are members of the
//! type named to the left (source declarations and metadata stubs); anywhere
//! else the candidates are language keywords plus every declaration name
//! visible in the solution and the referenced assemblies.

use std::collections::BTreeSet;

use crate::solution::{Project, Solution};
use crate::syntax::{self, CsSymbolKind};

/// A completion suggestion with display metadata.
///
/// Protocol-agnostic; the LSP layer converts these to the wire format. The
/// first entry of `tags` is the Roslyn-style classification the client maps
/// to an icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    pub label: String,
    pub detail: Option<String>,
    pub tags: Vec<String>,
    pub insert_text: Option<String>,
}

impl CompletionCandidate {
    fn new(label: impl Into<String>, tag: &str, detail: Option<String>) -> Self {
        Self {
            label: label.into(),
            detail,
            tags: vec![tag.to_string()],
            insert_text: None,
        }
    }
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "record", "ref", "return", "sbyte", "sealed",
    "short", "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw",
    "true", "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "var",
    "virtual", "void", "volatile", "while",
];

/// Candidates at `offset` into `text`. `project` scopes which metadata
/// references are visible; `None` falls back to every project in the
/// solution.
pub fn completion_candidates(
    solution: &Solution,
    project: Option<&Project>,
    text: &str,
    offset: usize,
) -> Vec<CompletionCandidate> {
    if let Some(receiver) = member_access_receiver(text, offset) {
        return member_candidates(solution, project, &receiver);
    }
    top_level_candidates(solution, project)
}

/// The identifier left of a `.` the cursor sits behind, if the position is a
/// member-access context.
fn member_access_receiver(text: &str, offset: usize) -> Option<String> {
    let offset = offset.min(text.len());
    // Walk back over the partial member name being typed.
    let mut cursor = offset;
    while cursor > 0 {
        let prev = text[..cursor].chars().next_back()?;
        if prev.is_alphanumeric() || prev == '_' {
            cursor -= prev.len_utf8();
        } else {
            break;
        }
    }
    let before_dot = text[..cursor].chars().next_back()?;
    if before_dot != '.' {
        return None;
    }
    let (name, _) = syntax::identifier_at(text, cursor - 1)?;
    Some(name)
}

fn member_candidates(
    solution: &Solution,
    project: Option<&Project>,
    receiver: &str,
) -> Vec<CompletionCandidate> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for (_, document) in solution.documents() {
        let declarations = syntax::scan_declarations(&document.text);
        for decl in syntax::flatten(&declarations) {
            if decl.name != receiver || !decl.kind.is_type() {
                continue;
            }
            for member in &decl.children {
                if seen.insert(member.name.clone()) {
                    items.push(CompletionCandidate::new(
                        member.name.clone(),
                        member.kind.roslyn_tag(),
                        Some(member.signature.clone()),
                    ));
                }
            }
        }
    }

    for reference in metadata_references(solution, project) {
        if let Some(ty) = reference.find_type(receiver) {
            for member in &ty.members {
                if seen.insert(member.name.clone()) {
                    items.push(CompletionCandidate::new(
                        member.name.clone(),
                        member.kind.roslyn_tag(),
                        Some(member.signature.clone()),
                    ));
                }
            }
        }
    }
    items
}

fn top_level_candidates(solution: &Solution, project: Option<&Project>) -> Vec<CompletionCandidate> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for keyword in KEYWORDS {
        seen.insert(keyword.to_string());
        items.push(CompletionCandidate::new(*keyword, "Keyword", None));
    }

    for (_, document) in solution.documents() {
        let declarations = syntax::scan_declarations(&document.text);
        for decl in syntax::flatten(&declarations) {
            if decl.kind == CsSymbolKind::Namespace {
                continue;
            }
            if seen.insert(decl.name.clone()) {
                items.push(CompletionCandidate::new(
                    decl.name.clone(),
                    decl.kind.roslyn_tag(),
                    Some(decl.signature.clone()),
                ));
            }
        }
    }

    for reference in metadata_references(solution, project) {
        for ty in &reference.types {
            let simple = ty.simple_name().to_string();
            if seen.insert(simple.clone()) {
                items.push(CompletionCandidate::new(
                    simple,
                    ty.kind.roslyn_tag(),
                    Some(ty.full_name.clone()),
                ));
            }
        }
    }
    items
}

fn metadata_references<'a>(
    solution: &'a Solution,
    project: Option<&'a Project>,
) -> Vec<&'a crate::solution::MetadataReference> {
    match project {
        Some(project) => project
            .metadata_references
            .iter()
            .map(|r| r.as_ref())
            .collect(),
        None => solution
            .projects()
            .iter()
            .flat_map(|p| p.metadata_references.iter().map(|r| r.as_ref()))
            .collect(),
    }
}
