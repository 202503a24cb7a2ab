//! The compiler-backend contract the language server consumes, plus the
//! in-process scanner implementation of it.
//!
//! [`CompilerBackend`] is the seam between the protocol layer and compiler
//! services: solution loading, symbol resolution, reference search, code
//! fixes, decompilation, formatting and diagnostics. [`ScannerBackend`]
//! implements it over the declaration scanner; a Roslyn-grade backend would
//! implement the same trait.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use thiserror::Error;

use crate::cancel::{CancelToken, Cancelled};
use crate::completion::{self, CompletionCandidate};
use crate::decompile::{self, default_framework_references};
use crate::diagnostics::{self, SemanticDiagnostic};
use crate::formatting;
use crate::hover;
use crate::references;
use crate::solution::{
    Document, DocumentId, MetadataMember, MetadataReference, MetadataType, ProjectId, Solution,
    SolutionBuilder,
};
use crate::syntax::{self, CsSymbolKind, Declaration};
use crate::text::{apply_edits, LineIndex, TextEditSpan, TextSpan};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no C# sources found under {0}")]
    NoSources(PathBuf),
    #[error("cannot load {0}: not a solution, project or directory")]
    UnsupportedPath(PathBuf),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecompileError {
    #[error("project is no longer part of the solution")]
    UnknownProject,
    #[error("assembly {0} is not referenced by the project")]
    UnknownAssembly(String),
    #[error("type {0} not present in assembly metadata")]
    UnknownType(String),
}

/// Where a symbol is defined: user source, or a compiled reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLocation {
    Source { document: DocumentId, span: TextSpan },
    Metadata(MetadataLocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLocation {
    pub project: ProjectId,
    pub assembly_name: String,
    /// Fully qualified name of the containing top-level type.
    pub type_full_name: String,
    /// Simple name of the symbol itself (the type, or a member of it).
    pub symbol_name: String,
}

/// A named program element resolved from a source position.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Human-readable form, e.g. `Greeter.Greet(string name)`.
    pub display: String,
    pub kind: CsSymbolKind,
    /// Assembly the symbol is defined in, when known.
    pub assembly_name: Option<String>,
    /// Formatted documentation, when the definition carries any.
    pub documentation: Option<String>,
    pub locations: Vec<SymbolLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFixKind {
    QuickFix,
    Refactoring,
}

/// An available code action over a span of one document. Resolution happens
/// later: [`CompilerBackend::apply_code_fix`] produces the changed solution
/// the caller diffs into concrete edits.
#[derive(Debug, Clone)]
pub struct CodeFix {
    pub title: String,
    pub kind: CodeFixKind,
    pub document: DocumentId,
    pub span: TextSpan,
    pub is_preferred: bool,
}

pub trait CompilerBackend: Send + Sync + 'static {
    fn load_solution(&self, path: &Path) -> Result<Solution, LoadError>;
    fn load_directory(&self, dir: &Path) -> Result<Solution, LoadError>;

    fn symbol_at(&self, solution: &Solution, document: &Document, offset: usize)
        -> Option<Symbol>;

    fn find_references(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        cancel: &CancelToken,
    ) -> Result<Vec<(DocumentId, TextSpan)>, Cancelled>;

    fn find_implementations(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        cancel: &CancelToken,
    ) -> Result<Vec<SymbolLocation>, Cancelled>;

    /// Source declarations matching `query`, capped at `limit`.
    fn search_declarations(
        &self,
        solution: &Solution,
        query: &str,
        limit: usize,
    ) -> Vec<(DocumentId, Declaration)>;

    /// Declaration tree of one document.
    fn document_declarations(&self, document: &Document) -> Vec<Declaration>;

    fn completions(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
    ) -> Vec<CompletionCandidate>;

    /// Code fixes and refactorings whose target intersects `span`.
    fn code_fixes(&self, solution: &Solution, document: &Document, span: TextSpan) -> Vec<CodeFix>;

    /// Apply a fix to a cloned solution; the caller diffs old against new.
    fn apply_code_fix(&self, solution: &Solution, fix: &CodeFix) -> Solution;

    /// Rename a symbol solution-wide, returning the changed solution.
    fn rename(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        new_name: &str,
        cancel: &CancelToken,
    ) -> Result<Solution, Cancelled>;

    /// Decompile the containing top-level type of a metadata location.
    fn decompile(
        &self,
        solution: &Solution,
        location: &MetadataLocation,
    ) -> Result<String, DecompileError>;

    fn format_document(&self, document: &Document) -> Vec<TextEditSpan>;
    fn format_range(&self, document: &Document, start_line: usize, end_line: usize)
        -> Vec<TextEditSpan>;
    fn format_on_type(&self, document: &Document, offset: usize, trigger: char)
        -> Vec<TextEditSpan>;

    fn diagnostics(&self, solution: &Solution, document: &Document) -> Vec<SemanticDiagnostic>;
}

/// Backend built on the declaration scanner. No type checking; symbols are
/// resolved by identifier and metadata comes from the per-project stub
/// tables.
#[derive(Debug, Default)]
pub struct ScannerBackend;

impl ScannerBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CompilerBackend for ScannerBackend {
    fn load_solution(&self, path: &Path) -> Result<Solution, LoadError> {
        if path.is_dir() {
            return self.load_directory(path);
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sln") => load_sln(path),
            Some("csproj") => {
                let mut builder = SolutionBuilder::new();
                add_csproj(&mut builder, project_name(path), path)?;
                Ok(builder.finish())
            }
            _ => Err(LoadError::UnsupportedPath(path.to_path_buf())),
        }
    }

    fn load_directory(&self, dir: &Path) -> Result<Solution, LoadError> {
        if let Some(sln) = first_solution_file(dir) {
            return load_sln(&sln);
        }
        let csprojs = collect_files(dir, "csproj");
        if !csprojs.is_empty() {
            let mut builder = SolutionBuilder::new();
            for csproj in &csprojs {
                add_csproj(&mut builder, project_name(csproj), csproj)?;
            }
            return Ok(builder.finish());
        }
        let sources = collect_files(dir, "cs");
        if sources.is_empty() {
            return Err(LoadError::NoSources(dir.to_path_buf()));
        }
        let mut builder = SolutionBuilder::new();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());
        let project = builder.add_project(name, dir, default_framework_references());
        for path in sources {
            let text = read_source(&path)?;
            builder.add_document(project, path, text);
        }
        Ok(builder.finish())
    }

    fn symbol_at(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
    ) -> Option<Symbol> {
        let (name, span) = syntax::identifier_at(&document.text, offset)?;
        if syntax::is_reserved(&name) {
            return None;
        }

        let declarations = references::find_declarations(solution, &name);
        if !declarations.is_empty() {
            let primary = declarations
                .iter()
                .find(|(doc, _)| *doc == document.id)
                .map(|(_, decl)| decl)
                .unwrap_or(&declarations[0].1);
            let assembly_name = solution
                .project_of(declarations[0].0)
                .map(|project| project.assembly_name.clone());
            return Some(Symbol {
                display: hover::declaration_display(primary),
                kind: primary.kind,
                assembly_name,
                documentation: hover::format_documentation(&primary.doc),
                locations: declarations
                    .iter()
                    .map(|(doc, decl)| SymbolLocation::Source {
                        document: *doc,
                        span: decl.selection_span,
                    })
                    .collect(),
                name,
            });
        }

        let receiver = member_access_receiver(&document.text, span.start);
        for (project, reference) in visible_references(solution, document) {
            if let Some(ty) = reference.find_type(&name) {
                return Some(metadata_type_symbol(project, reference, ty, &name));
            }
            if let Some(receiver) = receiver.as_deref() {
                if let Some(ty) = reference.find_type(receiver) {
                    if let Some(member) = ty.members.iter().find(|m| m.name == name) {
                        return Some(metadata_member_symbol(project, reference, ty, member));
                    }
                }
            }
        }
        // Unresolved identifiers still act as document-local symbols so
        // highlight and hover degrade gracefully.
        Some(Symbol {
            display: name.clone(),
            kind: CsSymbolKind::Local,
            assembly_name: None,
            documentation: None,
            locations: Vec::new(),
            name,
        })
    }

    fn find_references(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        cancel: &CancelToken,
    ) -> Result<Vec<(DocumentId, TextSpan)>, Cancelled> {
        references::find_references(solution, &symbol.name, cancel)
    }

    fn find_implementations(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        cancel: &CancelToken,
    ) -> Result<Vec<SymbolLocation>, Cancelled> {
        let implementations = references::find_implementations(solution, &symbol.name, cancel)?;
        Ok(implementations
            .into_iter()
            .map(|(document, decl)| SymbolLocation::Source {
                document,
                span: decl.selection_span,
            })
            .collect())
    }

    fn search_declarations(
        &self,
        solution: &Solution,
        query: &str,
        limit: usize,
    ) -> Vec<(DocumentId, Declaration)> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();
        for (_, document) in solution.documents() {
            let declarations = syntax::scan_declarations(&document.text);
            for decl in syntax::flatten(&declarations) {
                if decl.kind == CsSymbolKind::Namespace {
                    continue;
                }
                if needle.is_empty() || decl.name.to_lowercase().contains(&needle) {
                    results.push((document.id, decl.clone()));
                    if results.len() >= limit {
                        return results;
                    }
                }
            }
        }
        results
    }

    fn document_declarations(&self, document: &Document) -> Vec<Declaration> {
        syntax::scan_declarations(&document.text)
    }

    fn completions(
        &self,
        solution: &Solution,
        document: &Document,
        offset: usize,
    ) -> Vec<CompletionCandidate> {
        let project = solution.project_of(document.id);
        completion::completion_candidates(solution, project, &document.text, offset)
    }

    fn code_fixes(&self, _solution: &Solution, document: &Document, span: TextSpan) -> Vec<CodeFix> {
        let mut fixes = Vec::new();
        if !trailing_whitespace_edits(&document.text, span).is_empty() {
            fixes.push(CodeFix {
                title: "Remove trailing whitespace".to_string(),
                kind: CodeFixKind::QuickFix,
                document: document.id,
                span,
                is_preferred: true,
            });
        }
        if let Some(block) = using_block(&document.text) {
            if block.span.intersects(span) && block.needs_rewrite() {
                fixes.push(CodeFix {
                    title: "Sort usings".to_string(),
                    kind: CodeFixKind::Refactoring,
                    document: document.id,
                    span,
                    is_preferred: false,
                });
            }
        }
        fixes
    }

    fn apply_code_fix(&self, solution: &Solution, fix: &CodeFix) -> Solution {
        let Some(document) = solution.document(fix.document) else {
            return solution.clone();
        };
        let text = document.text.to_string();
        let new_text = match fix.title.as_str() {
            "Remove trailing whitespace" => {
                apply_edits(&text, &trailing_whitespace_edits(&text, fix.span))
            }
            "Sort usings" => match using_block(&text) {
                Some(block) => {
                    let mut edited = text.clone();
                    edited.replace_range(block.span.start..block.span.end, &block.sorted());
                    edited
                }
                None => text.clone(),
            },
            _ => text.clone(),
        };
        if new_text == text {
            solution.clone()
        } else {
            solution.with_document_text(fix.document, new_text)
        }
    }

    fn rename(
        &self,
        solution: &Solution,
        symbol: &Symbol,
        new_name: &str,
        cancel: &CancelToken,
    ) -> Result<Solution, Cancelled> {
        let mut next = solution.clone();
        for (_, document) in solution.documents() {
            cancel.check()?;
            let spans = syntax::identifier_occurrences(&document.text, &symbol.name);
            if spans.is_empty() {
                continue;
            }
            let edits: Vec<TextEditSpan> = spans
                .into_iter()
                .map(|span| TextEditSpan {
                    start: span.start,
                    end: span.end,
                    new_text: new_name.to_string(),
                })
                .collect();
            next = next.with_document_text(document.id, apply_edits(&document.text, &edits));
        }
        Ok(next)
    }

    fn decompile(
        &self,
        solution: &Solution,
        location: &MetadataLocation,
    ) -> Result<String, DecompileError> {
        let project = solution
            .project(location.project)
            .ok_or(DecompileError::UnknownProject)?;
        let reference = project
            .metadata_references
            .iter()
            .find(|r| r.assembly_name == location.assembly_name)
            .ok_or_else(|| DecompileError::UnknownAssembly(location.assembly_name.clone()))?;
        let ty = reference
            .find_type(&location.type_full_name)
            .ok_or_else(|| DecompileError::UnknownType(location.type_full_name.clone()))?;
        Ok(decompile::decompile_type(reference, ty))
    }

    fn format_document(&self, document: &Document) -> Vec<TextEditSpan> {
        formatting::format_document(&document.text)
    }

    fn format_range(
        &self,
        document: &Document,
        start_line: usize,
        end_line: usize,
    ) -> Vec<TextEditSpan> {
        formatting::format_lines(&document.text, start_line, end_line)
    }

    fn format_on_type(
        &self,
        document: &Document,
        offset: usize,
        trigger: char,
    ) -> Vec<TextEditSpan> {
        formatting::format_on_type(&document.text, offset, trigger)
    }

    fn diagnostics(&self, _solution: &Solution, document: &Document) -> Vec<SemanticDiagnostic> {
        diagnostics::document_diagnostics(&document.text)
    }
}

fn metadata_type_symbol(
    project: ProjectId,
    reference: &MetadataReference,
    ty: &MetadataType,
    name: &str,
) -> Symbol {
    Symbol {
        name: name.to_string(),
        display: ty.full_name.clone(),
        kind: ty.kind,
        assembly_name: Some(reference.assembly_name.clone()),
        documentation: ty.summary.clone(),
        locations: vec![SymbolLocation::Metadata(MetadataLocation {
            project,
            assembly_name: reference.assembly_name.clone(),
            type_full_name: ty.full_name.clone(),
            symbol_name: ty.simple_name().to_string(),
        })],
    }
}

fn metadata_member_symbol(
    project: ProjectId,
    reference: &MetadataReference,
    ty: &MetadataType,
    member: &MetadataMember,
) -> Symbol {
    let display = match (member.signature.find('('), member.signature.rfind(')')) {
        (Some(open), Some(close)) if close > open => format!(
            "{}.{}({})",
            ty.full_name,
            member.name,
            member.signature[open + 1..close].trim()
        ),
        _ => format!("{}.{}", ty.full_name, member.name),
    };
    Symbol {
        name: member.name.clone(),
        display,
        kind: member.kind,
        assembly_name: Some(reference.assembly_name.clone()),
        documentation: member.summary.clone(),
        locations: vec![SymbolLocation::Metadata(MetadataLocation {
            project,
            assembly_name: reference.assembly_name.clone(),
            type_full_name: ty.full_name.clone(),
            symbol_name: member.name.clone(),
        })],
    }
}

/// The identifier left of a `.` immediately before `offset`, if any.
fn member_access_receiver(text: &str, offset: usize) -> Option<String> {
    let before = text[..offset].chars().next_back()?;
    if before != '.' {
        return None;
    }
    let (name, _) = syntax::identifier_at(text, offset - before.len_utf8())?;
    Some(name)
}

/// Metadata references visible from a document, with their owning project.
/// Metadata documents belong to no project, so they see every reference.
fn visible_references<'a>(
    solution: &'a Solution,
    document: &Document,
) -> Vec<(ProjectId, &'a Arc<MetadataReference>)> {
    match solution.project_of(document.id) {
        Some(project) => project
            .metadata_references
            .iter()
            .map(|r| (project.id, r))
            .collect(),
        None => solution
            .projects()
            .iter()
            .flat_map(|p| p.metadata_references.iter().map(move |r| (p.id, r)))
            .collect(),
    }
}

fn trailing_whitespace_edits(text: &str, span: TextSpan) -> Vec<TextEditSpan> {
    let index = LineIndex::new(text);
    let mut edits = Vec::new();
    for line in 0..index.line_count() {
        let line_start = index.line_start(line);
        let line_end = if line + 1 < index.line_count() {
            index.line_start(line + 1) - 1
        } else {
            text.len()
        };
        if !TextSpan::new(line_start, line_end).intersects(span) {
            continue;
        }
        let raw = text[line_start..line_end].trim_end_matches('\r');
        let trimmed_len = raw.trim_end().len();
        if trimmed_len < raw.len() {
            edits.push(TextEditSpan {
                start: line_start + trimmed_len,
                end: line_start + raw.len(),
                new_text: String::new(),
            });
        }
    }
    edits
}

struct UsingBlock {
    span: TextSpan,
    directives: Vec<String>,
}

impl UsingBlock {
    fn needs_rewrite(&self) -> bool {
        let mut sorted = self.directives.clone();
        sorted.sort();
        sorted.dedup();
        sorted != self.directives
    }

    fn sorted(&self) -> String {
        let mut sorted = self.directives.clone();
        sorted.sort();
        sorted.dedup();
        sorted.join("\n")
    }
}

/// The contiguous run of `using X;` directives at the top of a document.
fn using_block(text: &str) -> Option<UsingBlock> {
    let mut start = None;
    let mut end = 0;
    let mut directives = Vec::new();
    let mut cursor = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("using ") && trimmed.ends_with(';') {
            if start.is_none() {
                start = Some(cursor + (line.len() - line.trim_start().len()));
            }
            directives.push(trimmed.to_string());
            end = cursor + line.trim_end().len();
        } else if trimmed.is_empty() && start.is_none() {
            // Leading blank lines before the block.
        } else if start.is_some() || !trimmed.is_empty() {
            break;
        }
        cursor += line.len();
    }
    let start = start?;
    if directives.is_empty() {
        None
    } else {
        Some(UsingBlock {
            span: TextSpan::new(start, end),
            directives,
        })
    }
}

fn project_name(csproj: &Path) -> String {
    csproj
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

fn read_source(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn first_solution_file(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut solutions: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("sln"))
        .collect();
    solutions.sort();
    solutions.into_iter().next()
}

/// All files with the given extension under `root`, skipping build output.
fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .filter(|path| {
            !path
                .components()
                .any(|c| matches!(c.as_os_str().to_str(), Some("bin") | Some("obj")))
        })
        .collect();
    files.sort();
    files
}

fn load_sln(path: &Path) -> Result<Solution, LoadError> {
    let text = read_source(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut builder = SolutionBuilder::new();
    let mut loaded = 0usize;
    for line in text.lines() {
        if !line.trim_start().starts_with("Project(") {
            continue;
        }
        let quoted: Vec<&str> = line.split('"').collect();
        // Project("{type}") = "Name", "rel\path.csproj", "{guid}"
        let (Some(name), Some(rel_path)) = (quoted.get(3), quoted.get(5)) else {
            continue;
        };
        if !rel_path.ends_with(".csproj") {
            continue;
        }
        let csproj = dir.join(rel_path.replace('\\', "/"));
        add_csproj(&mut builder, name.to_string(), &csproj)?;
        loaded += 1;
    }
    if loaded == 0 {
        return Err(LoadError::NoSources(path.to_path_buf()));
    }
    Ok(builder.finish())
}

fn add_csproj(
    builder: &mut SolutionBuilder,
    name: String,
    csproj: &Path,
) -> Result<(), LoadError> {
    let root = csproj
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let project = builder.add_project(name, root.clone(), default_framework_references());
    for path in collect_files(&root, "cs") {
        let text = read_source(&path)?;
        builder.add_document(project, path, text);
    }
    Ok(())
}
