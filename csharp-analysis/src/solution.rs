//! Immutable solution model: projects, documents and metadata references.
//!
//! A [`Solution`] is a snapshot. Mutating operations return a new solution
//! that shares unchanged documents through `Arc`, so readers holding an older
//! snapshot keep a consistent view while the server state moves on.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::syntax::CsSymbolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A source file that exists on disk and can be edited.
    Source,
    /// A read-only document synthesized from a compiled reference.
    Metadata,
}

#[derive(Debug)]
pub struct Document {
    pub id: DocumentId,
    /// Absolute path for source documents; a synthetic path for metadata.
    pub path: PathBuf,
    pub text: Arc<str>,
    pub kind: DocumentKind,
}

/// Metadata documents never belong to a [`Solution`]; their ids come from a
/// separate namespace so they can never collide with source document ids.
static NEXT_METADATA_DOCUMENT: AtomicU32 = AtomicU32::new(0x8000_0000);

impl Document {
    pub fn metadata(path: PathBuf, text: String) -> Arc<Self> {
        Arc::new(Self {
            id: DocumentId(NEXT_METADATA_DOCUMENT.fetch_add(1, Ordering::Relaxed)),
            path,
            text: text.into(),
            kind: DocumentKind::Metadata,
        })
    }
}

/// One member of a type that lives in a compiled reference.
#[derive(Debug, Clone)]
pub struct MetadataMember {
    pub name: String,
    pub kind: CsSymbolKind,
    pub signature: String,
    pub summary: Option<String>,
}

/// One type exposed by a compiled reference, with enough structure to
/// synthesize a plausible decompiled view.
#[derive(Debug, Clone)]
pub struct MetadataType {
    pub full_name: String,
    pub kind: CsSymbolKind,
    pub summary: Option<String>,
    pub members: Vec<MetadataMember>,
}

impl MetadataType {
    pub fn simple_name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(ns, _)| ns)
    }
}

/// A compiled assembly referenced by a project.
#[derive(Debug, Clone)]
pub struct MetadataReference {
    pub assembly_name: String,
    pub types: Vec<MetadataType>,
}

impl MetadataReference {
    /// Look a type up by simple or fully qualified name.
    pub fn find_type(&self, name: &str) -> Option<&MetadataType> {
        self.types
            .iter()
            .find(|ty| ty.full_name == name || ty.simple_name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub assembly_name: String,
    /// Directory all of the project's sources live under.
    pub root: PathBuf,
    pub documents: Vec<Arc<Document>>,
    pub metadata_references: Vec<Arc<MetadataReference>>,
}

impl Project {
    pub fn document(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.documents.iter().find(|doc| doc.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Solution {
    projects: Vec<Project>,
    next_document: u32,
    next_project: u32,
}

impl Solution {
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.projects.iter().find_map(|project| project.document(id))
    }

    pub fn project_of(&self, id: DocumentId) -> Option<&Project> {
        self.projects
            .iter()
            .find(|project| project.document(id).is_some())
    }

    pub fn documents(&self) -> impl Iterator<Item = (&Project, &Arc<Document>)> {
        self.projects
            .iter()
            .flat_map(|project| project.documents.iter().map(move |doc| (project, doc)))
    }

    /// Find a source document by absolute filesystem path.
    pub fn document_by_path(&self, path: &Path) -> Option<&Arc<Document>> {
        self.projects
            .iter()
            .flat_map(|project| project.documents.iter())
            .find(|doc| doc.path == path)
    }

    /// Return a new solution with the given document's text replaced.
    ///
    /// The original solution is untouched; all other documents are shared.
    pub fn with_document_text(&self, id: DocumentId, text: String) -> Solution {
        let mut next = self.clone();
        for project in &mut next.projects {
            for doc in &mut project.documents {
                if doc.id == id {
                    *doc = Arc::new(Document {
                        id,
                        path: doc.path.clone(),
                        text: text.into(),
                        kind: doc.kind,
                    });
                    return next;
                }
            }
        }
        next
    }

    /// Attach a new source document to the best-matching project by path:
    /// the project whose root is the deepest prefix of the document path.
    /// Falls back to the first project, or creates a loose-files project in
    /// an otherwise empty solution.
    pub fn add_document(&self, path: PathBuf, text: String) -> (Solution, DocumentId) {
        let mut next = self.clone();
        let id = DocumentId(next.next_document);
        next.next_document += 1;
        let document = Arc::new(Document {
            id,
            path: path.clone(),
            text: text.into(),
            kind: DocumentKind::Source,
        });

        let target = next
            .projects
            .iter()
            .enumerate()
            .filter(|(_, project)| path.starts_with(&project.root))
            .max_by_key(|(_, project)| project.root.components().count())
            .map(|(idx, _)| idx)
            .or(if next.projects.is_empty() { None } else { Some(0) });

        match target {
            Some(idx) => next.projects[idx].documents.push(document),
            None => {
                let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "loose-files".to_string());
                let id = ProjectId(next.next_project);
                next.next_project += 1;
                next.projects.push(Project {
                    id,
                    assembly_name: name.clone(),
                    name,
                    root,
                    documents: vec![document],
                    metadata_references: Vec::new(),
                });
            }
        }
        (next, id)
    }
}

/// Incremental construction of a [`Solution`], used by the loaders and the
/// test fixtures.
#[derive(Debug, Default)]
pub struct SolutionBuilder {
    solution: Solution,
}

impl SolutionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(
        &mut self,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        metadata_references: Vec<Arc<MetadataReference>>,
    ) -> ProjectId {
        let id = ProjectId(self.solution.next_project);
        self.solution.next_project += 1;
        let name = name.into();
        self.solution.projects.push(Project {
            id,
            assembly_name: name.clone(),
            name,
            root: root.into(),
            documents: Vec::new(),
            metadata_references,
        });
        id
    }

    pub fn add_document(
        &mut self,
        project: ProjectId,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> DocumentId {
        let id = DocumentId(self.solution.next_document);
        self.solution.next_document += 1;
        let text: String = text.into();
        let document = Arc::new(Document {
            id,
            path: path.into(),
            text: text.into(),
            kind: DocumentKind::Source,
        });
        let slot = self
            .solution
            .projects
            .iter_mut()
            .find(|candidate| candidate.id == project)
            .expect("unknown project id");
        slot.documents.push(document);
        id
    }

    pub fn finish(self) -> Solution {
        self.solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_project_solution() -> Solution {
        let mut builder = SolutionBuilder::new();
        let app = builder.add_project("App", "/work/app", Vec::new());
        builder.add_document(app, "/work/app/Program.cs", "class Program { }");
        let lib = builder.add_project("Lib", "/work/app/lib", Vec::new());
        builder.add_document(lib, "/work/app/lib/Util.cs", "class Util { }");
        builder.finish()
    }

    #[test]
    fn with_document_text_shares_untouched_documents() {
        let solution = two_project_solution();
        let program = solution
            .document_by_path(Path::new("/work/app/Program.cs"))
            .unwrap()
            .clone();
        let util = solution
            .document_by_path(Path::new("/work/app/lib/Util.cs"))
            .unwrap()
            .clone();

        let updated = solution.with_document_text(program.id, "class Program { int x; }".into());
        let new_program = updated.document(program.id).unwrap();
        assert_eq!(new_program.text.as_ref(), "class Program { int x; }");
        // Old snapshot unchanged, sibling shared.
        assert_eq!(program.text.as_ref(), "class Program { }");
        assert!(Arc::ptr_eq(updated.document(util.id).unwrap(), &util));
    }

    #[test]
    fn add_document_picks_deepest_matching_root() {
        let solution = two_project_solution();
        let (updated, id) =
            solution.add_document("/work/app/lib/Extra.cs".into(), "class Extra { }".into());
        let owner = updated.project_of(id).unwrap();
        assert_eq!(owner.name, "Lib");
    }

    #[test]
    fn add_document_to_empty_solution_creates_project() {
        let (solution, id) =
            Solution::default().add_document("/tmp/scratch/A.cs".into(), "class A { }".into());
        let owner = solution.project_of(id).unwrap();
        assert_eq!(owner.name, "scratch");
        assert_eq!(solution.projects().len(), 1);
    }

    #[test]
    fn metadata_documents_use_reserved_id_space() {
        let doc = Document::metadata("/metadata/System.Console.cs".into(), "class Console { }".into());
        assert!(doc.id.0 >= 0x8000_0000);
        assert_eq!(doc.kind, DocumentKind::Metadata);
    }

    #[test]
    fn metadata_type_names_split() {
        let ty = MetadataType {
            full_name: "System.Console".into(),
            kind: CsSymbolKind::Class,
            summary: None,
            members: Vec::new(),
        };
        assert_eq!(ty.simple_name(), "Console");
        assert_eq!(ty.namespace(), Some("System"));
    }
}
