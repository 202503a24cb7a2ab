//! Read and write request scopes over the state actor.
//!
//! A read scope is a snapshot: dispose by dropping, nothing to release. A
//! write scope is the write lease: acquiring it parks the handler until the
//! actor grants exclusivity, and dropping it releases the lease even when
//! the handler future is cancelled mid-flight.
//!
//! Read scopes may post exactly one kind of event, `DecompiledMetadataAdd`.
//! That append is monotone (first write wins in the actor) and commutative,
//! so admitting it from concurrent readers cannot violate the write lease.

use std::future::Future;
use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Url};

use csharp_analysis::backend::{CompilerBackend, Symbol};
use csharp_analysis::solution::Document;
use csharp_analysis::text::LineIndex;

use crate::state::{MetadataEntry, StateEvent, StateHandle, StateSnapshot};

/// A document resolved from a request URI: either user source inside the
/// solution, or a decompiled metadata document from the cache.
#[derive(Debug, Clone)]
pub enum ScopeDocument {
    Source(Arc<Document>),
    Metadata(Arc<MetadataEntry>),
}

impl ScopeDocument {
    pub fn document(&self) -> &Arc<Document> {
        match self {
            ScopeDocument::Source(document) => document,
            ScopeDocument::Metadata(entry) => &entry.document,
        }
    }

    pub fn text(&self) -> &str {
        &self.document().text
    }
}

impl StateSnapshot {
    /// Resolve a request URI against the snapshot. `file:` URIs are matched
    /// by decoded absolute path; `csharp:` URIs come from the decompiled
    /// metadata cache.
    pub fn document_for_uri(&self, uri: &Url) -> Option<ScopeDocument> {
        match uri.scheme() {
            "file" => {
                let path = uri.to_file_path().ok()?;
                let solution = self.solution.as_ref()?;
                solution
                    .document_by_path(&path)
                    .cloned()
                    .map(ScopeDocument::Source)
            }
            "csharp" => self
                .decompiled_metadata
                .get(uri)
                .cloned()
                .map(ScopeDocument::Metadata),
            _ => None,
        }
    }
}

/// Snapshot view for read-only handlers.
pub struct ReadScope {
    snapshot: StateSnapshot,
    events: StateHandle,
}

impl ReadScope {
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn document_for_uri(&self, uri: &Url) -> Option<ScopeDocument> {
        self.snapshot.document_for_uri(uri)
    }

    /// The one mutation a reader may perform: append to the decompiled
    /// metadata cache.
    pub fn record_decompiled(&self, uri: Url, entry: Arc<MetadataEntry>) {
        self.events
            .emit(StateEvent::DecompiledMetadataAdd { uri, entry });
    }
}

/// Exclusive view for mutating handlers. Holds the write lease from
/// creation until drop.
pub struct WriteScope {
    snapshot: StateSnapshot,
    events: StateHandle,
}

impl WriteScope {
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    pub fn document_for_uri(&self, uri: &Url) -> Option<ScopeDocument> {
        self.snapshot.document_for_uri(uri)
    }

    pub fn emit(&self, event: StateEvent) {
        self.events.emit(event);
    }
}

impl Drop for WriteScope {
    fn drop(&mut self) {
        // Runs on normal exit and on cancellation alike; a cancelled write
        // handler must still release the lease.
        self.events.emit(StateEvent::FinishSolutionChange);
    }
}

impl StateHandle {
    /// Acquire a read scope: a consistent snapshot of the current state.
    pub async fn read_scope(&self) -> Option<ReadScope> {
        let snapshot = self.state().await?;
        Some(ReadScope {
            snapshot,
            events: self.clone(),
        })
    }

    /// Acquire the write lease. The `StartSolutionChange` post happens
    /// inside this call, before the returned future is awaited, so writers
    /// enqueue in the order their handlers were entered.
    pub fn write_scope(&self) -> impl Future<Output = Option<WriteScope>> + Send {
        let pending = self.start_solution_change();
        let events = self.clone();
        async move {
            let snapshot = pending.await.ok()?;
            Some(WriteScope { snapshot, events })
        }
    }
}

/// Resolve the symbol under an LSP position in a scope document.
pub fn symbol_at_position<B: CompilerBackend>(
    backend: &B,
    snapshot: &StateSnapshot,
    document: &ScopeDocument,
    position: Position,
) -> Option<Symbol> {
    let solution = snapshot.solution.as_ref()?;
    let text = document.text();
    let offset = LineIndex::new(text).offset_of(text, position);
    backend.symbol_at(solution, document.document(), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{spawn_state_actor, MetadataInfo};
    use csharp_analysis::test_support::sample_solution;
    use csharp_analysis::ScannerBackend;
    use tower_lsp::async_trait;
    use tower_lsp::lsp_types::{Diagnostic, MessageType};

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

    #[tokio::test]
    async fn dropping_write_scope_releases_the_lease() {
        let state = state_with_sample();
        {
            let scope = state.write_scope().await.unwrap();
            assert!(scope.snapshot().write_lease_held);
        }
        let snapshot = state.state().await.unwrap();
        assert!(!snapshot.write_lease_held);
    }

    #[tokio::test]
    async fn second_writer_waits_for_first() {
        let state = state_with_sample();
        let first = state.write_scope().await.unwrap();
        let second = state.write_scope();
        // Parked: the state must show one holder and one queued writer.
        let observed = state.state().await.unwrap();
        assert_eq!(observed.queued_writes, 1);
        drop(first);
        let second = second.await.unwrap();
        assert!(second.snapshot().write_lease_held);
    }

    #[tokio::test]
    async fn read_scope_resolves_file_uris_by_decoded_path() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        assert!(matches!(document, ScopeDocument::Source(_)));
        assert!(scope
            .document_for_uri(&Url::parse("file:///work/sample/Missing.cs").unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn read_scope_resolves_decompiled_uris() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("csharp:/metadata/projects/Sample/assemblies/A/symbols/T.cs").unwrap();
        assert!(scope.document_for_uri(&uri).is_none());

        let entry = Arc::new(MetadataEntry {
            info: MetadataInfo {
                project_name: "Sample".into(),
                assembly_name: "A".into(),
                symbol_name: "T".into(),
                source: "class T { }".into(),
            },
            document: Document::metadata(uri.path().into(), "class T { }".into()),
        });
        scope.record_decompiled(uri.clone(), entry);

        let scope = state.read_scope().await.unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        assert_eq!(document.text(), "class T { }");
    }

    #[tokio::test]
    async fn symbol_lookup_goes_through_the_snapshot_solution() {
        let state = state_with_sample();
        let scope = state.read_scope().await.unwrap();
        let uri = Url::parse("file:///work/sample/Greeter.cs").unwrap();
        let document = scope.document_for_uri(&uri).unwrap();
        let text = document.text();
        let index = LineIndex::new(text);
        let offset = text.find("Greet(string").unwrap();
        let position = index.position_of(text, offset);
        let backend = ScannerBackend::new();
        let symbol = symbol_at_position(&backend, scope.snapshot(), &document, position).unwrap();
        assert_eq!(symbol.name, "Greet");
    }
}
