//! The state actor: single owner of all mutable server state.
//!
//! Every piece of shared state lives inside one task consuming a single
//! event channel. Handlers never touch state directly; they post
//! [`StateEvent`]s and receive immutable [`StateSnapshot`]s over oneshot
//! reply channels. Events apply in strict FIFO arrival order, which is what
//! makes write ordering observable and testable.
//!
//! The write lease lives here too: `StartSolutionChange` either grants the
//! lease immediately (answering with the current snapshot) or parks the
//! reply in a FIFO queue that `FinishSolutionChange` drains one holder at a
//! time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tower_lsp::lsp_types::{ClientCapabilities, Url};
use tracing::debug;

use csharp_analysis::backend::CompilerBackend;
use csharp_analysis::solution::{Document, DocumentId, Solution};

use crate::convert;
use crate::server::LspClient;

/// Descriptor of a decompiled metadata document, also the response shape of
/// the `csharp/metadata` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataInfo {
    pub project_name: String,
    pub assembly_name: String,
    pub symbol_name: String,
    pub source: String,
}

/// A decompiled metadata document: its descriptor plus the synthesized
/// document handle semantic queries run against.
#[derive(Debug)]
pub struct MetadataEntry {
    pub info: MetadataInfo,
    pub document: Arc<Document>,
}

/// Events accepted by the state actor. All state mutation flows through
/// these; everything else in the server only ever reads snapshots.
pub enum StateEvent {
    GetState(oneshot::Sender<StateSnapshot>),
    StartSolutionChange(oneshot::Sender<StateSnapshot>),
    FinishSolutionChange,
    ClientCapabilityChange(Box<ClientCapabilities>),
    SolutionChange(Arc<Solution>),
    DecompiledMetadataAdd { uri: Url, entry: Arc<MetadataEntry> },
    OpenDocVersionAdd { uri: Url, version: i32 },
    OpenDocVersionRemove { uri: Url },
    PublishDiagnosticsOnDocument { uri: Url, document: DocumentId },
    TimerTick,
}

/// Immutable view of the state at one instant. Cheap to clone; the maps are
/// shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub client_capabilities: Option<Arc<ClientCapabilities>>,
    pub solution: Option<Arc<Solution>>,
    pub open_documents: Arc<HashMap<Url, i32>>,
    pub decompiled_metadata: Arc<HashMap<Url, Arc<MetadataEntry>>>,
    /// Lease occupancy, exposed for monitoring and tests.
    pub write_lease_held: bool,
    pub queued_writes: usize,
}

#[derive(Default)]
struct ServerState {
    client_capabilities: Option<Arc<ClientCapabilities>>,
    solution: Option<Arc<Solution>>,
    open_documents: HashMap<Url, i32>,
    decompiled_metadata: HashMap<Url, Arc<MetadataEntry>>,
    pending_diagnostics: HashMap<Url, DocumentId>,
    write_lease_held: bool,
    change_queue: VecDeque<oneshot::Sender<StateSnapshot>>,
}

impl ServerState {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            client_capabilities: self.client_capabilities.clone(),
            solution: self.solution.clone(),
            open_documents: Arc::new(self.open_documents.clone()),
            decompiled_metadata: Arc::new(self.decompiled_metadata.clone()),
            write_lease_held: self.write_lease_held,
            queued_writes: self.change_queue.len(),
        }
    }

    /// Hand the lease to the next queued writer, or clear it. A queued
    /// writer whose reply channel died (cancelled handler) is skipped so it
    /// can never wedge the queue.
    fn grant_next(&mut self) {
        loop {
            match self.change_queue.pop_front() {
                Some(next) => {
                    self.write_lease_held = true;
                    if next.send(self.snapshot()).is_ok() {
                        return;
                    }
                }
                None => {
                    self.write_lease_held = false;
                    return;
                }
            }
        }
    }
}

/// Handle for posting events to the actor. Clones share the same actor.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::UnboundedSender<StateEvent>,
}

impl StateHandle {
    /// Post an event. Returns false once the actor is gone (shutdown).
    pub fn emit(&self, event: StateEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Current state snapshot.
    pub async fn state(&self) -> Option<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.emit(StateEvent::GetState(reply)) {
            return None;
        }
        rx.await.ok()
    }

    /// Request the write lease. The event is posted synchronously inside
    /// this call, before any await point, so two handlers that reach their
    /// prologue in wire order enqueue in that same order.
    pub fn start_solution_change(&self) -> oneshot::Receiver<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        let _ = self.emit(StateEvent::StartSolutionChange(reply));
        rx
    }
}

/// Spawn the actor task. The client and backend are owned by the actor for
/// the diagnostics path: ticks compute diagnostics and push them out.
pub fn spawn_state_actor<C, B>(client: C, backend: Arc<B>) -> StateHandle
where
    C: LspClient,
    B: CompilerBackend,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(state_loop(rx, client, backend));
    StateHandle { tx }
}

async fn state_loop<C, B>(
    mut rx: mpsc::UnboundedReceiver<StateEvent>,
    client: C,
    backend: Arc<B>,
) where
    C: LspClient,
    B: CompilerBackend,
{
    let mut state = ServerState::default();
    while let Some(event) = rx.recv().await {
        match event {
            StateEvent::GetState(reply) => {
                let _ = reply.send(state.snapshot());
            }
            StateEvent::StartSolutionChange(reply) => {
                if state.write_lease_held {
                    state.change_queue.push_back(reply);
                } else {
                    state.write_lease_held = true;
                    if reply.send(state.snapshot()).is_err() {
                        // Requester died before the grant arrived; pass the
                        // lease along instead of holding it for a ghost.
                        state.grant_next();
                    }
                }
            }
            StateEvent::FinishSolutionChange => {
                state.grant_next();
            }
            StateEvent::ClientCapabilityChange(capabilities) => {
                state.client_capabilities = Some(Arc::new(*capabilities));
            }
            StateEvent::SolutionChange(solution) => {
                state.solution = Some(solution);
            }
            StateEvent::DecompiledMetadataAdd { uri, entry } => {
                // First write wins: concurrent readers may race to decompile
                // the same type, and idempotence of the cached document
                // handle matters more than freshness.
                state.decompiled_metadata.entry(uri).or_insert(entry);
            }
            StateEvent::OpenDocVersionAdd { uri, version } => {
                let slot = state.open_documents.entry(uri).or_insert(version);
                *slot = (*slot).max(version);
            }
            StateEvent::OpenDocVersionRemove { uri } => {
                state.open_documents.remove(&uri);
            }
            StateEvent::PublishDiagnosticsOnDocument { uri, document } => {
                state.pending_diagnostics.insert(uri, document);
            }
            StateEvent::TimerTick => {
                flush_diagnostics(&mut state, &client, backend.as_ref()).await;
            }
        }
    }
}

/// Drain the pending map and publish one diagnostics notification per
/// document, however many events marked it since the last tick. Documents
/// that left the solution in the meantime are dropped silently.
async fn flush_diagnostics<C, B>(state: &mut ServerState, client: &C, backend: &B)
where
    C: LspClient,
    B: CompilerBackend,
{
    let pending = std::mem::take(&mut state.pending_diagnostics);
    if pending.is_empty() {
        return;
    }
    let Some(solution) = state.solution.clone() else {
        return;
    };
    for (uri, document_id) in pending {
        let Some(document) = solution.document(document_id) else {
            debug!(%uri, "skipping diagnostics for document no longer in solution");
            continue;
        };
        let diagnostics = backend.diagnostics(&solution, document);
        let lsp = convert::diagnostics_to_lsp(&document.text, &diagnostics);
        let version = state.open_documents.get(&uri).copied();
        client.publish_diagnostics(uri, lsp, version).await;
    }
}
