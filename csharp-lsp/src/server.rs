//! Main language server implementation.
//!
//! `CSharpLanguageServer` is generic over the outbound client and the
//! compiler backend so tests can substitute both. Handlers follow one shape:
//! acquire a scope from the state actor (read for queries, write for
//! anything that mutates), resolve the request document against the
//! snapshot, delegate to a feature module, and degrade to an empty result
//! when the document is unknown.

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::request::{GotoImplementationParams, GotoImplementationResponse};
use tower_lsp::lsp_types::{
    CodeAction, CodeActionOptions, CodeActionParams, CodeActionProviderCapability,
    CodeActionResponse, CodeLens, CodeLensOptions, CodeLensParams, CompletionOptions,
    CompletionParams, CompletionResponse, Diagnostic, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentFormattingParams, DocumentHighlight, DocumentHighlightParams,
    DocumentOnTypeFormattingOptions, DocumentOnTypeFormattingParams,
    DocumentRangeFormattingParams, DocumentSymbolParams, DocumentSymbolResponse,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability,
    ImplementationProviderCapability, InitializeParams, InitializeResult, InitializedParams,
    Location, MessageType, OneOf, ReferenceParams, RenameParams, SaveOptions, ServerCapabilities,
    ServerInfo, SignatureHelp, SignatureHelpOptions, SignatureHelpParams, SymbolInformation,
    TextDocumentIdentifier, TextDocumentItem, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, TextEdit, Url, WorkDoneProgressOptions,
    WorkspaceEdit, WorkspaceSymbolParams,
};
use tower_lsp::Client;
use tracing::{error, info};

use csharp_analysis::backend::{CompilerBackend, LoadError};
use csharp_analysis::cancel::CancelToken;
use csharp_analysis::solution::Solution;
use csharp_analysis::syntax;
use csharp_analysis::ScannerBackend;

use crate::diagnostics::spawn_diagnostics_timer;
use crate::features::{
    code_actions, code_lens, completion, formatting, hover, navigation, rename, symbols, sync,
};
use crate::metadata;
use crate::scope::ScopeDocument;
use crate::state::{spawn_state_actor, MetadataInfo, StateEvent, StateHandle};

/// Outbound channel to the editor, abstracted so tests can observe what the
/// server publishes.
#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    );
    async fn show_message(&self, typ: MessageType, message: String);
}

#[async_trait]
impl LspClient for Client {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        self.publish_diagnostics(uri, diagnostics, version).await;
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.show_message(typ, message).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Solution, project or directory to load on `initialize`; the server's
    /// working directory is scanned when absent.
    pub solution_path: Option<PathBuf>,
}

/// Parameters of the custom `csharp/metadata` request.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
}

pub struct CSharpLanguageServer<C = Client, B = ScannerBackend> {
    client: C,
    backend: Arc<B>,
    state: StateHandle,
    options: ServerOptions,
    diagnostics_timer: OnceLock<JoinHandle<()>>,
}

impl CSharpLanguageServer<Client, ScannerBackend> {
    pub fn new(client: Client) -> Self {
        Self::with_backend(
            client,
            Arc::new(ScannerBackend::new()),
            ServerOptions::default(),
        )
    }

    pub fn with_options(client: Client, options: ServerOptions) -> Self {
        Self::with_backend(client, Arc::new(ScannerBackend::new()), options)
    }
}

impl<C, B> CSharpLanguageServer<C, B>
where
    C: LspClient,
    B: CompilerBackend,
{
    pub fn with_backend(client: C, backend: Arc<B>, options: ServerOptions) -> Self {
        let state = spawn_state_actor(client.clone(), backend.clone());
        Self {
            client,
            backend,
            state,
            options,
            diagnostics_timer: OnceLock::new(),
        }
    }

    /// Handler for the custom `csharp/metadata` request: descriptor lookup
    /// for a decompiled document URI, or null.
    pub async fn metadata(&self, params: MetadataParams) -> Result<Option<MetadataInfo>> {
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        Ok(metadata::lookup(&scope, &params.text_document.uri))
    }

    fn load_solution(&self) -> std::result::Result<Solution, LoadError> {
        match &self.options.solution_path {
            Some(path) => self.backend.load_solution(path),
            None => {
                let cwd = env::current_dir().map_err(|source| LoadError::Io {
                    path: PathBuf::from("."),
                    source,
                })?;
                self.backend.load_directory(&cwd)
            }
        }
    }
}

fn request_cancelled() -> Error {
    Error {
        code: ErrorCode::RequestCancelled,
        message: "request cancelled".into(),
        data: None,
    }
}

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                will_save: None,
                will_save_wait_until: None,
                save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                    include_text: Some(true),
                })),
            },
        )),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(false),
            trigger_characters: Some(vec![".".to_string(), "'".to_string()]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
            all_commit_characters: None,
            ..CompletionOptions::default()
        }),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
            retrigger_characters: Some(vec![",".to_string(), ")".to_string()]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        definition_provider: Some(OneOf::Left(true)),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_highlight_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        workspace_symbol_provider: Some(OneOf::Left(true)),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: None,
            resolve_provider: Some(true),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        code_lens_provider: Some(CodeLensOptions {
            resolve_provider: Some(true),
        }),
        document_formatting_provider: Some(OneOf::Left(true)),
        document_range_formatting_provider: Some(OneOf::Left(true)),
        document_on_type_formatting_provider: Some(DocumentOnTypeFormattingOptions {
            first_trigger_character: ";".to_string(),
            more_trigger_character: Some(vec!["}".to_string(), ")".to_string()]),
        }),
        rename_provider: Some(OneOf::Left(true)),
        ..ServerCapabilities::default()
    }
}

#[async_trait]
impl<C, B> tower_lsp::LanguageServer for CSharpLanguageServer<C, B>
where
    C: LspClient,
    B: CompilerBackend,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let Some(scope) = self.state.write_scope().await else {
            return Err(Error::internal_error());
        };
        scope.emit(StateEvent::ClientCapabilityChange(Box::new(
            params.capabilities,
        )));

        let solution = match self.load_solution() {
            Ok(solution) => solution,
            Err(err) => {
                error!(error = %err, "solution load failed");
                self.client
                    .show_message(
                        MessageType::ERROR,
                        format!("Failed to load solution: {err}"),
                    )
                    .await;
                return Err(Error {
                    code: ErrorCode::InternalError,
                    message: format!("failed to load solution: {err}").into(),
                    data: None,
                });
            }
        };
        info!(
            projects = solution.projects().len(),
            "solution loaded, starting diagnostics timer"
        );
        scope.emit(StateEvent::SolutionChange(Arc::new(solution)));
        self.diagnostics_timer
            .get_or_init(|| spawn_diagnostics_timer(self.state.clone()));

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: "csharp-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {}

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let TextDocumentItem {
            uri, text, version, ..
        } = params.text_document;
        if uri.scheme() == "csharp" {
            // Decompiled documents are opened read-only; nothing to track.
            return;
        }
        let Some(scope) = self.state.write_scope().await else {
            return;
        };
        let Some(solution) = scope.snapshot().solution.clone() else {
            return;
        };
        match scope.document_for_uri(&uri) {
            Some(ScopeDocument::Source(document)) => {
                let next = solution.with_document_text(document.id, text);
                scope.emit(StateEvent::SolutionChange(Arc::new(next)));
                scope.emit(StateEvent::OpenDocVersionAdd {
                    uri: uri.clone(),
                    version,
                });
                scope.emit(StateEvent::PublishDiagnosticsOnDocument {
                    uri,
                    document: document.id,
                });
            }
            Some(ScopeDocument::Metadata(_)) => {}
            None => {
                // An editor buffer outside the loaded solution joins the
                // best-matching project.
                let Ok(path) = uri.to_file_path() else {
                    return;
                };
                let (next, document) = solution.add_document(path, text);
                scope.emit(StateEvent::SolutionChange(Arc::new(next)));
                scope.emit(StateEvent::OpenDocVersionAdd {
                    uri: uri.clone(),
                    version,
                });
                scope.emit(StateEvent::PublishDiagnosticsOnDocument { uri, document });
            }
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(scope) = self.state.write_scope().await else {
            return;
        };
        let uri = params.text_document.uri;
        let Some(ScopeDocument::Source(document)) = scope.document_for_uri(&uri) else {
            return;
        };
        let Some(solution) = scope.snapshot().solution.clone() else {
            return;
        };
        let new_text = sync::apply_content_changes(&document.text, &params.content_changes);
        let next = solution.with_document_text(document.id, new_text);
        scope.emit(StateEvent::SolutionChange(Arc::new(next)));
        scope.emit(StateEvent::OpenDocVersionAdd {
            uri: uri.clone(),
            version: params.text_document.version,
        });
        scope.emit(StateEvent::PublishDiagnosticsOnDocument {
            uri,
            document: document.id,
        });
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        // Only interesting for documents the solution does not know yet and
        // whose text rides along with the notification.
        let Some(text) = params.text else {
            return;
        };
        let uri = params.text_document.uri;
        if uri.scheme() != "file" {
            return;
        }
        let Some(scope) = self.state.write_scope().await else {
            return;
        };
        if scope.document_for_uri(&uri).is_some() {
            return;
        }
        let Some(solution) = scope.snapshot().solution.clone() else {
            return;
        };
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        let (next, document) = solution.add_document(path, text);
        scope.emit(StateEvent::SolutionChange(Arc::new(next)));
        scope.emit(StateEvent::PublishDiagnosticsOnDocument { uri, document });
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let Some(scope) = self.state.write_scope().await else {
            return;
        };
        // The solution keeps the document; only the open-version entry goes.
        scope.emit(StateEvent::OpenDocVersionRemove {
            uri: params.text_document.uri,
        });
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position_params = params.text_document_position_params;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(hover::hover(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position_params = params.text_document_position_params;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(navigation::definition(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
        ))
    }

    async fn goto_implementation(
        &self,
        params: GotoImplementationParams,
    ) -> Result<Option<GotoImplementationResponse>> {
        let position_params = params.text_document_position_params;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(navigation::implementation(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
            &CancelToken::new(),
        ))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position_params = params.text_document_position;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(navigation::references_in_solution(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
            &CancelToken::new(),
        ))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let position_params = params.text_document_position_params;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(navigation::document_highlights(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
        ))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&uri) else {
            return Ok(None);
        };
        let listed = symbols::document_symbols(self.backend.as_ref(), &document, &uri);
        Ok(Some(DocumentSymbolResponse::Flat(listed)))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        Ok(Some(symbols::workspace_symbols(
            self.backend.as_ref(),
            &scope,
            &params.query,
            20,
        )))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position_params = params.text_document_position;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(completion::completion(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
        ))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&uri) else {
            return Ok(None);
        };
        Ok(Some(code_actions::code_actions(
            self.backend.as_ref(),
            &scope,
            &document,
            &uri,
            params.range,
        )))
    }

    async fn code_action_resolve(&self, params: CodeAction) -> Result<CodeAction> {
        let Some(scope) = self.state.read_scope().await else {
            return Ok(params);
        };
        Ok(code_actions::resolve_code_action(
            self.backend.as_ref(),
            &scope,
            params,
        ))
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        let uri = params.text_document.uri;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&uri) else {
            return Ok(None);
        };
        Ok(Some(code_lens::code_lenses(
            self.backend.as_ref(),
            &document,
            &uri,
        )))
    }

    async fn code_lens_resolve(&self, params: CodeLens) -> Result<CodeLens> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let resolve = async {
            let Some(scope) = self.state.read_scope().await else {
                return params.clone();
            };
            code_lens::resolve_code_lens(self.backend.as_ref(), &scope, params.clone(), &token)
        };
        match tokio::time::timeout(code_lens::RESOLVE_TIMEOUT, resolve).await {
            Ok(resolved) => Ok(resolved),
            Err(_) => {
                cancel.cancel();
                Err(request_cancelled())
            }
        }
    }

    async fn signature_help(&self, _: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        // Deliberately empty; the capability is advertised so clients send
        // trigger characters, but no help is computed yet.
        Ok(None)
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let new_name = params.new_name.as_str();
        let valid = !new_name.is_empty()
            && !syntax::is_reserved(new_name)
            && syntax::identifier_at(new_name, 0)
                .is_some_and(|(word, span)| word == new_name && span.end == new_name.len());
        if !valid {
            return Err(Error::invalid_params(format!(
                "'{new_name}' is not a valid identifier"
            )));
        }
        let position_params = params.text_document_position;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(rename::rename(
            self.backend.as_ref(),
            &scope,
            &document,
            position_params.position,
            new_name,
            &CancelToken::new(),
        ))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(Some(formatting::formatting(
            self.backend.as_ref(),
            &document,
        )))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(Some(formatting::range_formatting(
            self.backend.as_ref(),
            &document,
            params.range,
        )))
    }

    async fn on_type_formatting(
        &self,
        params: DocumentOnTypeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let position_params = params.text_document_position;
        let Some(scope) = self.state.read_scope().await else {
            return Ok(None);
        };
        let Some(document) = scope.document_for_uri(&position_params.text_document.uri) else {
            return Ok(None);
        };
        Ok(Some(formatting::on_type_formatting(
            self.backend.as_ref(),
            &document,
            position_params.position,
            &params.ch,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csharp_analysis::test_support;
    use csharp_analysis::text::LineIndex;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use tower_lsp::lsp_types::{
        CodeActionContext, HoverContents, PartialResultParams, Position, Range, ReferenceContext,
        TextDocumentContentChangeEvent, TextDocumentPositionParams,
        VersionedTextDocumentIdentifier, WorkDoneProgressParams,
    };
    use tower_lsp::LanguageServer;

    #[derive(Clone, Default)]
    struct NoopClient;

    #[async_trait]
    impl LspClient for NoopClient {
        async fn publish_diagnostics(&self, _: Url, _: Vec<Diagnostic>, _: Option<i32>) {}
        async fn show_message(&self, _: MessageType, _: String) {}
    }

    #[derive(Clone, Default)]
    struct RecordingClient {
        published: Arc<Mutex<Vec<(Url, usize, Option<i32>)>>>,
    }

    #[async_trait]
    impl LspClient for RecordingClient {
        async fn publish_diagnostics(
            &self,
            uri: Url,
            diags: Vec<Diagnostic>,
            version: Option<i32>,
        ) {
            self.published
                .lock()
                .unwrap()
                .push((uri, diags.len(), version));
        }

        async fn show_message(&self, _: MessageType, _: String) {}
    }

    /// Server initialized over the sample project written to a tempdir.
    async fn initialized_server() -> (CSharpLanguageServer<NoopClient>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        test_support::write_sample_to(dir.path()).unwrap();
        let server = CSharpLanguageServer::with_backend(
            NoopClient,
            Arc::new(ScannerBackend::new()),
            ServerOptions {
                solution_path: Some(dir.path().to_path_buf()),
            },
        );
        server
            .initialize(InitializeParams::default())
            .await
            .unwrap();
        server.initialized(InitializedParams {}).await;
        (server, dir)
    }

    /// Server driven directly off the in-memory sample solution, with no
    /// diagnostics timer running.
    fn uninitialized_server<Cl: LspClient>(client: Cl) -> CSharpLanguageServer<Cl> {
        let server = CSharpLanguageServer::with_backend(
            client,
            Arc::new(ScannerBackend::new()),
            ServerOptions::default(),
        );
        server.state.emit(StateEvent::SolutionChange(Arc::new(
            test_support::sample_solution(),
        )));
        server
    }

    fn file_uri(dir: &tempfile::TempDir, name: &str) -> Url {
        Url::from_file_path(dir.path().join(name)).unwrap()
    }

    fn position_params(uri: &Url, position: Position) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position,
        }
    }

    fn position_in(text: &str, needle: &str, extra: usize) -> Position {
        let offset = text.find(needle).unwrap() + extra;
        LineIndex::new(text).position_of(text, offset)
    }

    async fn open<Cl: LspClient, Bk: CompilerBackend>(
        server: &CSharpLanguageServer<Cl, Bk>,
        uri: &Url,
        text: &str,
        version: i32,
    ) {
        server
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "csharp".into(),
                    version,
                    text: text.into(),
                },
            })
            .await;
    }

    #[tokio::test]
    async fn initialize_advertises_the_handler_set() {
        let dir = tempdir().unwrap();
        test_support::write_sample_to(dir.path()).unwrap();
        let server = CSharpLanguageServer::with_backend(
            NoopClient,
            Arc::new(ScannerBackend::new()),
            ServerOptions {
                solution_path: Some(dir.path().to_path_buf()),
            },
        );
        let result = server
            .initialize(InitializeParams::default())
            .await
            .unwrap();
        let caps = result.capabilities;

        assert_eq!(
            caps.hover_provider,
            Some(HoverProviderCapability::Simple(true))
        );
        assert_eq!(caps.rename_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.definition_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.references_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.document_highlight_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.document_symbol_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.workspace_symbol_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.document_formatting_provider, Some(OneOf::Left(true)));
        assert_eq!(
            caps.document_range_formatting_provider,
            Some(OneOf::Left(true))
        );
        assert!(matches!(
            caps.implementation_provider,
            Some(ImplementationProviderCapability::Simple(true))
        ));

        let Some(TextDocumentSyncCapability::Options(sync)) = caps.text_document_sync else {
            panic!("expected sync options");
        };
        assert_eq!(sync.change, Some(TextDocumentSyncKind::INCREMENTAL));
        let Some(TextDocumentSyncSaveOptions::SaveOptions(save)) = sync.save else {
            panic!("expected save options");
        };
        assert_eq!(save.include_text, Some(true));

        let completion = caps.completion_provider.unwrap();
        assert_eq!(
            completion.trigger_characters,
            Some(vec![".".to_string(), "'".to_string()])
        );
        let signature = caps.signature_help_provider.unwrap();
        assert_eq!(
            signature.trigger_characters,
            Some(vec!["(".to_string(), ",".to_string()])
        );
        assert_eq!(
            signature.retrigger_characters,
            Some(vec![",".to_string(), ")".to_string()])
        );
        let on_type = caps.document_on_type_formatting_provider.unwrap();
        assert_eq!(on_type.first_trigger_character, ";");
        assert_eq!(
            on_type.more_trigger_character,
            Some(vec!["}".to_string(), ")".to_string()])
        );
        assert_eq!(
            caps.code_lens_provider,
            Some(CodeLensOptions {
                resolve_provider: Some(true)
            })
        );
        assert!(matches!(
            caps.code_action_provider,
            Some(CodeActionProviderCapability::Options(_))
        ));
    }

    #[tokio::test]
    async fn initialize_on_empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let server = CSharpLanguageServer::with_backend(
            NoopClient,
            Arc::new(ScannerBackend::new()),
            ServerOptions {
                solution_path: Some(dir.path().to_path_buf()),
            },
        );
        let result = server.initialize(InitializeParams::default()).await;
        assert!(result.is_err());
        // The failed initialize released its write lease.
        let snapshot = server.state.state().await.unwrap();
        assert!(!snapshot.write_lease_held);
    }

    #[tokio::test]
    async fn open_new_file_then_hover_shows_method_display() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Class.cs");
        let text = "class Class { void M() {} }";
        open(&server, &uri, text, 1).await;

        let hover = server
            .hover(HoverParams {
                text_document_position_params: position_params(&uri, position_in(text, "M()", 0)),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .expect("hover on M");
        let HoverContents::Markup(content) = hover.contents else {
            panic!("expected markup");
        };
        assert!(content.value.starts_with("`Class.M()`"));
    }

    #[tokio::test]
    async fn change_moves_symbols_to_their_new_positions() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Class.cs");
        open(&server, &uri, "class Class {\n}\n", 1).await;

        server
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version: 2,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: Some(Range {
                        start: Position::new(0, 13),
                        end: Position::new(0, 13),
                    }),
                    range_length: None,
                    text: "\n    int x = 1;".to_string(),
                }],
            })
            .await;

        let response = server
            .document_symbol(DocumentSymbolParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .expect("symbols");
        let DocumentSymbolResponse::Flat(listed) = response else {
            panic!("expected flat symbols");
        };
        let x = listed.iter().find(|s| s.name == "x").expect("symbol for x");
        assert_eq!(x.location.range.start, Position::new(1, 8));
    }

    #[tokio::test]
    async fn rename_edits_both_files() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Greeter.cs");
        let position = position_in(test_support::GREETER_CS, "class Greeter", "class ".len());

        let edit = server
            .rename(RenameParams {
                text_document_position: position_params(&uri, position),
                new_name: "Welcomer".to_string(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .expect("workspace edit");
        let changes = edit.changes.expect("changes map");
        assert_eq!(changes.len(), 2);
        assert!(changes.keys().any(|u| u.path().ends_with("Program.cs")));
        assert!(changes.keys().any(|u| u.path().ends_with("Greeter.cs")));
        let program_edits = changes
            .iter()
            .find(|(u, _)| u.path().ends_with("Program.cs"))
            .map(|(_, e)| e)
            .unwrap();
        assert!(program_edits.iter().all(|e| e.new_text.contains("Welcomer")));
    }

    #[tokio::test]
    async fn invalid_rename_target_is_invalid_params() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Greeter.cs");
        let result = server
            .rename(RenameParams {
                text_document_position: position_params(&uri, Position::new(5, 17)),
                new_name: "not an identifier".to_string(),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn definition_on_console_lands_in_metadata() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Program.cs");
        let position = position_in(test_support::PROGRAM_CS, "Console", 2);
        let definition_params = || GotoDefinitionParams {
            text_document_position_params: position_params(&uri, position),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let response = server
            .goto_definition(definition_params())
            .await
            .unwrap()
            .expect("definition");
        let GotoDefinitionResponse::Array(locations) = response else {
            panic!("expected array");
        };
        let metadata_uri = locations[0].uri.clone();
        assert!(metadata_uri
            .as_str()
            .starts_with("csharp:/metadata/projects/"));

        // The decompiled document is fetchable through csharp/metadata.
        let info = server
            .metadata(MetadataParams {
                text_document: TextDocumentIdentifier {
                    uri: metadata_uri.clone(),
                },
            })
            .await
            .unwrap()
            .expect("metadata descriptor");
        assert_eq!(info.assembly_name, "System.Runtime");
        assert!(info.source.contains("class Console"));

        // Resolving a second time reuses the cached document handle.
        let first = server.state.state().await.unwrap().decompiled_metadata[&metadata_uri]
            .document
            .clone();
        server.goto_definition(definition_params()).await.unwrap();
        let second = server.state.state().await.unwrap().decompiled_metadata[&metadata_uri]
            .document
            .clone();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn close_removes_the_open_version() {
        let server = uninitialized_server(NoopClient);
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        open(&server, &uri, test_support::PROGRAM_CS, 1).await;
        server
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version: 2,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: test_support::PROGRAM_CS.to_string(),
                }],
            })
            .await;

        let snapshot = server.state.state().await.unwrap();
        assert_eq!(snapshot.open_documents.get(&uri), Some(&2));

        server
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
        let snapshot = server.state.state().await.unwrap();
        assert!(!snapshot.open_documents.contains_key(&uri));
        // The solution-side document survives the close.
        assert!(snapshot.document_for_uri(&uri).is_some());
    }

    #[tokio::test]
    async fn burst_of_changes_publishes_diagnostics_once() {
        let client = RecordingClient::default();
        let server = uninitialized_server(client.clone());
        let uri = Url::parse("file:///work/sample/Program.cs").unwrap();
        open(&server, &uri, "class Broken {", 1).await;
        for version in 2..6 {
            server
                .did_change(DidChangeTextDocumentParams {
                    text_document: VersionedTextDocumentIdentifier {
                        uri: uri.clone(),
                        version,
                    },
                    content_changes: vec![TextDocumentContentChangeEvent {
                        range: None,
                        range_length: None,
                        text: format!("class Broken {{ int x{version};"),
                    }],
                })
                .await;
        }

        server.state.emit(StateEvent::TimerTick);
        server.state.state().await.unwrap();

        let published = client.published.lock().unwrap();
        let for_uri: Vec<_> = published.iter().filter(|(u, _, _)| u == &uri).collect();
        assert_eq!(for_uri.len(), 1);
        // The unbalanced brace produced diagnostics, attributed to the
        // latest open version.
        assert!(for_uri[0].1 >= 1);
        assert_eq!(for_uri[0].2, Some(5));
    }

    #[tokio::test]
    async fn requests_on_unknown_documents_yield_empty_success() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Nope.cs");

        assert!(server
            .hover(HoverParams {
                text_document_position_params: position_params(&uri, Position::new(0, 0)),
                work_done_progress_params: WorkDoneProgressParams::default(),
            })
            .await
            .unwrap()
            .is_none());
        assert!(server
            .document_symbol(DocumentSymbolParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .is_none());
        assert!(server
            .references(ReferenceParams {
                text_document_position: position_params(&uri, Position::new(0, 0)),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
                context: ReferenceContext {
                    include_declaration: true,
                },
            })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn signature_help_is_a_placeholder() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Program.cs");
        let result = server
            .signature_help(SignatureHelpParams {
                text_document_position_params: position_params(&uri, Position::new(9, 30)),
                work_done_progress_params: WorkDoneProgressParams::default(),
                context: None,
            })
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn workspace_symbols_cap_at_twenty() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Many.cs");
        let text: String = (0..30).map(|i| format!("class C{i} {{ }}\n")).collect();
        open(&server, &uri, &text, 1).await;

        let listed = server
            .symbol(WorkspaceSymbolParams {
                query: String::new(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(listed.len(), 20);
    }

    #[tokio::test]
    async fn code_actions_on_decompiled_documents_are_empty() {
        let (server, dir) = initialized_server().await;
        let uri = file_uri(&dir, "Program.cs");
        let position = position_in(test_support::PROGRAM_CS, "Console", 0);
        let response = server
            .goto_definition(GotoDefinitionParams {
                text_document_position_params: position_params(&uri, position),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        let GotoDefinitionResponse::Array(locations) = response else {
            panic!("expected locations");
        };
        let metadata_uri = locations[0].uri.clone();

        let actions = server
            .code_action(CodeActionParams {
                text_document: TextDocumentIdentifier { uri: metadata_uri },
                range: Range::default(),
                context: CodeActionContext::default(),
                work_done_progress_params: WorkDoneProgressParams::default(),
                partial_result_params: PartialResultParams::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(actions.is_empty());
    }
}
