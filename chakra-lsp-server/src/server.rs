use chakra_lsp_core::{Analyzer, DependencyTracker, Dialect, DocumentStore, TreeSitterParser, MANIFEST_FILE};
use chakra_lsp_protocol::handlers::{CompletionContext, Handlers};
use lsp_types::*;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

pub struct ChakraLanguageServer {
    client: Client,
    documents: Arc<RwLock<DocumentStore>>,
    analyzer: Arc<RwLock<Analyzer>>,
    tracker: Arc<RwLock<DependencyTracker>>,
}

impl ChakraLanguageServer {
    pub fn new(client: Client) -> Self {
        info!("Initializing language server");
        Self {
            client,
            documents: Arc::new(RwLock::new(DocumentStore::new())),
            analyzer: Arc::new(RwLock::new(Analyzer::new(Box::new(
                TreeSitterParser::new(),
            )))),
            tracker: Arc::new(RwLock::new(DependencyTracker::new())),
        }
    }

    fn handlers(&self) -> Handlers {
        Handlers::new(
            self.documents.clone(),
            self.analyzer.clone(),
            self.tracker.clone(),
        )
    }

    /// Reparse a document's current text, replacing its cached analysis.
    /// Parse failures are expected mid-edit; the previous analysis stays.
    async fn reanalyze(&self, uri: &Url) {
        let text = {
            let documents = self.documents.read().await;
            match documents.text(uri) {
                Some(text) => text.to_string(),
                None => return,
            }
        };

        let mut analyzer = self.analyzer.write().await;
        match analyzer.analyze(uri, &text, true) {
            Ok(parsed) => debug!(
                "Analyzed {} (library imported: {})",
                uri,
                parsed.imports_target()
            ),
            Err(e) => debug!("Analysis unavailable for {}: {}", uri, e),
        }
    }

    /// Handler for the `chakra/completionContext` request: which library
    /// component encloses the given position, if any.
    pub async fn completion_context_request(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<CompletionContext>> {
        debug!(
            "Completion context request for {} at {}:{}",
            params.text_document.uri, params.position.line, params.position.character
        );
        Ok(self.handlers().completion_context(params).await)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ChakraLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("Initialize request received");

        let folders = match params.workspace_folders {
            Some(folders) => folders,
            None => params
                .root_uri
                .map(|uri| {
                    let name = uri
                        .path_segments()
                        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                        .unwrap_or_default()
                        .to_string();
                    vec![WorkspaceFolder { uri, name }]
                })
                .unwrap_or_default(),
        };
        self.tracker.write().await.initialize(&folders).await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "chakra-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("Server initialized");

        // Watch every manifest in the workspace so dependency flags follow
        // edits to package.json files, including nested ones.
        let registration = Registration {
            id: "chakra-lsp-manifest-watch".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
                watchers: vec![FileSystemWatcher {
                    glob_pattern: GlobPattern::String(format!("**/{}", MANIFEST_FILE)),
                    kind: None,
                }],
            })
            .ok(),
        };
        if let Err(e) = self.client.register_capability(vec![registration]).await {
            warn!("Failed to register manifest watcher: {}", e);
        }
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutdown request received");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        if Dialect::from_language_id(&params.text_document.language_id).is_none() {
            debug!(
                "Ignoring {} with unsupported language id {}",
                uri, params.text_document.language_id
            );
            return;
        }
        info!("Document opened: {}", uri);

        self.documents.write().await.open(params.text_document);
        self.reanalyze(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!(
            "Document changed: {} (version {})",
            uri, params.text_document.version
        );

        self.documents.write().await.apply_changes(
            &uri,
            params.text_document.version,
            &params.content_changes,
        );
        self.reanalyze(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        info!("Document closed: {}", params.text_document.uri);
        // Only the open text is dropped. The cached analysis stays until
        // the cache evicts it.
        self.documents.write().await.close(&params.text_document.uri);
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        info!("{} manifest file event(s)", params.changes.len());
        self.tracker
            .write()
            .await
            .apply_manifest_changes(&params.changes)
            .await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        info!(
            "Workspace folders changed: {} added, {} removed",
            params.event.added.len(),
            params.event.removed.len()
        );
        self.tracker.write().await.update_folders(&params.event).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        self.handlers().hover(params).await
    }
}
