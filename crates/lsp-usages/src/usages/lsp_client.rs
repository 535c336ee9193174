//! Semantic service backed by a language server over stdio.
//!
//! Occurrences come from `textDocument/semanticTokens/full`, definitions from
//! `textDocument/definition`. The view stack lives on this side; moving the
//! view onto a file the server has not seen yet opens it there once.

use super::config::ServerConfig;
use super::document::Document;
use super::error::{ResolveError, SemanticError};
use super::helpers::{path_to_uri, uri_to_path};
use super::position::{Occurrence, Position};
use super::semantic::{SemanticService, ViewStack};
use async_lsp::concurrency::ConcurrencyLayer;
use async_lsp::lsp_types::notification::{LogMessage, Progress, PublishDiagnostics, ShowMessage};
use async_lsp::lsp_types::request::WorkDoneProgressCreate;
use async_lsp::lsp_types::{
    ClientCapabilities, DidOpenTextDocumentParams, GotoCapability, GotoDefinitionParams,
    GotoDefinitionResponse, InitializeParams, InitializedParams, MessageType,
    Position as LspPosition, SemanticToken, SemanticTokenType, SemanticTokensClientCapabilities,
    SemanticTokensClientCapabilitiesRequests, SemanticTokensFullOptions, SemanticTokensParams,
    SemanticTokensResult, SemanticTokensServerCapabilities, ServerCapabilities,
    TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, TokenFormat, Url, WorkspaceFolder,
};
use async_lsp::panic::CatchUnwindLayer;
use async_lsp::router::Router;
use async_lsp::tracing::TracingLayer;
use async_lsp::{LanguageServer, MainLoop, ServerSocket};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tower::ServiceBuilder;
use tracing::{debug, error, info, warn};

/// Token types that name things; keywords, literals, comments and operators are not occurrences
const IDENTIFIER_TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::NAMESPACE,
    SemanticTokenType::TYPE,
    SemanticTokenType::CLASS,
    SemanticTokenType::ENUM,
    SemanticTokenType::INTERFACE,
    SemanticTokenType::STRUCT,
    SemanticTokenType::TYPE_PARAMETER,
    SemanticTokenType::PARAMETER,
    SemanticTokenType::VARIABLE,
    SemanticTokenType::PROPERTY,
    SemanticTokenType::ENUM_MEMBER,
    SemanticTokenType::EVENT,
    SemanticTokenType::FUNCTION,
    SemanticTokenType::METHOD,
    SemanticTokenType::MACRO,
    SemanticTokenType::DECORATOR,
];

/// Stops the client main loop
struct Stop;

/// State of the client side of the connection; server traffic is only logged
struct ClientState;

/// A running language server used as the semantic service.
pub struct LspSemantic {
    server: ServerSocket,
    mainloop: JoinHandle<()>,
    /// Held so the server process is killed when this is dropped
    _child: Child,
    language_id: String,
    legend: Option<Vec<SemanticTokenType>>,
    retries: u32,
    retry_delay: Duration,
    documents: HashMap<PathBuf, Arc<Document>>,
    opened: HashSet<PathBuf>,
    views: ViewStack,
}

impl LspSemantic {
    /// Spawn the configured server in `root` and complete the initialize handshake
    pub async fn start(config: &ServerConfig, root: &Path) -> Result<Self, SemanticError> {
        let (mainloop, mut server) = MainLoop::new_client(|_server| {
            let mut router = Router::new(ClientState);
            router
                .notification::<LogMessage>(|_, params| {
                    debug!(target: "lsp_usages::server", "{}", params.message);
                    ControlFlow::Continue(())
                })
                .notification::<ShowMessage>(|_, params| {
                    if params.typ == MessageType::ERROR {
                        warn!(target: "lsp_usages::server", "{}", params.message);
                    } else {
                        info!(target: "lsp_usages::server", "{}", params.message);
                    }
                    ControlFlow::Continue(())
                })
                .notification::<PublishDiagnostics>(|_, _| ControlFlow::Continue(()))
                .notification::<Progress>(|_, _| ControlFlow::Continue(()))
                .request::<WorkDoneProgressCreate, _>(|_, _| futures::future::ready(Ok(())))
                .unhandled_notification(|_, notification| {
                    debug!(method = %notification.method, "ignoring server notification");
                    ControlFlow::Continue(())
                })
                .event(|_, _: Stop| ControlFlow::Break(Ok(())));

            ServiceBuilder::new()
                .layer(TracingLayer::default())
                .layer(CatchUnwindLayer::default())
                .layer(ConcurrencyLayer::default())
                .service(router)
        });

        let launch_error = |source: std::io::Error| SemanticError::Launch {
            program: config.command.clone(),
            source,
        };
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_error)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| launch_error(std::io::Error::other("server stdout not captured")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch_error(std::io::Error::other("server stdin not captured")))?;

        let mainloop = tokio::spawn(async move {
            if let Err(err) = mainloop.run_buffered(stdout.compat(), stdin.compat_write()).await {
                error!("language server connection ended: {err}");
            }
        });

        let root_uri = path_to_uri(root).ok_or_else(|| {
            SemanticError::Handshake(format!("project root is not absolute: {}", root.display()))
        })?;
        let root_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());

        #[allow(deprecated)]
        let params = InitializeParams {
            root_uri: Some(root_uri.clone()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name: root_name,
            }]),
            initialization_options: config.initialization_options.clone(),
            capabilities: client_capabilities(),
            ..InitializeParams::default()
        };
        let initialized = server
            .initialize(params)
            .await
            .map_err(|err| SemanticError::Handshake(err.to_string()))?;
        server
            .initialized(InitializedParams {})
            .map_err(|err| SemanticError::Handshake(err.to_string()))?;

        let legend = token_legend(&initialized.capabilities);
        info!(
            server = %config.command,
            semantic_tokens = legend.is_some(),
            "language server initialized"
        );

        Ok(Self {
            server,
            mainloop,
            _child: child,
            language_id: config.language_id.clone(),
            legend,
            retries: config.retries,
            retry_delay: config.retry_delay,
            documents: HashMap::new(),
            opened: HashSet::new(),
            views: ViewStack::new(),
        })
    }

    /// Shut the server down and wait for the connection to close
    pub async fn shutdown(mut self) -> Result<(), SemanticError> {
        self.server
            .shutdown(())
            .await
            .map_err(|err| SemanticError::MainLoop(err.to_string()))?;
        if let Err(err) = self.server.exit(()) {
            debug!("exit notification not delivered: {err}");
        }
        if let Err(err) = self.server.emit(Stop) {
            debug!("main loop already stopped: {err}");
        }
        self.mainloop
            .await
            .map_err(|err| SemanticError::MainLoop(err.to_string()))
    }

    async fn load(&mut self, path: &Path) -> std::io::Result<Arc<Document>> {
        if let Some(document) = self.documents.get(path) {
            return Ok(document.clone());
        }
        let document = Arc::new(Document::load(path).await?);
        self.documents.insert(path.to_path_buf(), document.clone());
        Ok(document)
    }

    /// Load `path` and make sure the server has it open
    async fn open(&mut self, path: &Path) -> Result<(Arc<Document>, Url), ResolveError> {
        let document = self
            .load(path)
            .await
            .map_err(|source| ResolveError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let uri = path_to_uri(path)
            .ok_or_else(|| ResolveError::Request(format!("not an absolute path: {}", path.display())))?;

        if self.opened.insert(path.to_path_buf()) {
            debug!(path = %path.display(), "opening document in language server");
            let opened = self.server.did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: self.language_id.clone(),
                    version: 0,
                    text: document.text().to_string(),
                },
            });
            if let Err(err) = opened {
                self.opened.remove(path);
                return Err(ResolveError::Request(err.to_string()));
            }
        }
        Ok((document, uri))
    }
}

#[async_trait]
impl SemanticService for LspSemantic {
    fn views(&self) -> &ViewStack {
        &self.views
    }

    fn views_mut(&mut self) -> &mut ViewStack {
        &mut self.views
    }

    async fn document(&mut self, path: &Path) -> std::io::Result<Arc<Document>> {
        self.load(path).await
    }

    async fn occurrences(&mut self) -> Vec<Occurrence> {
        let Some(view) = self.views.current().cloned() else {
            return Vec::new();
        };
        if self.legend.is_none() {
            debug!("server has no semantic tokens; no occurrences");
            return Vec::new();
        }
        let (document, uri) = match self.open(&view.file).await {
            Ok(opened) => opened,
            Err(err) => {
                debug!("occurrences unavailable: {err}");
                return Vec::new();
            }
        };

        let params = SemanticTokensParams {
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            text_document: TextDocumentIdentifier { uri },
        };
        let mut server = self.server.clone();
        let response = with_retries(self.retries, self.retry_delay, || {
            server.semantic_tokens_full(params.clone())
        })
        .await;

        let data = match response {
            Ok(Some(SemanticTokensResult::Tokens(tokens))) => tokens.data,
            Ok(Some(SemanticTokensResult::Partial(partial))) => partial.data,
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!("semantic tokens request failed: {err}");
                Vec::new()
            }
        };
        decode_tokens(&document, &data, self.legend.as_deref())
    }

    async fn definition_at_cursor(&mut self) -> Result<Position, ResolveError> {
        let view = self.views.current().cloned().ok_or(ResolveError::NoView)?;
        let (document, uri) = self.open(&view.file).await?;

        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: view.to_lsp(document.line(view.line)),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        let mut server = self.server.clone();
        let response = with_retries(self.retries, self.retry_delay, || {
            server.definition(params.clone())
        })
        .await
        .map_err(|err| ResolveError::Request(err.to_string()))?;

        let Some((target_uri, target)) = response.and_then(first_target) else {
            return Err(ResolveError::NoResolution(view));
        };
        let Some(path) = uri_to_path(&target_uri) else {
            return Err(ResolveError::NoResolution(view));
        };
        let target_document = self.load(&path).await.ok();
        let line_text = target_document
            .as_deref()
            .and_then(|doc| doc.line(target.line + 1));
        Ok(Position::from_lsp(path, target, line_text))
    }
}

fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        text_document: Some(TextDocumentClientCapabilities {
            definition: Some(GotoCapability {
                dynamic_registration: Some(false),
                link_support: Some(true),
            }),
            semantic_tokens: Some(SemanticTokensClientCapabilities {
                dynamic_registration: Some(false),
                requests: SemanticTokensClientCapabilitiesRequests {
                    range: Some(false),
                    full: Some(SemanticTokensFullOptions::Bool(true)),
                },
                token_types: IDENTIFIER_TOKEN_TYPES.to_vec(),
                token_modifiers: Vec::new(),
                formats: vec![TokenFormat::RELATIVE],
                overlapping_token_support: Some(false),
                multiline_token_support: Some(false),
                server_cancel_support: Some(false),
                augments_syntax_tokens: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Token type legend the server announced, if it serves semantic tokens at all
fn token_legend(capabilities: &ServerCapabilities) -> Option<Vec<SemanticTokenType>> {
    match capabilities.semantic_tokens_provider.as_ref()? {
        SemanticTokensServerCapabilities::SemanticTokensOptions(options) => {
            Some(options.legend.token_types.clone())
        }
        SemanticTokensServerCapabilities::SemanticTokensRegistrationOptions(options) => Some(
            options
                .semantic_tokens_options
                .legend
                .token_types
                .clone(),
        ),
    }
}

/// First definition target as (uri, start of its name)
fn first_target(response: GotoDefinitionResponse) -> Option<(Url, LspPosition)> {
    match response {
        GotoDefinitionResponse::Scalar(location) => Some((location.uri, location.range.start)),
        GotoDefinitionResponse::Array(locations) => locations
            .into_iter()
            .next()
            .map(|location| (location.uri, location.range.start)),
        GotoDefinitionResponse::Link(links) => links
            .into_iter()
            .next()
            .map(|link| (link.target_uri, link.target_selection_range.start)),
    }
}

/// Turn delta-encoded semantic tokens into occurrence spans of `document`.
///
/// Tokens whose type the legend names as something other than an identifier
/// are dropped; with no legend every token is kept.
pub(crate) fn decode_tokens(
    document: &Document,
    data: &[SemanticToken],
    legend: Option<&[SemanticTokenType]>,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::with_capacity(data.len());
    let mut line = 0u32;
    let mut start = 0u32;

    for token in data {
        if token.delta_line == 0 {
            start += token.delta_start;
        } else {
            line += token.delta_line;
            start = token.delta_start;
        }

        let is_identifier = legend
            .and_then(|legend| legend.get(token.token_type as usize))
            .is_none_or(|kind| IDENTIFIER_TOKEN_TYPES.contains(kind));
        if !is_identifier {
            continue;
        }

        let text = document.line(line + 1);
        let at = |character| LspPosition { line, character };
        occurrences.push(Occurrence::new(
            Position::from_lsp(document.path(), at(start), text),
            Position::from_lsp(document.path(), at(start + token.length), text),
        ));
    }

    occurrences
}

/// Retry `request` while it fails, up to `retries` extra attempts.
///
/// Servers answer with errors while still loading the project.
async fn with_retries<T, F, Fut>(
    retries: u32,
    delay: Duration,
    mut request: F,
) -> Result<T, async_lsp::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, async_lsp::Error>>,
{
    let mut attempt = 0;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries => {
                attempt += 1;
                debug!(attempt, "retrying language server request: {err}");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
