use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use blocklink_core::BlockModel;
use blocklink_core::BlockStore;
use blocklink_core::BlocklinkConfig;
use blocklink_core::BlocklinkError;
use blocklink_core::Point;
use blocklink_core::Span;
use blocklink_core::classify;
use blocklink_core::complete;
use blocklink_core::define;
use blocklink_core::is_block_path;
use blocklink_core::is_template_path;
use blocklink_core::normalize_path;
use blocklink_core::pair_path;
use blocklink_core::parse_block_source;
use blocklink_core::validate_template;
use tokio::sync::RwLock;
use tower_lsp_server::Client;
use tower_lsp_server::LanguageServer;
use tower_lsp_server::jsonrpc::Result as LspResult;
use tower_lsp_server::ls_types::*;

/// State for a single open document.
#[derive(Debug, Clone)]
struct DocumentState {
	/// The full text content of the document.
	content: String,
}

/// Workspace-level state shared across all LSP requests.
#[derive(Debug, Default)]
struct WorkspaceState {
	/// The workspace root path.
	root: Option<PathBuf>,
	/// Open documents keyed by URI.
	documents: HashMap<Uri, DocumentState>,
	/// Compiled block models, keyed by normalized file path.
	store: BlockStore,
	/// Settings loaded from `blocklink.toml` at initialize time.
	config: BlocklinkConfig,
}

impl WorkspaceState {
	/// Record the latest text for a document.
	fn update_document(&mut self, uri: &Uri, content: String) {
		self.documents
			.insert(uri.clone(), DocumentState { content });
	}
}

// ---------------------------------------------------------------------------
// Position mapping
// ---------------------------------------------------------------------------

fn document_path(uri: &Uri) -> Option<PathBuf> {
	uri.to_file_path().map(std::borrow::Cow::into_owned)
}

/// Convert an LSP `Position` (0-indexed line, character in UTF-16 code
/// units) to a byte-column `Point` within `content`. Returns `None` if the
/// position is out of bounds.
fn point_from_lsp(content: &str, position: Position) -> Option<Point> {
	for (index, line) in content.split('\n').enumerate() {
		if index == position.line as usize {
			let mut utf16_offset = 0u32;
			for (byte_index, character) in line.char_indices() {
				if utf16_offset == position.character {
					return Some(Point::new(index, byte_index));
				}
				utf16_offset += character.len_utf16() as u32;
			}
			// Position at end of line (past the last character).
			if utf16_offset == position.character {
				return Some(Point::new(index, line.len()));
			}
			return None;
		}
	}
	None
}

/// Convert a byte-column `Point` to an LSP `Position`.
fn to_lsp_position(point: Point) -> Position {
	Position {
		line: point.line as u32,
		character: point.column as u32,
	}
}

/// Convert a `Span` to an LSP `Range`.
fn to_lsp_range(span: Span) -> Range {
	Range {
		start: to_lsp_position(span.start),
		end: to_lsp_position(span.end),
	}
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Parse a block file standalone and turn a structural failure into a
/// diagnostic. An empty list means the file parses cleanly and clears any
/// previously published diagnostics.
fn block_parse_diagnostics(path: &Path, content: &str) -> Vec<Diagnostic> {
	match parse_block_source(path, content) {
		Ok(_) => Vec::new(),
		Err(BlocklinkError::BlockSyntax { span, message, .. }) => {
			vec![Diagnostic {
				range: to_lsp_range(span),
				severity: Some(DiagnosticSeverity::ERROR),
				source: Some("blocklink".to_string()),
				message,
				..Default::default()
			}]
		}
		Err(error) => {
			vec![Diagnostic {
				range: Range::default(),
				severity: Some(DiagnosticSeverity::ERROR),
				source: Some("blocklink".to_string()),
				message: error.to_string(),
				..Default::default()
			}]
		}
	}
}

/// Diagnostics for a template's unresolved class tokens.
fn symbol_diagnostics(content: &str, model: &BlockModel) -> Vec<Diagnostic> {
	validate_template(content, model)
		.into_iter()
		.map(|finding| {
			Diagnostic {
				range: to_lsp_range(finding.span),
				severity: Some(DiagnosticSeverity::WARNING),
				source: Some("blocklink".to_string()),
				message: finding.message,
				..Default::default()
			}
		})
		.collect()
}

/// Revalidate a template against its paired block model. `None` means the
/// document is not a pairable template or its model cannot currently be
/// compiled; the caller keeps whatever was published before.
fn compute_template_diagnostics(state: &mut WorkspaceState, uri: &Uri) -> Option<Vec<Diagnostic>> {
	let WorkspaceState {
		documents, store, ..
	} = state;

	let doc = documents.get(uri)?;
	let path = document_path(uri)?;
	if !is_template_path(&path) {
		return None;
	}

	let pairing = pair_path(&path)?;
	let model = store.get_model(&pairing.block_path).ok()?;

	Some(symbol_diagnostics(&doc.content, &model))
}

/// After a block file save: recompile the template's paired model and
/// revalidate when the saved file sits in its reference chain. `None` skips
/// the republish for templates the save cannot have affected.
fn compute_block_save_revalidation(
	state: &mut WorkspaceState,
	uri: &Uri,
	saved: &Path,
) -> Option<Vec<Diagnostic>> {
	let WorkspaceState {
		documents, store, ..
	} = state;

	let doc = documents.get(uri)?;
	let path = document_path(uri)?;
	if !is_template_path(&path) {
		return None;
	}

	let pairing = pair_path(&path)?;
	let model = store.get_model(&pairing.block_path).ok()?;
	if !model.depends_on(saved) {
		return None;
	}

	Some(symbol_diagnostics(&doc.content, &model))
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

/// Completion items for a cursor inside a template's `class` or `state`
/// attribute. Any miss on the way (no pairing, model compile failure, no
/// context at the cursor) degrades to an empty list.
fn compute_completions(
	state: &mut WorkspaceState,
	uri: &Uri,
	position: Position,
) -> Vec<CompletionItem> {
	let WorkspaceState {
		documents, store, ..
	} = state;

	let Some(doc) = documents.get(uri) else {
		return Vec::new();
	};
	let Some(path) = document_path(uri) else {
		return Vec::new();
	};
	if !is_template_path(&path) {
		return Vec::new();
	}
	let Some(pairing) = pair_path(&path) else {
		return Vec::new();
	};
	let Some(point) = point_from_lsp(&doc.content, position) else {
		return Vec::new();
	};
	let Ok(model) = store.get_model(&pairing.block_path) else {
		return Vec::new();
	};
	let Some(context) = classify(&doc.content, point) else {
		return Vec::new();
	};

	complete(&context, &model)
		.into_iter()
		.map(|label| {
			CompletionItem {
				label,
				kind: Some(CompletionItemKind::PROPERTY),
				..Default::default()
			}
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Go to Definition
// ---------------------------------------------------------------------------

/// Definition location for the class token under the cursor, inside the
/// paired block file. Degrades to `None` on any miss.
fn compute_definition(
	state: &mut WorkspaceState,
	uri: &Uri,
	position: Position,
) -> Option<Location> {
	let WorkspaceState {
		documents, store, ..
	} = state;

	let doc = documents.get(uri)?;
	let path = document_path(uri)?;
	if !is_template_path(&path) {
		return None;
	}

	let pairing = pair_path(&path)?;
	let point = point_from_lsp(&doc.content, position)?;
	let model = store.get_model(&pairing.block_path).ok()?;
	let context = classify(&doc.content, point)?;
	let target = define(&context, &model).ok().flatten()?;

	Some(Location {
		uri: Uri::from_file_path(&target.path)?,
		range: to_lsp_range(target.span),
	})
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The blocklink language server.
#[derive(Debug)]
pub struct BlocklinkLanguageServer {
	client: Client,
	state: RwLock<WorkspaceState>,
}

impl BlocklinkLanguageServer {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			state: RwLock::new(WorkspaceState::default()),
		}
	}

	/// Publish diagnostics for a document, capped at the configured maximum.
	/// Publishing fully replaces whatever was shown before.
	async fn publish(&self, uri: Uri, mut diagnostics: Vec<Diagnostic>) {
		let max_problems = {
			let state = self.state.read().await;
			state.config.lint.max_problems
		};
		diagnostics.truncate(max_problems);

		self.client
			.publish_diagnostics(uri, diagnostics, None)
			.await;
	}

	/// Handle a document being opened or changed. Block files are re-parsed
	/// standalone on every edit; templates wait for a save.
	async fn on_document_change(&self, uri: &Uri, content: String) {
		let diagnostics = document_path(uri)
			.filter(|path| is_block_path(path))
			.map(|path| block_parse_diagnostics(&path, &content));

		{
			let mut state = self.state.write().await;
			state.update_document(uri, content);
		}

		if let Some(diagnostics) = diagnostics {
			self.publish(uri.clone(), diagnostics).await;
		}
	}

	/// Handle a block file save: evict the saved file and its dependents
	/// from the model store, then revalidate every open template whose
	/// recompiled model read the saved file. One stylesheet save can move
	/// diagnostics in several templates at once.
	async fn on_block_saved(&self, saved: &Path) {
		let saved = normalize_path(saved);

		let open_templates: Vec<Uri> = {
			let mut state = self.state.write().await;
			let evicted = state.store.invalidate(&saved);
			tracing::debug!(path = %saved.display(), evicted, "invalidated block models");

			state
				.documents
				.keys()
				.filter(|uri| document_path(uri).is_some_and(|path| is_template_path(&path)))
				.cloned()
				.collect()
		};

		for uri in open_templates {
			let diagnostics = {
				let mut state = self.state.write().await;
				compute_block_save_revalidation(&mut state, &uri, &saved)
			};

			if let Some(diagnostics) = diagnostics {
				self.publish(uri, diagnostics).await;
			}
		}
	}
}

impl LanguageServer for BlocklinkLanguageServer {
	async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
		// Workspace root comes from `workspace_folders` when the client
		// sends it, with the deprecated `root_uri` as the fallback.
		let root = params
			.workspace_folders
			.as_ref()
			.and_then(|folders| folders.first())
			.and_then(|folder| folder.uri.to_file_path().map(std::borrow::Cow::into_owned))
			.or_else(|| {
				#[allow(deprecated)]
				params
					.root_uri
					.as_ref()
					.and_then(|uri| uri.to_file_path().map(std::borrow::Cow::into_owned))
			});

		let config = match root.as_deref().map(BlocklinkConfig::load_or_default) {
			Some(Ok(config)) => config,
			Some(Err(error)) => {
				tracing::warn!(%error, "failed to load blocklink.toml, using defaults");
				BlocklinkConfig::default()
			}
			None => BlocklinkConfig::default(),
		};

		{
			let mut state = self.state.write().await;
			state.root = root;
			state.config = config;
		}

		Ok(InitializeResult {
			capabilities: ServerCapabilities {
				text_document_sync: Some(TextDocumentSyncCapability::Kind(
					TextDocumentSyncKind::FULL,
				)),
				completion_provider: Some(CompletionOptions {
					trigger_characters: Some(vec![
						"\"".to_string(),
						"'".to_string(),
						".".to_string(),
					]),
					..Default::default()
				}),
				definition_provider: Some(OneOf::Left(true)),
				..Default::default()
			},
			server_info: Some(ServerInfo {
				name: "blocklink-lsp".to_string(),
				version: Some(env!("CARGO_PKG_VERSION").to_string()),
			}),
			offset_encoding: None,
		})
	}

	async fn initialized(&self, _: InitializedParams) {
		self.client
			.log_message(MessageType::INFO, "blocklink language server initialized")
			.await;
	}

	async fn shutdown(&self) -> LspResult<()> {
		Ok(())
	}

	async fn did_open(&self, params: DidOpenTextDocumentParams) {
		let uri = params.text_document.uri;
		let content = params.text_document.text;
		self.on_document_change(&uri, content).await;
	}

	async fn did_change(&self, params: DidChangeTextDocumentParams) {
		let uri = params.text_document.uri;

		// Full text sync: the last change carries the complete document.
		if let Some(change) = params.content_changes.into_iter().next_back() {
			self.on_document_change(&uri, change.text).await;
		}
	}

	async fn did_save(&self, params: DidSaveTextDocumentParams) {
		let uri = params.text_document.uri;
		let Some(path) = document_path(&uri) else {
			return;
		};

		if is_block_path(&path) {
			self.on_block_saved(&path).await;
		} else if is_template_path(&path) {
			let diagnostics = {
				let mut state = self.state.write().await;
				compute_template_diagnostics(&mut state, &uri)
			};

			if let Some(diagnostics) = diagnostics {
				self.publish(uri, diagnostics).await;
			}
		}
	}

	async fn did_close(&self, params: DidCloseTextDocumentParams) {
		let uri = params.text_document.uri;
		{
			let mut state = self.state.write().await;
			state.documents.remove(&uri);
		}
		// Clear diagnostics for the closed document.
		self.client.publish_diagnostics(uri, Vec::new(), None).await;
	}

	async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
		let uri = params.text_document_position.text_document.uri;
		let position = params.text_document_position.position;

		let items = {
			let mut state = self.state.write().await;
			compute_completions(&mut state, &uri, position)
		};

		if items.is_empty() {
			Ok(None)
		} else {
			Ok(Some(CompletionResponse::Array(items)))
		}
	}

	async fn goto_definition(
		&self,
		params: GotoDefinitionParams,
	) -> LspResult<Option<GotoDefinitionResponse>> {
		let uri = params.text_document_position_params.text_document.uri;
		let position = params.text_document_position_params.position;

		let location = {
			let mut state = self.state.write().await;
			compute_definition(&mut state, &uri, position)
		};

		Ok(location.map(GotoDefinitionResponse::Scalar))
	}
}

/// Start the LSP server on stdin/stdout. This is used by the `blocklink lsp`
/// CLI subcommand.
pub async fn run_server() {
	// Stdout carries the LSP transport, so logs go to stderr.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.try_init();

	let stdin = tokio::io::stdin();
	let stdout = tokio::io::stdout();

	let (service, socket) = tower_lsp_server::LspService::new(BlocklinkLanguageServer::new);
	tower_lsp_server::Server::new(stdin, stdout, socket)
		.serve(service)
		.await;
}

#[cfg(test)]
mod __tests;
