use chakra_lsp_core::{Analyzer, DependencyTracker, DocumentStore};
use lsp_types::{
    Hover, HoverContents, HoverParams, MarkedString, Position, Range,
    TextDocumentPositionParams, Url,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tracing::debug;

/// What the cursor is inside of, resolved to the library's vocabulary.
/// This is the payload behind the `chakra/completionContext` request; the
/// editor extension uses it to decide which prop documentation to offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    /// Element name as written at the cursor, possibly an import alias.
    pub tag: String,
    /// Canonical export name behind the tag.
    pub component: String,
    /// Full source range of the enclosing element.
    pub range: Range,
}

/// Request handlers shared between the LSP trait methods and the custom
/// protocol extensions. Holds the same state handles as the server itself.
pub struct Handlers {
    documents: Arc<RwLock<DocumentStore>>,
    analyzer: Arc<RwLock<Analyzer>>,
    tracker: Arc<RwLock<DependencyTracker>>,
}

impl Handlers {
    pub fn new(
        documents: Arc<RwLock<DocumentStore>>,
        analyzer: Arc<RwLock<Analyzer>>,
        tracker: Arc<RwLock<DependencyTracker>>,
    ) -> Self {
        Self {
            documents,
            analyzer,
            tracker,
        }
    }

    /// Resolve the library element enclosing the given position.
    ///
    /// Answers `None` whenever any stage cannot contribute: the document's
    /// workspace does not depend on the library, the document is not open,
    /// it has no usable analysis, or the cursor is outside every library
    /// element. None of these are errors to the editor.
    pub async fn completion_context(
        &self,
        params: TextDocumentPositionParams,
    ) -> Option<CompletionContext> {
        let uri = params.text_document.uri;
        let position = params.position;

        if !self.tracker.read().await.applies_to(&uri) {
            debug!("Library is not a dependency for {}", uri);
            return None;
        }

        let text = {
            let documents = self.documents.read().await;
            match documents.text(&uri) {
                Some(text) => text.to_string(),
                None => {
                    debug!("Document not open: {}", uri);
                    return None;
                }
            }
        };

        let parsed = {
            let mut analyzer = self.analyzer.write().await;
            match analyzer.analyze(&uri, &text, false) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("No analysis available for {}: {}", uri, e);
                    return None;
                }
            }
        };

        let element = parsed.element_at(position)?;
        let component = parsed.canonical_name(element)?.to_string();
        let range = element.range?;
        debug!(
            "Position {}:{} is inside <{}> ({})",
            position.line, position.character, element.tag, component
        );

        Some(CompletionContext {
            tag: element.tag.clone(),
            component,
            range,
        })
    }

    /// Standard hover: a one-line description of the enclosing component.
    pub async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let context = self
            .completion_context(params.text_document_position_params)
            .await;

        Ok(context.map(|context| Hover {
            contents: HoverContents::Scalar(MarkedString::String(hover_label(&context))),
            range: Some(context.range),
        }))
    }
}

fn hover_label(context: &CompletionContext) -> String {
    let docs = format!(
        "https://chakra-ui.com/docs/components/{}",
        context.component.to_lowercase()
    );
    if context.tag == context.component {
        format!("{} is a Chakra UI component ({})", context.component, docs)
    } else {
        format!(
            "{} is {}, a Chakra UI component ({})",
            context.tag, context.component, docs
        )
    }
}

/// Convenience for building the params the context endpoints accept.
pub fn position_params(uri: Url, position: Position) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: lsp_types::TextDocumentIdentifier { uri },
        position,
    }
}
