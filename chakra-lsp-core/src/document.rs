use lsp_textdocument::FullTextDocument;
use lsp_types::{TextDocumentContentChangeEvent, TextDocumentItem, Url};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Text of every open document, keyed by uri.
///
/// Incremental change events from the editor are applied through
/// `FullTextDocument`, which handles UTF-16 position arithmetic. The store
/// mirrors only the editor's open set; analysis results live in the
/// [`crate::Analyzer`] and survive a close.
pub struct DocumentStore {
    open: HashMap<Url, FullTextDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            open: HashMap::new(),
        }
    }

    pub fn open(&mut self, item: TextDocumentItem) {
        debug!("Opening {} (version {})", item.uri, item.version);
        let document = FullTextDocument::new(item.language_id, item.version, item.text);
        self.open.insert(item.uri, document);
    }

    /// Apply incremental or full-content changes to an open document.
    /// Changes for unknown uris and out-of-order versions are dropped with a
    /// warning rather than treated as errors.
    pub fn apply_changes(
        &mut self,
        uri: &Url,
        version: i32,
        changes: &[TextDocumentContentChangeEvent],
    ) {
        let Some(document) = self.open.get_mut(uri) else {
            warn!("Change for unopened document {}", uri);
            return;
        };
        if version < document.version() {
            warn!(
                "Stale change for {} (version {} < {}), ignoring",
                uri,
                version,
                document.version()
            );
            return;
        }
        document.update(changes, version);
    }

    pub fn close(&mut self, uri: &Url) {
        if self.open.remove(uri).is_none() {
            warn!("Close for unopened document {}", uri);
        }
    }

    pub fn text(&self, uri: &Url) -> Option<&str> {
        let document = self.open.get(uri)?;
        Some(document.get_content(None))
    }

    pub fn version(&self, uri: &Url) -> Option<i32> {
        let document = self.open.get(uri)?;
        Some(document.version())
    }

    pub fn language_id(&self, uri: &Url) -> Option<&str> {
        let document = self.open.get(uri)?;
        Some(document.language_id())
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.open.contains_key(uri)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
