use crate::syntax::{Element, ImportDeclaration, ImportSpecifier, Module};
use lsp_types::{Position, Range, Url};
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;
use tracing::trace;
use tree_sitter::{Language, Node, Point};

/// Parser preset for a document, derived from its file extension or LSP
/// language id. Plain and React-flavored scripts share one markup-capable
/// grammar; the split matters for TypeScript, where TSX is a separate
/// grammar from TS proper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Javascript,
    JavascriptReact,
    Typescript,
    TypescriptReact,
}

impl Dialect {
    /// Pick a dialect from the document uri's extension. Unknown extensions
    /// fall back to the markup-capable script grammar, which accepts the
    /// widest range of sources.
    pub fn from_uri(uri: &Url) -> Self {
        match Path::new(uri.path()).extension().and_then(OsStr::to_str) {
            Some("ts") => Dialect::Typescript,
            Some("tsx") => Dialect::TypescriptReact,
            Some("js") | Some("cjs") | Some("mjs") => Dialect::Javascript,
            Some("jsx") => Dialect::JavascriptReact,
            _ => Dialect::JavascriptReact,
        }
    }

    /// Map an LSP language id to a dialect. `None` means the document is not
    /// one the analyzer understands.
    pub fn from_language_id(language_id: &str) -> Option<Self> {
        match language_id {
            "javascript" => Some(Dialect::Javascript),
            "javascriptreact" => Some(Dialect::JavascriptReact),
            "typescript" => Some(Dialect::Typescript),
            "typescriptreact" => Some(Dialect::TypescriptReact),
            _ => None,
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::Javascript | Dialect::JavascriptReact => tree_sitter_javascript::language(),
            Dialect::Typescript => tree_sitter_typescript::language_typescript(),
            Dialect::TypescriptReact => tree_sitter_typescript::language_tsx(),
        }
    }
}

/// Why a document could not be lowered to a [`Module`].
///
/// Syntax failures are routine while the user is mid-edit. Callers keep any
/// previously cached analysis and degrade queries to "no result" instead of
/// surfacing these to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("syntax error at {line}:{character}")]
    Syntax { line: u32, character: u32 },
    #[error("parser unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Source-to-module lowering seam. The production implementation wraps
/// tree-sitter; tests substitute a mock to control outcomes and count
/// invocations.
#[cfg_attr(test, mockall::automock)]
pub trait SyntaxParser: Send + Sync {
    fn parse(&mut self, text: &str, dialect: Dialect) -> Result<Module, ParseFailure>;
}

/// Tree-sitter backed [`SyntaxParser`]. A `tree_sitter::Parser` is configured
/// per call, which keeps the type `Sync` and lets one instance serve every
/// dialect.
#[derive(Debug, Default)]
pub struct TreeSitterParser;

impl TreeSitterParser {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxParser for TreeSitterParser {
    fn parse(&mut self, text: &str, dialect: Dialect) -> Result<Module, ParseFailure> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(dialect.language())
            .map_err(|e| ParseFailure::Unavailable {
                reason: format!("grammar rejected for {:?}: {}", dialect, e),
            })?;

        let tree = parser
            .parse(text, None)
            .ok_or_else(|| ParseFailure::Unavailable {
                reason: format!("no tree produced for {:?}", dialect),
            })?;

        let root = tree.root_node();
        if let Some(point) = first_syntax_error(root) {
            trace!(
                "Rejecting tree with syntax error at {}:{}",
                point.row,
                point.column
            );
            return Err(ParseFailure::Syntax {
                line: point.row as u32,
                character: point.column as u32,
            });
        }

        Ok(lower_module(root, text.as_bytes()))
    }
}

/// Position of the first error or missing node in the tree, if any.
fn first_syntax_error(node: Node) -> Option<Point> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position());
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(point) = first_syntax_error(child) {
            return Some(point);
        }
    }
    None
}

fn lower_module(root: Node, source: &[u8]) -> Module {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "import_statement" {
            if let Some(declaration) = lower_import(child, source) {
                imports.push(declaration);
            }
        }
    }

    let mut elements = Vec::new();
    collect_elements(root, source, &mut elements);

    Module { imports, elements }
}

fn lower_import(node: Node, source: &[u8]) -> Option<ImportDeclaration> {
    let source_text = node
        .child_by_field_name("source")
        .and_then(|string| string.utf8_text(source).ok())?;
    let module_source = source_text.trim_matches(|c| c == '"' || c == '\'' || c == '`');

    let mut specifiers = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "import_clause" {
            lower_import_clause(child, source, &mut specifiers);
        }
    }

    Some(ImportDeclaration {
        source: module_source.to_string(),
        specifiers,
        range: Some(node_range(node)),
    })
}

fn lower_import_clause(clause: Node, source: &[u8], specifiers: &mut Vec<ImportSpecifier>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            // A bare identifier in the clause is the default import.
            "identifier" => {
                if let Ok(local) = child.utf8_text(source) {
                    specifiers.push(ImportSpecifier::Default {
                        local: local.to_string(),
                    });
                }
            }
            "namespace_import" => {
                let mut names = child.walk();
                for name in child.named_children(&mut names) {
                    if name.kind() == "identifier" {
                        if let Ok(local) = name.utf8_text(source) {
                            specifiers.push(ImportSpecifier::Namespace {
                                local: local.to_string(),
                            });
                        }
                    }
                }
            }
            "named_imports" => {
                let mut names = child.walk();
                for specifier in child.named_children(&mut names) {
                    if specifier.kind() != "import_specifier" {
                        continue;
                    }
                    let imported = specifier
                        .child_by_field_name("name")
                        .and_then(|name| name.utf8_text(source).ok());
                    if let Some(imported) = imported {
                        let local = specifier
                            .child_by_field_name("alias")
                            .and_then(|alias| alias.utf8_text(source).ok())
                            .unwrap_or(imported);
                        specifiers.push(ImportSpecifier::Named {
                            imported: imported.to_string(),
                            local: local.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

/// Collect markup elements from anywhere under `node`, in document order.
/// Elements nested inside expressions or attributes are found by descending
/// through every non-element node.
fn collect_elements(node: Node, source: &[u8], out: &mut Vec<Element>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "jsx_element" | "jsx_self_closing_element" => lower_element(child, source, out),
            _ => collect_elements(child, source, out),
        }
    }
}

/// Lower one markup node into `out`. A fragment's opening tag carries no
/// name; the fragment forms no node of its own and its children are spliced
/// into the surrounding level.
fn lower_element(node: Node, source: &[u8], out: &mut Vec<Element>) {
    let Some(tag) = element_tag(node, source) else {
        collect_elements(node, source, out);
        return;
    };

    let mut children = Vec::new();
    collect_elements(node, source, &mut children);

    out.push(Element {
        tag,
        range: Some(node_range(node)),
        children,
    });
}

fn element_tag(node: Node, source: &[u8]) -> Option<String> {
    let name = match node.kind() {
        "jsx_self_closing_element" => node.child_by_field_name("name"),
        // A paired element's tag lives on its opening element.
        _ => node
            .child(0)
            .and_then(|opening| opening.child_by_field_name("name")),
    };
    name.and_then(|name| name.utf8_text(source).ok())
        .map(str::to_string)
}

fn node_range(node: Node) -> Range {
    Range {
        start: point_to_position(node.start_position()),
        end: point_to_position(node.end_position()),
    }
}

fn point_to_position(point: Point) -> Position {
    Position {
        line: point.row as u32,
        character: point.column as u32,
    }
}
