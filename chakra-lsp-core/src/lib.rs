pub mod analysis;
pub mod document;
pub mod imports;
pub mod matcher;
pub mod parser;
pub mod syntax;
pub mod workspace;

pub use analysis::{Analyzer, CacheStats, ParsedDocument, DEFAULT_CACHE_SIZE};
pub use document::DocumentStore;
pub use imports::{resolve_imports, ImportMap};
pub use matcher::contains;
pub use parser::{Dialect, ParseFailure, SyntaxParser, TreeSitterParser};
pub use syntax::{Element, ImportDeclaration, ImportSpecifier, Module};
pub use workspace::{DependencyTracker, MANIFEST_FILE};

/// The npm package whose usage this server analyzes.
pub const CHAKRA_PACKAGE: &str = "@chakra-ui/react";
