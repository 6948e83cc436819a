use crate::imports::{resolve_imports, ImportMap};
use crate::matcher::contains;
use crate::parser::{Dialect, ParseFailure, SyntaxParser};
use crate::syntax::{Element, Module};
use crate::CHAKRA_PACKAGE;
use lru::LruCache;
use lsp_types::{Position, Url};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// How many per-document analyses are retained before the least recently
/// used one is dropped.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Immutable result of analyzing one document: the lowered module plus the
/// resolved bindings for the target library.
///
/// `imports` is `None` when the document does not import the library at all;
/// queries against such a document always come back empty.
#[derive(Debug)]
pub struct ParsedDocument {
    pub module: Module,
    pub imports: Option<ImportMap>,
}

impl ParsedDocument {
    /// Whether the document imports the target library.
    pub fn imports_target(&self) -> bool {
        self.imports.is_some()
    }

    /// The outermost library element whose range contains `position`.
    ///
    /// Candidates are elements whose tag resolves through the import map;
    /// anything else, including host elements like `div`, is skipped. The
    /// document-order walk makes the first hit the outermost enclosing
    /// candidate.
    pub fn element_at(&self, position: Position) -> Option<&Element> {
        self.matches_at(position).next()
    }

    /// Like [`ParsedDocument::element_at`] but returns the innermost
    /// enclosing candidate, the most specific element under the cursor.
    pub fn innermost_element_at(&self, position: Position) -> Option<&Element> {
        self.matches_at(position).last()
    }

    /// Canonical export name for an element, through the import map.
    pub fn canonical_name(&self, element: &Element) -> Option<&str> {
        self.imports.as_ref()?.canonical(&element.tag)
    }

    fn matches_at(&self, position: Position) -> impl Iterator<Item = &Element> {
        let imports = self.imports.as_ref();
        self.module
            .elements_preorder()
            .filter(move |element| match (element.range, imports) {
                (Some(range), Some(map)) => {
                    map.contains(&element.tag) && contains(position, range)
                }
                _ => false,
            })
    }
}

/// Cache statistics, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
}

/// Per-document analysis front end.
///
/// Results are cached per uri and shared as `Arc`s, so repeated queries
/// against an unchanged document reuse the same analysis without reparsing.
/// Entries leave the cache only through invalidation by a newer parse or
/// LRU eviction; a document evicted and queried again is transparently
/// reparsed.
pub struct Analyzer {
    parser: Box<dyn SyntaxParser>,
    cache: LruCache<Url, Arc<ParsedDocument>>,
    target: String,
}

impl Analyzer {
    pub fn new(parser: Box<dyn SyntaxParser>) -> Self {
        Self::with_capacity(parser, DEFAULT_CACHE_SIZE)
    }

    pub fn with_capacity(parser: Box<dyn SyntaxParser>, capacity: usize) -> Self {
        Self {
            parser,
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            target: CHAKRA_PACKAGE.to_string(),
        }
    }

    /// Analyze `text` for `uri`, reusing the cached result unless
    /// `invalidate` is set.
    ///
    /// `invalidate` must be `true` whenever `text` changed since the last
    /// call for this uri; the cache is keyed by uri alone and cannot detect
    /// stale text on its own. On a parse failure the previous cached entry
    /// is left in place, so mid-edit queries keep answering from the last
    /// good analysis.
    pub fn analyze(
        &mut self,
        uri: &Url,
        text: &str,
        invalidate: bool,
    ) -> Result<Arc<ParsedDocument>, ParseFailure> {
        if !invalidate {
            if let Some(entry) = self.cache.get(uri) {
                debug!("Analysis cache hit for {}", uri);
                return Ok(Arc::clone(entry));
            }
        }

        let dialect = Dialect::from_uri(uri);
        let module = self.parser.parse(text, dialect)?;
        let imports = resolve_imports(&module, &self.target);
        debug!(
            "Analyzed {} as {:?}: {} import(s), {} element(s), target imported: {}",
            uri,
            dialect,
            module.imports.len(),
            module.element_count(),
            imports.is_some()
        );

        let entry = Arc::new(ParsedDocument { module, imports });
        if self.cache.len() == usize::from(self.cache.cap()) && !self.cache.contains(uri) {
            if let Some((evicted, _)) = self.cache.pop_lru() {
                debug!("Evicting least recently used analysis for {}", evicted);
            }
        }
        self.cache.put(uri.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Whether a result for `uri` is currently cached. Does not touch
    /// recency.
    pub fn is_cached(&self, uri: &Url) -> bool {
        self.cache.peek(uri).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            capacity: usize::from(self.cache.cap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MockSyntaxParser;
    use crate::syntax::{ImportDeclaration, ImportSpecifier};
    use lsp_types::Range;
    use mockall::Sequence;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///workspace/src/{name}")).unwrap()
    }

    fn range(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Range {
        Range {
            start: Position {
                line: start_line,
                character: start_character,
            },
            end: Position {
                line: end_line,
                character: end_character,
            },
        }
    }

    fn chakra_import(specifiers: Vec<ImportSpecifier>) -> ImportDeclaration {
        ImportDeclaration {
            source: CHAKRA_PACKAGE.to_string(),
            specifiers,
            range: Some(range(0, 0, 0, 50)),
        }
    }

    fn named(imported: &str, local: &str) -> ImportSpecifier {
        ImportSpecifier::Named {
            imported: imported.to_string(),
            local: local.to_string(),
        }
    }

    fn element(tag: &str, range: Range, children: Vec<Element>) -> Element {
        Element {
            tag: tag.to_string(),
            range: Some(range),
            children,
        }
    }

    /// Module with `import { Button as Btn }` and one `<Btn>` element.
    fn button_module() -> Module {
        Module {
            imports: vec![chakra_import(vec![named("Button", "Btn")])],
            elements: vec![element("Btn", range(2, 4, 2, 30), vec![])],
        }
    }

    fn parsed(module: Module) -> ParsedDocument {
        let imports = resolve_imports(&module, CHAKRA_PACKAGE);
        ParsedDocument { module, imports }
    }

    /// Test: identical queries reuse the cached analysis without reparsing
    #[test]
    fn test_cache_hit_skips_parse() {
        let mut parser = MockSyntaxParser::new();
        parser
            .expect_parse()
            .times(1)
            .returning(|_, _| Ok(button_module()));

        let mut analyzer = Analyzer::new(Box::new(parser));
        let uri = uri("App.tsx");
        let first = analyzer.analyze(&uri, "source", false).unwrap();
        let second = analyzer.analyze(&uri, "source", false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Test: invalidation forces a reparse and replaces the entry
    #[test]
    fn test_invalidate_forces_reparse() {
        let mut parser = MockSyntaxParser::new();
        parser
            .expect_parse()
            .times(2)
            .returning(|_, _| Ok(button_module()));

        let mut analyzer = Analyzer::new(Box::new(parser));
        let uri = uri("App.tsx");
        let first = analyzer.analyze(&uri, "v1", false).unwrap();
        let second = analyzer.analyze(&uri, "v2", true).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    /// Test: a failed parse leaves the previous entry answering queries
    #[test]
    fn test_parse_failure_preserves_cache() {
        let mut sequence = Sequence::new();
        let mut parser = MockSyntaxParser::new();
        parser
            .expect_parse()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(button_module()));
        parser
            .expect_parse()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| {
                Err(ParseFailure::Syntax {
                    line: 3,
                    character: 7,
                })
            });

        let mut analyzer = Analyzer::new(Box::new(parser));
        let uri = uri("App.tsx");
        let good = analyzer.analyze(&uri, "good", true).unwrap();

        let failure = analyzer.analyze(&uri, "good but brok", true);
        assert_eq!(
            failure.unwrap_err(),
            ParseFailure::Syntax {
                line: 3,
                character: 7
            }
        );

        // Third call must hit the cache; the mock rejects a third parse.
        let stale = analyzer.analyze(&uri, "good but brok", false).unwrap();
        assert!(Arc::ptr_eq(&good, &stale));
    }

    /// Test: "library not imported" is itself a cached result
    #[test]
    fn test_not_imported_is_cached() {
        let mut parser = MockSyntaxParser::new();
        parser
            .expect_parse()
            .times(1)
            .returning(|_, _| Ok(Module::default()));

        let mut analyzer = Analyzer::new(Box::new(parser));
        let uri = uri("plain.ts");
        let first = analyzer.analyze(&uri, "export {}", false).unwrap();
        assert!(!first.imports_target());

        let second = analyzer.analyze(&uri, "export {}", false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Test: exceeding capacity evicts the least recently used entry
    #[test]
    fn test_lru_eviction() {
        let mut parser = MockSyntaxParser::new();
        parser.expect_parse().returning(|_, _| Ok(button_module()));

        let mut analyzer = Analyzer::with_capacity(Box::new(parser), 2);
        let first = uri("a.tsx");
        let second = uri("b.tsx");
        let third = uri("c.tsx");

        analyzer.analyze(&first, "a", false).unwrap();
        analyzer.analyze(&second, "b", false).unwrap();
        analyzer.analyze(&third, "c", false).unwrap();

        assert!(!analyzer.is_cached(&first));
        assert!(analyzer.is_cached(&second));
        assert!(analyzer.is_cached(&third));
        assert_eq!(
            analyzer.stats(),
            CacheStats {
                entries: 2,
                capacity: 2
            }
        );

        // The evicted document reparses transparently on the next query.
        assert!(analyzer.analyze(&first, "a", false).is_ok());
        assert!(analyzer.is_cached(&first));
    }

    /// Test: outermost candidate wins, innermost available on request
    #[test]
    fn test_element_queries_nested() {
        let module = Module {
            imports: vec![chakra_import(vec![
                named("Box", "Box"),
                named("Button", "Btn"),
            ])],
            elements: vec![element(
                "Box",
                range(1, 4, 5, 10),
                vec![element("Btn", range(2, 6, 2, 40), vec![])],
            )],
        };
        let parsed = parsed(module);
        let position = Position {
            line: 2,
            character: 8,
        };

        assert_eq!(parsed.element_at(position).map(|el| el.tag.as_str()), Some("Box"));
        assert_eq!(
            parsed.innermost_element_at(position).map(|el| el.tag.as_str()),
            Some("Btn")
        );
    }

    /// Test: elements whose tag is not a library binding are not candidates
    #[test]
    fn test_unimported_tags_are_skipped() {
        let module = Module {
            imports: vec![chakra_import(vec![named("Button", "Btn")])],
            elements: vec![element(
                "Wrapper",
                range(1, 0, 5, 20),
                vec![element("Btn", range(2, 2, 2, 18), vec![])],
            )],
        };
        let parsed = parsed(module);
        let position = Position {
            line: 2,
            character: 5,
        };

        // Wrapper encloses the cursor too but only Btn resolves.
        assert_eq!(parsed.element_at(position).map(|el| el.tag.as_str()), Some("Btn"));
        assert_eq!(
            parsed.canonical_name(parsed.element_at(position).unwrap()),
            Some("Button")
        );
    }

    /// Test: no import map means no candidates at any position
    #[test]
    fn test_no_import_map_no_matches() {
        let module = Module {
            imports: vec![],
            elements: vec![element("Btn", range(0, 0, 0, 20), vec![])],
        };
        let parsed = parsed(module);
        assert!(parsed.imports.is_none());
        assert_eq!(
            parsed.element_at(Position {
                line: 0,
                character: 4
            }),
            None
        );
    }

    /// Test: a rangeless element never matches a position
    #[test]
    fn test_element_without_range_never_matches() {
        let module = Module {
            imports: vec![chakra_import(vec![named("Button", "Btn")])],
            elements: vec![Element {
                tag: "Btn".to_string(),
                range: None,
                children: vec![],
            }],
        };
        let parsed = parsed(module);
        assert_eq!(
            parsed.element_at(Position {
                line: 0,
                character: 0
            }),
            None
        );
    }
}
