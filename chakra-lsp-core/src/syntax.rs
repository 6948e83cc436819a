use lsp_types::Range;

/// A source file reduced to the two shapes the analysis queries consume:
/// its import declarations and its markup element forest.
///
/// Everything else in the file (statements, expressions, types) is dropped
/// during lowering. Ranges use LSP positions, zero-based line and character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub imports: Vec<ImportDeclaration>,
    pub elements: Vec<Element>,
}

impl Module {
    /// Walk every element in the module in document order, parents before
    /// children. The walk is lazy, so callers that stop at the first match
    /// never visit the rest of the forest.
    pub fn elements_preorder(&self) -> ElementsPreorder<'_> {
        ElementsPreorder::new(&self.elements)
    }

    /// Total element count, nested elements included.
    pub fn element_count(&self) -> usize {
        self.elements_preorder().count()
    }
}

/// One `import ... from '...'` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    /// Module specifier as written, quotes stripped.
    pub source: String,
    pub specifiers: Vec<ImportSpecifier>,
    pub range: Option<Range>,
}

/// A single binding introduced by an import declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// `import { Button } from ...` or `import { Button as Btn } from ...`.
    /// `imported` is the export's canonical name, `local` the name in scope.
    Named { imported: String, local: String },
    /// `import Theme from ...`
    Default { local: String },
    /// `import * as Chakra from ...`
    Namespace { local: String },
}

/// A markup (JSX) element. `tag` is the name as written at the usage site,
/// which for an aliased import differs from the canonical export name.
///
/// `range` covers the whole element from the opening `<` to the final `>`.
/// It is `None` only for elements synthesized outside the parser, and such
/// elements never match a cursor position.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub range: Option<Range>,
    pub children: Vec<Element>,
}

/// Lazy depth-first element walk in document order.
pub struct ElementsPreorder<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> ElementsPreorder<'a> {
    fn new(roots: &'a [Element]) -> Self {
        Self {
            stack: roots.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for ElementsPreorder<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}
