use crate::syntax::{ImportSpecifier, Module};
use std::collections::HashMap;

/// Local-name to canonical-export map for one import declaration.
///
/// Keys are the names usable as tags in this module (`Btn` for
/// `import { Button as Btn }`), values are the library's export names
/// (`Button`). Default and namespace specifiers do not contribute entries,
/// so the map can be empty even though the library is imported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportMap {
    entries: HashMap<String, String>,
}

impl ImportMap {
    /// Canonical export name behind a local name, if the local name was
    /// imported from the target library.
    pub fn canonical(&self, local: &str) -> Option<&str> {
        self.entries.get(local).map(String::as_str)
    }

    pub fn contains(&self, local: &str) -> bool {
        self.entries.contains_key(local)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(local, imported)| (local.as_str(), imported.as_str()))
    }
}

/// Resolve the module's bindings for `target`.
///
/// Returns `None` when no import declaration names `target`, which is a
/// different answer from `Some` of an empty map: the former means the
/// library is absent, the latter that it is imported without any named
/// specifiers. Only the first matching declaration is consulted.
pub fn resolve_imports(module: &Module, target: &str) -> Option<ImportMap> {
    let declaration = module.imports.iter().find(|import| import.source == target)?;

    let mut entries = HashMap::new();
    for specifier in &declaration.specifiers {
        match specifier {
            ImportSpecifier::Named { imported, local } => {
                entries.insert(local.clone(), imported.clone());
            }
            // Default and namespace bindings are not element tags the
            // analysis can resolve to a canonical export.
            ImportSpecifier::Default { .. } | ImportSpecifier::Namespace { .. } => {}
        }
    }

    Some(ImportMap { entries })
}
