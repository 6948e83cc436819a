use crate::CHAKRA_PACKAGE;
use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use lsp_types::{FileEvent, Url, WorkspaceFolder, WorkspaceFoldersChangeEvent};
use pathdiff::diff_paths;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest file consulted for the dependency check, relative to each
/// workspace root.
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of a package manifest the tracker reads. Only runtime
/// dependencies count; a devDependencies entry does not make the library
/// available to application code.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: HashMap<String, String>,
}

/// Tracks which workspace roots declare the target library as a dependency.
///
/// One flag is kept per root, keyed by the root's directory uri in a single
/// normalized form. Roots come from the initial workspace folder set and
/// from later folder changes; manifest file events update the flag for the
/// manifest's own directory, so a nested `package.json` introduces its own
/// root with its own flag, and a change to a known root's manifest lands on
/// the record seeded at initialization. All manifest reads within one batch
/// run concurrently and settle independently: one unreadable manifest never
/// blocks the others.
pub struct DependencyTracker {
    package: String,
    roots: HashMap<Url, bool>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self {
            package: CHAKRA_PACKAGE.to_string(),
            roots: HashMap::new(),
        }
    }

    /// Seed dependency flags for the initial workspace folder set.
    pub async fn initialize(&mut self, folders: &[WorkspaceFolder]) {
        if folders.is_empty() {
            return;
        }
        info!(
            "Checking {} workspace folder(s) for {}",
            folders.len(),
            self.package
        );
        let reads: Vec<_> = folders
            .iter()
            .map(|folder| read_manifest_in(&folder.uri))
            .collect();
        let manifests = join_all(reads).await;
        for (folder, manifest) in folders.iter().zip(manifests) {
            match manifest {
                Ok(manifest) => {
                    if let Some(root) = directory_key(&folder.uri) {
                        let declared = self.declares_dependency(&manifest);
                        info!("{}: {} declared: {}", root, self.package, declared);
                        self.roots.insert(root, declared);
                    }
                }
                Err(e) => {
                    warn!("No dependency state for {}: {:#}", folder.uri, e);
                }
            }
        }
    }

    /// Apply a workspace folder change: removed roots are forgotten, added
    /// roots are checked like initial folders.
    pub async fn update_folders(&mut self, event: &WorkspaceFoldersChangeEvent) {
        for removed in &event.removed {
            if let Some(root) = directory_key(&removed.uri) {
                if self.roots.remove(&root).is_some() {
                    info!("Forgetting workspace folder {}", root);
                }
            }
        }
        self.initialize(&event.added).await;
    }

    /// Re-read manifests reported changed by the editor's file watcher.
    ///
    /// Each changed manifest updates the flag for its containing directory.
    /// A manifest that cannot be read or parsed leaves the previous flag in
    /// place, so a transient unreadable state never flips a root to "not a
    /// dependency".
    pub async fn apply_manifest_changes(&mut self, changes: &[FileEvent]) {
        if changes.is_empty() {
            return;
        }
        let reads: Vec<_> = changes
            .iter()
            .map(|change| read_manifest(&change.uri))
            .collect();
        let manifests = join_all(reads).await;
        for (change, manifest) in changes.iter().zip(manifests) {
            match manifest {
                Ok(manifest) => {
                    if let Some(root) = parent_directory(&change.uri) {
                        let declared = self.declares_dependency(&manifest);
                        info!("{}: {} declared: {}", root, self.package, declared);
                        self.roots.insert(root, declared);
                    }
                }
                Err(e) => {
                    warn!(
                        "Keeping previous dependency state, manifest {} unreadable: {:#}",
                        change.uri, e
                    );
                }
            }
        }
    }

    /// Whether the document at `uri` belongs to a root that declares the
    /// target library.
    ///
    /// True when any tracked root with a positive flag is a proper ancestor
    /// of the document's path. Documents outside every tracked root, and
    /// non-file uris, are not covered.
    pub fn applies_to(&self, uri: &Url) -> bool {
        let Ok(document_path) = uri.to_file_path() else {
            debug!("Dependency check for non-file uri {}", uri);
            return false;
        };
        self.roots.iter().any(|(root, &declared)| {
            declared
                && root
                    .to_file_path()
                    .map(|root_path| is_sub_path(&root_path, &document_path))
                    .unwrap_or(false)
        })
    }

    /// The flag recorded for an exact root, if one is tracked. Mostly
    /// useful to tests and diagnostics.
    pub fn root_state(&self, root: &Url) -> Option<bool> {
        self.roots.get(root).copied()
    }

    pub fn tracked_roots(&self) -> usize {
        self.roots.len()
    }

    fn declares_dependency(&self, manifest: &Manifest) -> bool {
        manifest.dependencies.contains_key(&self.package)
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_manifest_in(root: &Url) -> Result<Manifest> {
    let root_path = root
        .to_file_path()
        .map_err(|_| anyhow!("workspace folder {} is not a file uri", root))?;
    read_manifest_file(root_path.join(MANIFEST_FILE)).await
}

async fn read_manifest(uri: &Url) -> Result<Manifest> {
    let path = uri
        .to_file_path()
        .map_err(|_| anyhow!("manifest {} is not a file uri", uri))?;
    read_manifest_file(path).await
}

async fn read_manifest_file(path: PathBuf) -> Result<Manifest> {
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Canonical key for a tracked root. Clients send workspace folder uris
/// without a trailing slash while manifest events resolve to directory uris
/// with one; round-tripping through the file path gives every root the same
/// form.
fn directory_key(uri: &Url) -> Option<Url> {
    let path = uri.to_file_path().ok()?;
    Url::from_directory_path(path).ok()
}

/// Directory containing a manifest file, as a uri in root-key form.
fn parent_directory(uri: &Url) -> Option<Url> {
    let path = uri.to_file_path().ok()?;
    let parent = path.parent()?;
    Url::from_directory_path(parent).ok()
}

/// Whether `child` lies strictly under `parent`. The relative path between
/// the two must be non-empty and must not climb out of `parent`, so a root
/// is not an ancestor of itself.
fn is_sub_path(parent: &Path, child: &Path) -> bool {
    match diff_paths(child, parent) {
        Some(relative) => !relative.as_os_str().is_empty() && !relative.starts_with(".."),
        None => false,
    }
}
