use crate::error::{Error, Result};
use crate::scanner::{self, resolve_catalog_path};
use crate::storage::CatalogStore;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of comparing the catalog against its directory.
///
/// `consistent` only reflects unregistered files; lost files are reported
/// alongside but do not flip it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub unregistered_files: Vec<String>,
    pub lost_files: Vec<String>,
    pub consistent: bool,
}

impl ConsistencyReport {
    pub fn has_lost_files(&self) -> bool {
        !self.lost_files.is_empty()
    }
}

/// Files on disk under `root` with no catalog entry. Never writes to the store.
pub fn find_unregistered_files(store: &CatalogStore, root: &Path) -> Result<Vec<String>> {
    let on_disk = scanner::scan_catalog_files(root, store.path())?;
    let known = store.all_paths()?;
    let unregistered: Vec<String> = on_disk.difference(&known).cloned().collect();
    debug!(
        "{} files on disk, {} catalogued, {} unregistered",
        on_disk.len(),
        known.len(),
        unregistered.len()
    );
    Ok(unregistered)
}

/// Catalog entries whose file no longer exists under `root`.
pub fn find_lost_files(store: &CatalogStore, root: &Path) -> Result<Vec<String>> {
    let lost = store
        .all_paths()?
        .into_iter()
        .filter(|path| {
            resolve_catalog_path(root, path)
                .map(|file| !file.is_file())
                .unwrap_or(true)
        })
        .collect();
    Ok(lost)
}

pub fn check(store: &CatalogStore, root: &Path) -> Result<ConsistencyReport> {
    let unregistered_files = find_unregistered_files(store, root)?;
    let lost_files = find_lost_files(store, root)?;

    if !unregistered_files.is_empty() {
        warn!("{} unregistered files under {}", unregistered_files.len(), root.display());
    }
    if !lost_files.is_empty() {
        warn!("{} catalogued files are missing on disk", lost_files.len());
    }
    if unregistered_files.is_empty() && lost_files.is_empty() {
        info!("Catalog and {} agree", root.display());
    }

    Ok(ConsistencyReport {
        consistent: unregistered_files.is_empty(),
        unregistered_files,
        lost_files,
    })
}

/// [`check`] against the directory holding the store's own file.
pub fn run_consistency_check(store: &CatalogStore) -> Result<ConsistencyReport> {
    let root = store
        .catalog_root()
        .ok_or_else(|| Error::Other("in-memory catalog has no root directory".to_string()))?;
    check(store, &root)
}
