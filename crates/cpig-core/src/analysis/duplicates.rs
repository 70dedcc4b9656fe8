use crate::error::{Error, Result};
use crate::progress::ProgressReporter;
use crate::scanner::resolve_catalog_path;
use crate::storage::CatalogStore;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Catalog paths sharing one content hash, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub paths: Vec<String>,
}

impl DuplicateGroup {
    pub fn redundant_copies(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Which member of a duplicate group gets removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Remove the member with the longest path. Ties go to the member seen
    /// first in insertion order.
    #[default]
    LongestPath,
}

impl DeletionPolicy {
    pub fn select<'a>(&self, group: &'a DuplicateGroup) -> Option<&'a str> {
        match self {
            DeletionPolicy::LongestPath => {
                let mut paths = group.paths.iter();
                let mut candidate = paths.next()?;
                for path in paths {
                    if path.len() > candidate.len() {
                        candidate = path;
                    }
                }
                Some(candidate.as_str())
            }
        }
    }
}

/// A single row/file scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    pub content_hash: String,
    pub path: String,
}

/// Group the catalog by content hash. Recomputed on every call.
pub fn find_duplicates(store: &CatalogStore) -> Result<Vec<DuplicateGroup>> {
    let groups = store
        .group_duplicates_by_content_hash()?
        .into_iter()
        .map(|(content_hash, paths)| DuplicateGroup {
            content_hash,
            paths,
        })
        .filter(|group| group.paths.len() > 1)
        .collect();
    Ok(groups)
}

pub fn list_duplicates(store: &CatalogStore) -> Result<Vec<DuplicateGroup>> {
    find_duplicates(store)
}

/// One deletion per group, chosen by `policy`. Nothing is touched.
pub fn plan_deletions(groups: &[DuplicateGroup], policy: DeletionPolicy) -> Vec<PlannedDeletion> {
    groups
        .iter()
        .filter_map(|group| {
            policy.select(group).map(|path| PlannedDeletion {
                content_hash: group.content_hash.clone(),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Delete the selected member of every group from the catalog and from disk.
/// Returns the number of catalog rows removed. A failure on one group is
/// logged and the remaining groups are still processed.
pub fn delete_duplicates(
    store: &CatalogStore,
    groups: &[DuplicateGroup],
    policy: DeletionPolicy,
) -> Result<usize> {
    let root = store
        .catalog_root()
        .ok_or_else(|| Error::Other("in-memory catalog has no root directory".to_string()))?;
    Ok(delete_planned(
        store,
        &root,
        &plan_deletions(groups, policy),
        &crate::progress::SilentReporter,
    ))
}

pub(crate) fn delete_planned(
    store: &CatalogStore,
    root: &Path,
    plan: &[PlannedDeletion],
    reporter: &dyn ProgressReporter,
) -> usize {
    let mut deleted = 0;
    for (index, item) in plan.iter().enumerate() {
        reporter.on_delete_progress(index, plan.len());
        match store.delete_entry(&item.content_hash, &item.path) {
            Ok(true) => {
                deleted += 1;
                remove_catalog_file(root, &item.path);
            }
            Ok(false) => {
                warn!(
                    "No catalog row for '{}' with hash {}, skipping",
                    item.path, item.content_hash
                );
            }
            Err(e) => {
                warn!("Failed to delete catalog row for '{}': {}", item.path, e);
            }
        }
    }
    reporter.on_delete_progress(plan.len(), plan.len());
    info!("Deleted {} of {} duplicate entries", deleted, plan.len());
    deleted
}

fn remove_catalog_file(root: &Path, catalog_path: &str) {
    let Some(file) = resolve_catalog_path(root, catalog_path) else {
        warn!("Not removing '{}': path leaves the catalog root", catalog_path);
        return;
    };
    match fs::remove_file(&file) {
        Ok(()) => debug!("Removed {}", file.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} already absent", file.display());
        }
        Err(e) => warn!("Failed to remove {}: {}", file.display(), e),
    }
}
