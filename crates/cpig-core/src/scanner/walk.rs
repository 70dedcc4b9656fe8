use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

const STORE_SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Recursively list every regular file under `root` as a catalog path
/// (relative, `/`-separated). The catalog file and its SQLite sidecars are
/// left out. Unreadable entries are logged and skipped.
pub fn scan_catalog_files(root: &Path, store_file: Option<&Path>) -> io::Result<BTreeSet<String>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Catalog root {} is not a directory", root.display()),
        ));
    }

    let excluded = store_file
        .map(|file| excluded_catalog_paths(root, file))
        .unwrap_or_default();

    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::PermissionDenied) {
                    error!("Access denied while scanning {}: {}", root.display(), err);
                } else {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                }
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match to_catalog_path(root, entry.path()) {
            Some(rel) if !excluded.contains(&rel) => {
                files.insert(rel);
            }
            Some(_) => {}
            None => warn!("{} is outside {}", entry.path().display(), root.display()),
        }
    }
    Ok(files)
}

fn excluded_catalog_paths(root: &Path, store_file: &Path) -> Vec<String> {
    let rel = to_catalog_path(root, store_file).or_else(|| {
        let root = fs::canonicalize(root).ok()?;
        let file = fs::canonicalize(store_file).ok()?;
        to_catalog_path(&root, &file)
    });
    match rel {
        Some(rel) => {
            let mut excluded = vec![rel.clone()];
            excluded.extend(STORE_SIDECAR_SUFFIXES.iter().map(|s| format!("{rel}{s}")));
            excluded
        }
        None => Vec::new(),
    }
}

/// Convert `path` into the form stored in the catalog: relative to `root`,
/// joined with `/`. Returns `None` when `path` does not lie under `root`.
pub fn to_catalog_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Inverse of [`to_catalog_path`]. Returns `None` unless every segment is a
/// plain name, so a stored `..` can never point outside `root`.
pub fn resolve_catalog_path(root: &Path, catalog_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut segments = 0;
    for part in catalog_path.split('/').filter(|part| !part.is_empty()) {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => resolved.push(name),
            _ => return None,
        }
        segments += 1;
    }
    (segments > 0).then_some(resolved)
}
