use crate::analysis::consistency::{self, ConsistencyReport};
use crate::analysis::duplicates::{self, DeletionPolicy, DuplicateGroup, PlannedDeletion};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::hasher::{self, Fingerprint};
use crate::progress::ProgressReporter;
use crate::scanner::{self, resolve_catalog_path, to_catalog_path};
use crate::storage::{CatalogStats, CatalogStore};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to one file handed to ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested,
    /// The path already has a row; nothing was written.
    AlreadyCatalogued,
    /// Another path already holds the same content (only when checking).
    DuplicateContent,
    /// The file could not be read or hashed.
    Unreadable,
    /// The file does not live under the catalog root.
    OutsideRoot,
    /// The store rejected the write.
    StoreFailure,
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Ingested | IngestOutcome::AlreadyCatalogued)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub already_catalogued: usize,
    pub duplicate_content: usize,
    pub failed: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Ingested => self.ingested += 1,
            IngestOutcome::AlreadyCatalogued => self.already_catalogued += 1,
            IngestOutcome::DuplicateContent => self.duplicate_content += 1,
            IngestOutcome::Unreadable | IngestOutcome::OutsideRoot | IngestOutcome::StoreFailure => {
                self.failed += 1
            }
        }
    }

    pub fn total(&self) -> usize {
        self.ingested + self.already_catalogued + self.duplicate_content + self.failed
    }
}

/// Result of a duplicate resolution pass. `deleted` stays 0 for report-only runs.
#[derive(Debug, Clone, Default)]
pub struct DuplicateResolution {
    pub groups: Vec<DuplicateGroup>,
    pub planned: Vec<PlannedDeletion>,
    pub deleted: usize,
}

/// Hash `absolute_path` and record it under its path relative to `catalog_root`.
/// Returns `false` when the file could not be hashed or stored.
pub fn ingest_file(store: &CatalogStore, absolute_path: &Path, catalog_root: &Path) -> bool {
    let Some(rel) = relative_to_root(catalog_root, absolute_path) else {
        warn!(
            "{} is not under catalog root {}",
            absolute_path.display(),
            catalog_root.display()
        );
        return false;
    };
    match hash_file(absolute_path) {
        Some(fp) => record(store, &rel, &fp, false).is_success(),
        None => false,
    }
}

pub fn compute_statistics(store: &CatalogStore) -> Result<CatalogStats> {
    store.statistics()
}

fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    to_catalog_path(root, path).or_else(|| {
        let root = fs::canonicalize(root).ok()?;
        let path = fs::canonicalize(path).ok()?;
        to_catalog_path(&root, &path)
    })
}

fn hash_file(path: &Path) -> Option<Fingerprint> {
    match hasher::fingerprint(path) {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}

fn record(store: &CatalogStore, rel: &str, fp: &Fingerprint, check_duplicates: bool) -> IngestOutcome {
    if check_duplicates {
        match store.exists_by_content_hash(&fp.content) {
            Ok(true) => {
                info!("'{}' duplicates content already in the catalog", rel);
                return IngestOutcome::DuplicateContent;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Duplicate lookup failed for '{}': {}", rel, e);
                return IngestOutcome::StoreFailure;
            }
        }
    }
    match store.insert(rel, Some(&fp.content), fp.perceptual.as_deref()) {
        Ok(true) => {
            debug!("Catalogued '{}' ({})", rel, fp.content);
            IngestOutcome::Ingested
        }
        Ok(false) => IngestOutcome::AlreadyCatalogued,
        Err(e) => {
            error!("Failed to catalogue '{}': {}", rel, e);
            IngestOutcome::StoreFailure
        }
    }
}

/// Composition root handed to the CLI. Owns the configuration and one store
/// handle; store writes go through a single lock while hashing runs in parallel.
pub struct CatalogService {
    config: AppConfig,
    root: PathBuf,
    store: Mutex<CatalogStore>,
}

impl CatalogService {
    /// Open the configured catalog. The file must already exist.
    pub fn open(config: AppConfig) -> Result<Self> {
        let store = CatalogStore::open_existing(Path::new(&config.db_path))?;
        Ok(Self::with_store(config, store))
    }

    /// Create the configured catalog (or open it when it is already valid).
    pub fn create(config: AppConfig) -> Result<Self> {
        let store = CatalogStore::create(Path::new(&config.db_path))?;
        info!("Catalog ready at {}", config.db_path);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: AppConfig, store: CatalogStore) -> Self {
        let root = store.catalog_root().unwrap_or_else(|| config.catalog_root());
        let root = fs::canonicalize(&root).unwrap_or(root);
        Self {
            config,
            root,
            store: Mutex::new(store),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store(&self) -> Result<MutexGuard<'_, CatalogStore>> {
        self.store
            .lock()
            .map_err(|_| Error::Other("catalog lock poisoned".to_string()))
    }

    /// Ingest one file. `true` when the file is catalogued afterwards.
    pub fn ingest(&self, file_path: &Path) -> bool {
        self.ingest_checked(file_path, false).is_success()
    }

    pub fn ingest_checked(&self, file_path: &Path, check_duplicates: bool) -> IngestOutcome {
        let (rel, fp) = match self.prepare(file_path) {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };
        match self.store() {
            Ok(store) => record(&store, &rel, &fp, check_duplicates),
            Err(e) => {
                error!("{}", e);
                IngestOutcome::StoreFailure
            }
        }
    }

    /// Catalog path and fingerprint for one file, or the outcome that skips it.
    fn prepare(&self, file_path: &Path) -> std::result::Result<(String, Fingerprint), IngestOutcome> {
        let Some(rel) = relative_to_root(&self.root, file_path) else {
            warn!("{} is not under catalog root {}", file_path.display(), self.root.display());
            return Err(IngestOutcome::OutsideRoot);
        };
        match hash_file(file_path) {
            Some(fp) => Ok((rel, fp)),
            None => Err(IngestOutcome::Unreadable),
        }
    }

    /// Ingest many files. Hashing runs in parallel; rows are written one by
    /// one in the order of `paths`, so ids follow that order. A failing file
    /// is counted and skipped; it never stops the batch.
    pub fn ingest_many(
        &self,
        paths: &[PathBuf],
        check_duplicates: bool,
        reporter: &dyn ProgressReporter,
    ) -> IngestSummary {
        let start = Instant::now();
        let total = paths.len();
        let done = AtomicUsize::new(0);
        reporter.on_ingest_start(total);

        let prepared: Vec<_> = paths
            .par_iter()
            .map(|path| {
                let prepared = self.prepare(path);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_ingest_progress(finished, total);
                prepared
            })
            .collect();

        let mut summary = IngestSummary::default();
        match self.store() {
            Ok(store) => {
                for item in prepared {
                    let outcome = match item {
                        Ok((rel, fp)) => record(&store, &rel, &fp, check_duplicates),
                        Err(outcome) => outcome,
                    };
                    summary.record(outcome);
                }
            }
            Err(e) => {
                error!("{}", e);
                summary.failed = total;
            }
        }
        reporter.on_ingest_complete(
            summary.ingested,
            summary.total() - summary.ingested,
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Ingested {} files ({} already catalogued, {} duplicate content, {} failed)",
            summary.ingested, summary.already_catalogued, summary.duplicate_content, summary.failed
        );
        summary
    }

    /// Find image files under the root that have no catalog entry yet and ingest them.
    pub fn ingest_directory(
        &self,
        check_duplicates: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<IngestSummary> {
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let candidates: Vec<PathBuf> = {
            let store = self.store()?;
            let on_disk = scanner::scan_catalog_files(&self.root, store.path())?;
            let known = store.all_paths()?;
            on_disk
                .difference(&known)
                .filter_map(|rel| resolve_catalog_path(&self.root, rel))
                .filter(|path| self.config.is_image(path))
                .collect()
        };
        reporter.on_scan_complete(candidates.len(), scan_start.elapsed().as_secs_f64());
        debug!("{} unregistered image files to ingest", candidates.len());

        Ok(self.ingest_many(&candidates, check_duplicates, reporter))
    }

    /// Compute fingerprints for entries stored without a content hash.
    /// Returns the number of rows updated.
    pub fn rehash_missing(&self, reporter: &dyn ProgressReporter) -> Result<usize> {
        let start = Instant::now();
        let pending = self.store()?.entries_missing_content_hash()?;
        let total = pending.len();
        let done = AtomicUsize::new(0);
        reporter.on_ingest_start(total);

        let hashed: Vec<(String, Fingerprint)> = pending
            .par_iter()
            .filter_map(|entry| {
                let fp = match resolve_catalog_path(&self.root, &entry.path) {
                    Some(file) => hash_file(&file),
                    None => {
                        warn!("Skipping '{}': not a path inside the catalog root", entry.path);
                        None
                    }
                };
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_ingest_progress(finished, total);
                fp.map(|fp| (entry.path.clone(), fp))
            })
            .collect();

        let store = self.store()?;
        let mut updated = 0;
        for (path, fp) in &hashed {
            match store.update_hashes(path, Some(&fp.content), fp.perceptual.as_deref()) {
                Ok(()) => updated += 1,
                Err(e) => warn!("Could not update hashes for '{}': {}", path, e),
            }
        }
        reporter.on_ingest_complete(updated, total - updated, start.elapsed().as_secs_f64());
        info!("Rehashed {} of {} entries missing a content hash", updated, total);
        Ok(updated)
    }

    pub fn check_and_report(&self) -> Result<ConsistencyReport> {
        let store = self.store()?;
        consistency::check(&store, &self.root)
    }

    pub fn statistics(&self) -> Result<CatalogStats> {
        let store = self.store()?;
        compute_statistics(&store)
    }

    pub fn list_duplicates(&self) -> Result<Vec<DuplicateGroup>> {
        let store = self.store()?;
        duplicates::find_duplicates(&store)
    }

    /// Group duplicates and plan one deletion per group. Rows and files are
    /// only removed when `execute` is set.
    pub fn resolve_duplicates(
        &self,
        execute: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<DuplicateResolution> {
        let store = self.store()?;
        let groups = duplicates::find_duplicates(&store)?;
        let planned = duplicates::plan_deletions(&groups, DeletionPolicy::default());
        let deleted = if execute {
            duplicates::delete_planned(&store, &self.root, &planned, reporter)
        } else {
            debug!("Report-only run, {} deletions planned", planned.len());
            0
        };
        Ok(DuplicateResolution {
            groups,
            planned,
            deleted,
        })
    }

    /// Release the store handle.
    pub fn close(self) -> Result<()> {
        let store = self
            .store
            .into_inner()
            .map_err(|_| Error::Other("catalog lock poisoned".to_string()))?;
        store.close()
    }
}
