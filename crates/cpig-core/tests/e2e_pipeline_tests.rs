use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::tempdir;

use cpig_core::storage::CatalogStore;
use cpig_core::{
    ingest_file, AppConfig, CatalogService, Error, IngestOutcome, ProgressReporter, SilentReporter,
};

/// Layout:
///   root/
///     cpig_database.db
///     a.jpg                 ("photo a")
///     b.png                 ("photo b")
///     notes.txt             ("not an image")
///     trip/a.jpg            ("photo a")   ← duplicate of a.jpg
///     trip/backup/b.png     ("photo b")   ← duplicate of b.png
fn create_test_tree(root: &Path) {
    fs::create_dir_all(root.join("trip/backup")).unwrap();
    fs::write(root.join("a.jpg"), "photo a").unwrap();
    fs::write(root.join("b.png"), "photo b").unwrap();
    fs::write(root.join("notes.txt"), "not an image").unwrap();
    fs::write(root.join("trip/a.jpg"), "photo a").unwrap();
    fs::write(root.join("trip/backup/b.png"), "photo b").unwrap();
}

fn config_for(root: &Path) -> AppConfig {
    AppConfig {
        db_path: root.join("cpig_database.db").to_string_lossy().into_owned(),
        ..AppConfig::default()
    }
}

#[derive(Default)]
struct CountingReporter {
    progress_calls: AtomicUsize,
    started_with: AtomicUsize,
    completed: Mutex<Option<(usize, usize, f64)>>,
}

impl ProgressReporter for CountingReporter {
    fn on_ingest_start(&self, total_files: usize) {
        self.started_with.store(total_files, Ordering::SeqCst);
    }

    fn on_ingest_progress(&self, _files_done: usize, _total_files: usize) {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_ingest_complete(&self, ingested: usize, skipped: usize, elapsed_secs: f64) {
        *self.completed.lock().unwrap() = Some((ingested, skipped, elapsed_secs));
    }
}

#[test]
fn test_open_before_create_reports_missing_file() {
    let tmp = tempdir().unwrap();
    let err = CatalogService::open(config_for(tmp.path())).err().unwrap();
    assert!(matches!(err, Error::MissingFile(_)));
}

#[test]
fn test_ingest_directory_then_check() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let service = CatalogService::create(config_for(tmp.path())).unwrap();

    let reporter = CountingReporter::default();
    let summary = service.ingest_directory(false, &reporter).unwrap();
    assert_eq!(summary.ingested, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(reporter.started_with.load(Ordering::SeqCst), 4);
    assert_eq!(reporter.progress_calls.load(Ordering::SeqCst), 4);

    // notes.txt has no image extension and stays unregistered
    let report = service.check_and_report().unwrap();
    assert_eq!(report.unregistered_files, vec!["notes.txt"]);
    assert!(!report.consistent);

    let stats = service.statistics().unwrap();
    assert_eq!(stats.total_entries, 4);
    assert_eq!(stats.entries_with_content_hash, 4);
    // the fixture files are not decodable images
    assert_eq!(stats.entries_with_perceptual_hash, 0);
}

#[test]
fn test_ingest_same_file_twice_is_idempotent() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let service = CatalogService::create(config_for(tmp.path())).unwrap();
    let file = service.root().join("a.jpg");

    assert!(service.ingest(&file));
    assert!(service.ingest(&file));
    assert_eq!(service.ingest_checked(&file, false), IngestOutcome::AlreadyCatalogued);
    assert_eq!(service.statistics().unwrap().total_entries, 1);
}

#[test]
fn test_ingest_unreadable_file_is_skipped() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let service = CatalogService::create(config_for(tmp.path())).unwrap();

    let paths: Vec<PathBuf> = vec![
        service.root().join("a.jpg"),
        service.root().join("vanished.jpg"),
        service.root().join("b.png"),
    ];
    let summary = service.ingest_many(&paths, false, &SilentReporter);
    assert_eq!(summary.ingested, 2);
    assert_eq!(summary.failed, 1);
}

#[test]
fn test_ingest_outside_root_is_rejected() {
    let tmp = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    create_test_tree(tmp.path());
    fs::write(elsewhere.path().join("x.jpg"), "x").unwrap();
    let service = CatalogService::create(config_for(tmp.path())).unwrap();

    assert_eq!(
        service.ingest_checked(&elsewhere.path().join("x.jpg"), false),
        IngestOutcome::OutsideRoot
    );
}

#[test]
fn test_duplicate_check_rejects_known_content() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let service = CatalogService::create(config_for(tmp.path())).unwrap();

    assert!(service.ingest(&service.root().join("a.jpg")));
    assert_eq!(
        service.ingest_checked(&service.root().join("trip/a.jpg"), true),
        IngestOutcome::DuplicateContent
    );
    assert_eq!(service.statistics().unwrap().total_entries, 1);
}

#[test]
fn test_ingest_file_stores_relative_path() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let db_path = tmp.path().join("cpig_database.db");
    let store = CatalogStore::create(&db_path).unwrap();

    assert!(ingest_file(&store, &tmp.path().join("trip/backup/b.png"), tmp.path()));
    let entry = store.get_entry("trip/backup/b.png").unwrap().unwrap();
    assert_eq!(entry.content_hash.as_deref().map(str::len), Some(32));
    assert!(!ingest_file(&store, &tmp.path().join("missing.jpg"), tmp.path()));
}

#[test]
fn test_resolve_duplicates_report_then_execute() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let service = CatalogService::create(config_for(tmp.path())).unwrap();
    service.ingest_directory(false, &SilentReporter).unwrap();

    let dry = service.resolve_duplicates(false, &SilentReporter).unwrap();
    assert_eq!(dry.groups.len(), 2);
    assert_eq!(dry.deleted, 0);
    let planned: Vec<_> = dry.planned.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(planned, vec!["trip/a.jpg", "trip/backup/b.png"]);
    assert!(service.root().join("trip/a.jpg").exists());

    let run = service.resolve_duplicates(true, &SilentReporter).unwrap();
    assert_eq!(run.deleted, 2);
    assert!(!service.root().join("trip/a.jpg").exists());
    assert!(!service.root().join("trip/backup/b.png").exists());
    assert!(service.root().join("a.jpg").exists());
    assert!(service.list_duplicates().unwrap().is_empty());

    let report = service.check_and_report().unwrap();
    assert!(report.lost_files.is_empty());
}

#[test]
fn test_rehash_fills_missing_hashes() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());
    let config = config_for(tmp.path());
    {
        let store = CatalogStore::create(Path::new(&config.db_path)).unwrap();
        store.insert("a.jpg", None, None).unwrap();
        store.insert("b.png", Some("None"), None).unwrap();
        store.insert("missing.jpg", None, None).unwrap();
        store.close().unwrap();
    }

    let service = CatalogService::open(config).unwrap();
    let reporter = CountingReporter::default();
    let updated = service.rehash_missing(&reporter).unwrap();
    assert_eq!(updated, 2);
    assert_eq!(reporter.started_with.load(Ordering::SeqCst), 3);
    let completed = *reporter.completed.lock().unwrap();
    let (ingested, skipped, elapsed) = completed.unwrap();
    assert_eq!((ingested, skipped), (2, 1));
    assert!(elapsed > 0.0);
    assert_eq!(service.statistics().unwrap().entries_with_content_hash, 2);
    service.close().unwrap();
}

#[test]
fn test_relocated_catalog_stays_valid() {
    let tmp = tempdir().unwrap();
    let original = tmp.path().join("original");
    create_test_tree(&original);
    {
        let service = CatalogService::create(config_for(&original)).unwrap();
        service.ingest_directory(false, &SilentReporter).unwrap();
        service.close().unwrap();
    }

    let moved = tmp.path().join("moved");
    fs::rename(&original, &moved).unwrap();

    let service = CatalogService::open(config_for(&moved)).unwrap();
    let report = service.check_and_report().unwrap();
    assert_eq!(report.unregistered_files, vec!["notes.txt"]);
    assert!(report.lost_files.is_empty());
}

#[test]
fn test_equal_length_ties_plan_the_same_on_every_run() {
    const PAIRS: usize = 60;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
    let expected: Vec<String> = (0..PAIRS).map(|i| format!("aa/{:03}.jpg", i)).collect();

    for _ in 0..5 {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("aa")).unwrap();
        fs::create_dir_all(tmp.path().join("bb")).unwrap();
        for i in 0..PAIRS {
            let content = format!("photo number {}", i);
            fs::write(tmp.path().join(format!("aa/{:03}.jpg", i)), &content).unwrap();
            fs::write(tmp.path().join(format!("bb/{:03}.jpg", i)), &content).unwrap();
        }

        let service = CatalogService::create(config_for(tmp.path())).unwrap();
        let plan = pool.install(|| {
            let summary = service.ingest_directory(false, &SilentReporter).unwrap();
            assert_eq!(summary.ingested, PAIRS * 2);
            service.resolve_duplicates(false, &SilentReporter).unwrap()
        });

        let planned: Vec<String> = plan.planned.into_iter().map(|p| p.path).collect();
        assert_eq!(planned, expected);
        service.close().unwrap();
    }
}
