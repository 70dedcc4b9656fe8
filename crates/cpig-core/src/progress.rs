/// Trait for reporting progress of long catalog operations.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _candidates: usize, _duration_secs: f64) {}
    fn on_ingest_start(&self, _total_files: usize) {}
    fn on_ingest_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_ingest_complete(&self, _ingested: usize, _skipped: usize, _duration_secs: f64) {}
    fn on_delete_progress(&self, _groups_done: usize, _total_groups: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
