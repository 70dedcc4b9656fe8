pub mod analysis;
pub mod config;
pub mod error;
pub mod hasher;
pub mod progress;
pub mod scanner;
pub mod service;
pub mod storage;

pub use analysis::consistency::{run_consistency_check, ConsistencyReport};
pub use analysis::duplicates::{delete_duplicates, list_duplicates, DeletionPolicy, DuplicateGroup};
pub use crate::config::AppConfig;
pub use error::{Error, Result};
pub use progress::{ProgressReporter, SilentReporter};
pub use service::{
    compute_statistics, ingest_file, CatalogService, DuplicateResolution, IngestOutcome,
    IngestSummary,
};
pub use storage::{create_database, open_or_report_error, CatalogStore};
