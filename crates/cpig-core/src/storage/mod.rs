pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{CatalogEntry, CatalogStats, PLACEHOLDER_HASH};
pub use sqlite::{CatalogStore, MIN_CATALOG_FILE_SIZE};

use crate::error::Result;
use std::path::Path;

/// Open an existing catalog. Fails with `Error::MissingFile` when there is
/// nothing at `path` and `Error::CorruptFile` when the file is not a catalog.
pub fn open_or_report_error(path: &Path) -> Result<CatalogStore> {
    CatalogStore::open_existing(path)
}

/// Create a catalog at `path`, or open it if it is already a valid one.
pub fn create_database(path: &Path) -> Result<CatalogStore> {
    CatalogStore::create(path)
}
