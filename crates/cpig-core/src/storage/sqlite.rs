use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Anything smaller cannot hold an SQLite header and is treated as not yet
/// initialised.
pub const MIN_CATALOG_FILE_SIZE: u64 = 100;

/// Handle to one catalog file. Dropping it (or calling [`CatalogStore::close`])
/// releases the connection.
pub struct CatalogStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl CatalogStore {
    /// Open an existing catalog, or create it when the file is absent.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open_existing(path)
        } else {
            Self::create(path)
        }
    }

    pub fn open_existing(path: &Path) -> Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingFile(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(corrupt(path, "not a regular file"));
        }
        if metadata.len() < MIN_CATALOG_FILE_SIZE {
            return Err(corrupt(
                path,
                format!("file is only {} bytes", metadata.len()),
            ));
        }

        let conn = Connection::open(path).map_err(|e| corrupt(path, e.to_string()))?;
        let store = CatalogStore {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.verify_schema()?;
        store.configure_pragmas()?;
        debug!("Opened catalog {}", path.display());
        Ok(store)
    }

    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| corrupt(path, e.to_string()))?;
        let store = CatalogStore {
            conn,
            path: Some(path.to_path_buf()),
        };
        store
            .init_schema()
            .map_err(|e| corrupt(path, e.to_string()))?;
        store.configure_pragmas()?;
        debug!("Catalog created at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = CatalogStore { conn, path: None };
        store.init_schema()?;
        store.configure_pragmas()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(include_str!("schema.sql"))
    }

    fn verify_schema(&self) -> Result<()> {
        let path = self.path.as_deref().unwrap_or(Path::new(":memory:"));
        let table: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'images'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| corrupt(path, e.to_string()))?;
        if table.is_none() {
            return Err(corrupt(path, "missing 'images' table"));
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path of the backing file; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory the stored relative paths resolve against.
    pub fn catalog_root(&self) -> Option<PathBuf> {
        let parent = self.path.as_deref()?.parent()?;
        if parent.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(parent.to_path_buf())
        }
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::CorruptFile {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
