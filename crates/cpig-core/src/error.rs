use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Catalog file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("Catalog file '{}' is not a valid catalog: {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("No catalog entry for '{0}'")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
