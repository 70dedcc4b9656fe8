use config::{Config, ConfigError, Environment, File as ConfigFile, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "./.cpig_config.json";
pub const DEFAULT_DB_PATH: &str = "./cpig_database.db";
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".bmp", ".gif"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub image_extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Directory that owns the catalog file. Every stored path is relative to it.
    pub fn catalog_root(&self) -> PathBuf {
        match Path::new(&self.db_path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Case-insensitive match of the file extension against `image_extensions`.
    /// Entries may be written with or without the leading dot.
    pub fn is_image(&self, path: &Path) -> bool {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return false,
        };
        self.image_extensions
            .iter()
            .any(|known| known.trim_start_matches('.').to_lowercase() == ext)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.db_path.trim().is_empty() {
            return Err(ConfigError::Message("db_path must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// Load configuration from a JSON file, layered over the built-in defaults.
/// A missing file is not an error. `CPIG_DB_PATH` and `CPIG_IMAGE_EXTENSIONS`
/// (comma separated) override the file.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let defaults = AppConfig::default();
    let builder = Config::builder()
        .set_default("db_path", defaults.db_path)?
        .set_default("image_extensions", defaults.image_extensions)?
        .add_source(ConfigFile::new(&path, FileFormat::Json).required(false))
        .add_source(
            Environment::with_prefix("CPIG")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("image_extensions"),
        )
        .build()?;

    builder.try_deserialize::<AppConfig>()?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = load_configuration(Some(&tmp.path().join("absent.json"))).unwrap();
        assert_eq!(config.image_extensions.len(), 5);
        assert!(config.db_path.ends_with("cpig_database.db"));
    }

    #[test]
    fn test_load_from_json_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cfg.json");
        fs::write(
            &path,
            r#"{ "db_path": "/photos/catalog.db", "image_extensions": [".jpg", ".heic"] }"#,
        )
        .unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.db_path, "/photos/catalog.db");
        assert_eq!(config.image_extensions, vec![".jpg", ".heic"]);
        assert_eq!(config.catalog_root(), PathBuf::from("/photos"));
    }

    #[test]
    fn test_empty_db_path_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cfg.json");
        fs::write(&path, r#"{ "db_path": "  ", "image_extensions": [] }"#).unwrap();
        assert!(load_configuration(Some(&path)).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("saved.json");
        let config = AppConfig {
            db_path: "lib/cat.db".to_string(),
            image_extensions: vec!["png".to_string()],
        };
        config.save(&path).unwrap();
        assert_eq!(load_configuration(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_is_image_matches_extension_case_insensitively() {
        let config = AppConfig::default();
        assert!(config.is_image(Path::new("a/b/IMG_001.JPG")));
        assert!(config.is_image(Path::new("x.png")));
        assert!(!config.is_image(Path::new("notes.txt")));
        assert!(!config.is_image(Path::new("no_extension")));
    }

    #[test]
    fn test_catalog_root_of_bare_file_name() {
        let config = AppConfig {
            db_path: "catalog.db".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.catalog_root(), PathBuf::from("."));
    }
}
