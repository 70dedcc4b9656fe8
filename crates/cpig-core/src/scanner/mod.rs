pub mod walk;

pub use walk::{resolve_catalog_path, scan_catalog_files, to_catalog_path};
