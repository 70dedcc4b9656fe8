/// Value older catalogs wrote instead of NULL when a hash could not be computed.
pub const PLACEHOLDER_HASH: &str = "None";

/// One row of the `images` table. `path` is relative to the catalog root and
/// always uses `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub path: String,
    pub content_hash: Option<String>,
    pub perceptual_hash: Option<String>,
}

impl CatalogEntry {
    pub fn has_content_hash(&self) -> bool {
        is_real_hash(self.content_hash.as_deref())
    }

    pub fn has_perceptual_hash(&self) -> bool {
        is_real_hash(self.perceptual_hash.as_deref())
    }
}

/// Aggregate counts over the whole catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub total_entries: i64,
    pub entries_with_content_hash: i64,
    pub entries_with_perceptual_hash: i64,
    pub entries_with_both: i64,
}

pub(crate) fn is_real_hash(hash: Option<&str>) -> bool {
    matches!(hash, Some(h) if !h.is_empty() && h != PLACEHOLDER_HASH)
}
