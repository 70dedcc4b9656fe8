use super::models::{CatalogEntry, CatalogStats};
use super::sqlite::CatalogStore;
use crate::error::{Error, Result};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeSet;
use tracing::debug;

const ENTRY_COLUMNS: &str = "id, path, content_hash, perceptual_hash";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        perceptual_hash: row.get(3)?,
    })
}

impl CatalogStore {
    // ── Writes ───────────────────────────────────────────────────

    /// Insert a new entry. An existing row with the same path is left untouched
    /// and `Ok(false)` is returned.
    pub fn insert(
        &self,
        path: &str,
        content_hash: Option<&str>,
        perceptual_hash: Option<&str>,
    ) -> Result<bool> {
        let inserted = self.connection().execute(
            "INSERT OR IGNORE INTO images (content_hash, perceptual_hash, path) \
             VALUES (?1, ?2, ?3)",
            params![content_hash, perceptual_hash, path],
        )?;
        if inserted == 0 {
            debug!("'{}' already catalogued, insert ignored", path);
        }
        Ok(inserted > 0)
    }

    /// Set the supplied hashes on an existing row. Fields passed as `None` are
    /// left as they are; passing neither is a no-op.
    pub fn update_hashes(
        &self,
        path: &str,
        content_hash: Option<&str>,
        perceptual_hash: Option<&str>,
    ) -> Result<()> {
        let updated = match (content_hash, perceptual_hash) {
            (None, None) => return Ok(()),
            (Some(content), Some(perceptual)) => self.connection().execute(
                "UPDATE images SET content_hash = ?1, perceptual_hash = ?2 WHERE path = ?3",
                params![content, perceptual, path],
            )?,
            (Some(content), None) => self.connection().execute(
                "UPDATE images SET content_hash = ?1 WHERE path = ?2",
                params![content, path],
            )?,
            (None, Some(perceptual)) => self.connection().execute(
                "UPDATE images SET perceptual_hash = ?1 WHERE path = ?2",
                params![perceptual, path],
            )?,
        };
        if updated == 0 {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Remove the row matching both the content hash and the path.
    pub fn delete_entry(&self, content_hash: &str, path: &str) -> Result<bool> {
        let deleted = self.connection().execute(
            "DELETE FROM images WHERE content_hash = ?1 AND path = ?2",
            params![content_hash, path],
        )?;
        Ok(deleted > 0)
    }

    pub fn remove_entry(&self, path: &str) -> Result<bool> {
        let deleted = self
            .connection()
            .execute("DELETE FROM images WHERE path = ?1", params![path])?;
        Ok(deleted > 0)
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn exists_by_content_hash(&self, content_hash: &str) -> Result<bool> {
        let found: Option<i64> = self
            .connection()
            .query_row(
                "SELECT 1 FROM images WHERE content_hash = ?1 LIMIT 1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM images WHERE content_hash = ?1 ORDER BY id"
        ))?;
        let entries = stmt
            .query_map(params![content_hash], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get_entry(&self, path: &str) -> Result<Option<CatalogEntry>> {
        let entry = self
            .connection()
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM images WHERE path = ?1"),
                params![path],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// All entries in insertion order.
    pub fn all_entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM images ORDER BY id"))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn all_paths(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT path FROM images WHERE path IS NOT NULL")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(paths)
    }

    /// Entries whose content hash is NULL or the legacy placeholder.
    pub fn entries_missing_content_hash(&self) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM images \
             WHERE content_hash IS NULL OR content_hash IN ('', 'None') \
             ORDER BY id"
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Content hashes held by more than one entry, each with its paths in
    /// insertion order. Groups are ordered by their first member.
    pub fn group_duplicates_by_content_hash(&self) -> Result<Vec<(String, Vec<String>)>> {
        let tx = self.connection().unchecked_transaction()?;
        let mut groups = Vec::new();
        {
            let mut group_stmt = tx.prepare(
                "SELECT content_hash FROM images \
                 WHERE content_hash IS NOT NULL AND content_hash NOT IN ('', 'None') \
                 GROUP BY content_hash HAVING COUNT(*) > 1 \
                 ORDER BY MIN(id)",
            )?;
            let hashes = group_stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut member_stmt =
                tx.prepare_cached("SELECT path FROM images WHERE content_hash = ?1 ORDER BY id")?;
            for hash in hashes {
                let paths = member_stmt
                    .query_map(params![hash], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                groups.push((hash, paths));
            }
        }
        tx.commit()?;
        debug!("Found {} content hashes with duplicates", groups.len());
        Ok(groups)
    }

    pub fn statistics(&self) -> Result<CatalogStats> {
        let stats = self.connection().query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(has_content), 0), \
                    COALESCE(SUM(has_perceptual), 0), \
                    COALESCE(SUM(has_content AND has_perceptual), 0) \
             FROM (SELECT \
                     (content_hash IS NOT NULL AND content_hash NOT IN ('', 'None')) AS has_content, \
                     (perceptual_hash IS NOT NULL AND perceptual_hash NOT IN ('', 'None')) AS has_perceptual \
                   FROM images)",
            [],
            |row| {
                Ok(CatalogStats {
                    total_entries: row.get(0)?,
                    entries_with_content_hash: row.get(1)?,
                    entries_with_perceptual_hash: row.get(2)?,
                    entries_with_both: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}
