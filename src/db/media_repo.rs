use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::StoreResult;
use crate::models::{EntityType, Media, MediaLink};

/// Mediaobjekt och kopplingar till dem
pub struct MediaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MediaRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, media: &Media) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO media (gedcom_id, tree_id, file_path, stored_path, format, title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(gedcom_id, tree_id) DO UPDATE SET
                file_path = excluded.file_path,
                stored_path = COALESCE(excluded.stored_path, media.stored_path),
                format = excluded.format,
                title = excluded.title,
                imported_at = datetime('now')",
            params![
                media.gedcom_id,
                media.tree_id,
                media.file_path,
                media.stored_path,
                media.format,
                media.title,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, gedcom_id: &str, tree_id: &str) -> StoreResult<Option<Media>> {
        let conn = lock(&self.conn)?;
        let media = conn
            .query_row(
                "SELECT gedcom_id, tree_id, file_path, stored_path, format, title, imported_at
                 FROM media WHERE gedcom_id = ?1 AND tree_id = ?2",
                params![gedcom_id, tree_id],
                |row| {
                    Ok(Media {
                        gedcom_id: row.get(0)?,
                        tree_id: row.get(1)?,
                        file_path: row.get(2)?,
                        stored_path: row.get(3)?,
                        format: row.get(4)?,
                        title: row.get(5)?,
                        imported_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(media)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT gedcom_id FROM media WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media WHERE tree_id = ?", [tree_id], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn link(&self, link: &MediaLink) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO media_links (entity_id, entity_type, tree_id, media_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![link.entity_id, link.entity_type.as_str(), link.tree_id, link.media_id],
        )?;
        Ok(())
    }

    pub fn linked_media(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT media_id FROM media_links
             WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3
             ORDER BY media_id",
        )?;
        let ids = stmt
            .query_map(params![tree_id, entity_type.as_str(), entity_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn delete_links_for(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "DELETE FROM media_links WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![tree_id, entity_type.as_str(), entity_id],
        )?;
        Ok(())
    }
}
