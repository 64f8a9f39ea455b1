use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::StoreResult;
use crate::models::{EntityType, Note, NoteLink};

/// Anteckningar och kopplingar till dem
pub struct NoteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NoteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, note: &Note) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO notes (gedcom_id, tree_id, text) VALUES (?1, ?2, ?3)
             ON CONFLICT(gedcom_id, tree_id) DO UPDATE SET
                text = excluded.text,
                imported_at = datetime('now')",
            params![note.gedcom_id, note.tree_id, note.text],
        )?;
        Ok(())
    }

    pub fn find(&self, gedcom_id: &str, tree_id: &str) -> StoreResult<Option<Note>> {
        let conn = lock(&self.conn)?;
        let note = conn
            .query_row(
                "SELECT gedcom_id, tree_id, text, imported_at FROM notes
                 WHERE gedcom_id = ?1 AND tree_id = ?2",
                params![gedcom_id, tree_id],
                |row| {
                    Ok(Note {
                        gedcom_id: row.get(0)?,
                        tree_id: row.get(1)?,
                        text: row.get(2)?,
                        imported_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(note)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT gedcom_id FROM notes WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes WHERE tree_id = ?", [tree_id], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn link(&self, link: &NoteLink) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO note_links (entity_id, entity_type, tree_id, note_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![link.entity_id, link.entity_type.as_str(), link.tree_id, link.note_id],
        )?;
        Ok(())
    }

    pub fn linked_notes(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT note_id FROM note_links
             WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3
             ORDER BY note_id",
        )?;
        let ids = stmt
            .query_map(params![tree_id, entity_type.as_str(), entity_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn delete_links_for(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "DELETE FROM note_links WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![tree_id, entity_type.as_str(), entity_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_note_links_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.notes();

        repo.upsert(&Note::new("N1", "t1", "Rad ett\nRad två")).unwrap();
        let link = NoteLink {
            entity_id: "I1".into(),
            entity_type: EntityType::Person,
            tree_id: "t1".into(),
            note_id: "N1".into(),
        };
        repo.link(&link).unwrap();
        repo.link(&link).unwrap();

        assert_eq!(repo.linked_notes(EntityType::Person, "I1", "t1").unwrap(), vec!["N1".to_string()]);
        assert_eq!(repo.find("N1", "t1").unwrap().unwrap().text, "Rad ett\nRad två");

        repo.delete_links_for(EntityType::Person, "I1", "t1").unwrap();
        assert!(repo.linked_notes(EntityType::Person, "I1", "t1").unwrap().is_empty());
    }
}
