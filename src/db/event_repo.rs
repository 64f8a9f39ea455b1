use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::{StoreError, StoreResult};
use crate::models::{Citation, EntityType, Event};

/// Händelser och källhänvisningar
pub struct EventRepository {
    conn: Arc<Mutex<Connection>>,
}

fn parse_entity_type(s: &str) -> StoreResult<EntityType> {
    EntityType::from_db_str(s).ok_or_else(|| StoreError::Record(format!("Okänd entitetstyp: {}", s)))
}

impl EventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn insert(&self, event: &Event) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO events (entity_id, entity_type, tree_id, event_type,
                                 event_date, event_year, event_place, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.entity_id,
                event.entity_type.as_str(),
                event.tree_id,
                event.event_type,
                event.event_date,
                event.event_year,
                event.event_place,
                event.details,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_for(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Event>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT event_id, entity_id, entity_type, tree_id, event_type,
                    event_date, event_year, event_place, details
             FROM events
             WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3
             ORDER BY event_year IS NULL, event_year, event_id",
        )?;

        let rows = stmt
            .query_map(params![tree_id, entity_type.as_str(), entity_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<i32>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, entity_id, entity_type, tree_id, event_type, date, year, place, details)| {
                Ok(Event {
                    event_id: Some(id),
                    entity_id,
                    entity_type: parse_entity_type(&entity_type)?,
                    tree_id,
                    event_type,
                    event_date: date,
                    event_year: year,
                    event_place: place,
                    details,
                })
            })
            .collect()
    }

    pub fn insert_citation(&self, citation: &Citation) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO citations (entity_id, entity_type, tree_id, source_id, page, quality, text, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                citation.entity_id,
                citation.entity_type.as_str(),
                citation.tree_id,
                citation.source_id,
                citation.page,
                citation.quality,
                citation.text,
                citation.date,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn citations_for(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Citation>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT citation_id, entity_id, entity_type, tree_id, source_id, page, quality, text, date
             FROM citations
             WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3
             ORDER BY citation_id",
        )?;

        let rows = stmt
            .query_map(params![tree_id, entity_type.as_str(), entity_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<i32>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, entity_id, entity_type, tree_id, source_id, page, quality, text, date)| {
                Ok(Citation {
                    citation_id: Some(id),
                    entity_id,
                    entity_type: parse_entity_type(&entity_type)?,
                    tree_id,
                    source_id,
                    page,
                    quality,
                    text,
                    date,
                })
            })
            .collect()
    }

    /// Ta bort händelser och källhänvisningar som hör till entiteten
    pub fn delete_for(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "DELETE FROM events WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![tree_id, entity_type.as_str(), entity_id],
        )?;
        conn.execute(
            "DELETE FROM citations WHERE tree_id = ?1 AND entity_type = ?2 AND entity_id = ?3",
            params![tree_id, entity_type.as_str(), entity_id],
        )?;
        Ok(())
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events WHERE tree_id = ?", [tree_id], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn count_citations(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM citations WHERE tree_id = ?",
            [tree_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_events_roundtrip_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.events();

        let mut birth = Event::new("I1", EntityType::Person, "t1", "BIRT");
        birth.event_date = Some("14 JAN 1923".into());
        birth.event_year = Some(1923);
        repo.insert(&birth).unwrap();
        repo.insert(&Event::new("I1", EntityType::Person, "t1", "OCCU")).unwrap();
        repo.insert(&Event::new("F1", EntityType::Family, "t1", "MARR")).unwrap();

        let events = repo.find_for(EntityType::Person, "I1", "t1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "BIRT");
        assert!(events[0].same_as(&birth));

        repo.delete_for(EntityType::Person, "I1", "t1").unwrap();
        assert!(repo.find_for(EntityType::Person, "I1", "t1").unwrap().is_empty());
        assert_eq!(repo.count("t1").unwrap(), 1);
    }

    #[test]
    fn test_citations() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.events();

        repo.insert_citation(&Citation {
            citation_id: None,
            entity_id: "I1".into(),
            entity_type: EntityType::Person,
            tree_id: "t1".into(),
            source_id: "S1".into(),
            page: Some("s. 12".into()),
            quality: Some(3),
            text: None,
            date: None,
        })
        .unwrap();

        let citations = repo.citations_for(EntityType::Person, "I1", "t1").unwrap();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].page.as_deref(), Some("s. 12"));
        assert_eq!(citations[0].quality, Some(3));
    }
}
