use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::StoreResult;
use crate::models::{RepositoryLink, Source};

/// Källor och deras kopplingar till arkiv
pub struct SourceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SourceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, source: &Source) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO sources (gedcom_id, tree_id, title, author, publication, abbreviation, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(gedcom_id, tree_id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                publication = excluded.publication,
                abbreviation = excluded.abbreviation,
                text = excluded.text,
                imported_at = datetime('now')",
            params![
                source.gedcom_id,
                source.tree_id,
                source.title,
                source.author,
                source.publication,
                source.abbreviation,
                source.text,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, gedcom_id: &str, tree_id: &str) -> StoreResult<Option<Source>> {
        let conn = lock(&self.conn)?;
        let source = conn
            .query_row(
                "SELECT gedcom_id, tree_id, title, author, publication, abbreviation, text, imported_at
                 FROM sources WHERE gedcom_id = ?1 AND tree_id = ?2",
                params![gedcom_id, tree_id],
                Self::row_to_source,
            )
            .optional()?;
        Ok(source)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT gedcom_id FROM sources WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sources WHERE tree_id = ?", [tree_id], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Koppla källa till arkiv (uppdaterar signum om kopplingen finns)
    pub fn link_repository(&self, link: &RepositoryLink) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO source_repositories (source_id, tree_id, repository_id, call_number)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_id, tree_id, repository_id) DO UPDATE SET
                call_number = COALESCE(excluded.call_number, source_repositories.call_number)",
            params![link.source_id, link.tree_id, link.repository_id, link.call_number],
        )?;
        Ok(())
    }

    pub fn repository_links(&self, source_id: &str, tree_id: &str) -> StoreResult<Vec<RepositoryLink>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT source_id, tree_id, repository_id, call_number
             FROM source_repositories WHERE source_id = ?1 AND tree_id = ?2
             ORDER BY repository_id",
        )?;
        let links = stmt
            .query_map(params![source_id, tree_id], |row| {
                Ok(RepositoryLink {
                    source_id: row.get(0)?,
                    tree_id: row.get(1)?,
                    repository_id: row.get(2)?,
                    call_number: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    pub fn delete_repository_links(&self, source_id: &str, tree_id: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "DELETE FROM source_repositories WHERE source_id = ?1 AND tree_id = ?2",
            params![source_id, tree_id],
        )?;
        Ok(())
    }

    fn row_to_source(row: &Row) -> rusqlite::Result<Source> {
        Ok(Source {
            gedcom_id: row.get(0)?,
            tree_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            publication: row.get(4)?,
            abbreviation: row.get(5)?,
            text: row.get(6)?,
            imported_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_source_and_repository_link() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.sources();

        let mut source = Source::new("S1", "t1");
        source.title = Some("Lunds domkyrkoförsamling C:12".into());
        repo.upsert(&source).unwrap();
        assert_eq!(repo.find("S1", "t1").unwrap().unwrap().title, source.title);

        let link = RepositoryLink {
            source_id: "S1".into(),
            tree_id: "t1".into(),
            repository_id: "R1".into(),
            call_number: Some("LLA/1234".into()),
        };
        repo.link_repository(&link).unwrap();
        repo.link_repository(&RepositoryLink { call_number: None, ..link.clone() }).unwrap();

        let links = repo.repository_links("S1", "t1").unwrap();
        assert_eq!(links, vec![link]);
    }
}
