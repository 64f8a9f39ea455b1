use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::StoreResult;
use crate::models::Repository;

/// Arkiv (GEDCOM REPO-poster)
pub struct ArchiveRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ArchiveRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, repository: &Repository) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO repositories (gedcom_id, tree_id, name, address, city, state,
                                       postal_code, country, phone, email, website)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(gedcom_id, tree_id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                city = excluded.city,
                state = excluded.state,
                postal_code = excluded.postal_code,
                country = excluded.country,
                phone = excluded.phone,
                email = excluded.email,
                website = excluded.website,
                imported_at = datetime('now')",
            params![
                repository.gedcom_id,
                repository.tree_id,
                repository.name,
                repository.address,
                repository.city,
                repository.state,
                repository.postal_code,
                repository.country,
                repository.phone,
                repository.email,
                repository.website,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, gedcom_id: &str, tree_id: &str) -> StoreResult<Option<Repository>> {
        let conn = lock(&self.conn)?;
        let repository = conn
            .query_row(
                "SELECT gedcom_id, tree_id, name, address, city, state, postal_code,
                        country, phone, email, website, imported_at
                 FROM repositories WHERE gedcom_id = ?1 AND tree_id = ?2",
                params![gedcom_id, tree_id],
                Self::row_to_repository,
            )
            .optional()?;
        Ok(repository)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT gedcom_id FROM repositories WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repositories WHERE tree_id = ?",
            [tree_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_repository(row: &Row) -> rusqlite::Result<Repository> {
        Ok(Repository {
            gedcom_id: row.get(0)?,
            tree_id: row.get(1)?,
            name: row.get(2)?,
            address: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            postal_code: row.get(6)?,
            country: row.get(7)?,
            phone: row.get(8)?,
            email: row.get(9)?,
            website: row.get(10)?,
            imported_at: row.get(11)?,
        })
    }
}
