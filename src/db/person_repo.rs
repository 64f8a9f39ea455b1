use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::StoreResult;
use crate::models::Person;

const PERSON_COLUMNS: &str = "person_id, tree_id, given_name, surname, sex,
    birth_date, birth_year, birth_place, death_date, death_year, death_place,
    living, private, imported_at";

pub struct PersonRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PersonRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Skapa eller uppdatera person (unik på person_id + tree_id)
    pub fn upsert(&self, person: &Person) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO persons (person_id, tree_id, given_name, surname, sex,
                                  birth_date, birth_year, birth_place,
                                  death_date, death_year, death_place, living, private)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(person_id, tree_id) DO UPDATE SET
                given_name = excluded.given_name,
                surname = excluded.surname,
                sex = excluded.sex,
                birth_date = excluded.birth_date,
                birth_year = excluded.birth_year,
                birth_place = excluded.birth_place,
                death_date = excluded.death_date,
                death_year = excluded.death_year,
                death_place = excluded.death_place,
                living = excluded.living,
                private = excluded.private,
                imported_at = datetime('now')",
            params![
                person.person_id,
                person.tree_id,
                person.given_name,
                person.surname,
                person.sex,
                person.birth_date,
                person.birth_year,
                person.birth_place,
                person.death_date,
                person.death_year,
                person.death_place,
                person.living,
                person.private,
            ],
        )?;
        Ok(())
    }

    /// Hämta person via GEDCOM-id
    pub fn find(&self, person_id: &str, tree_id: &str) -> StoreResult<Option<Person>> {
        let conn = lock(&self.conn)?;
        let person = conn
            .query_row(
                &format!("SELECT {} FROM persons WHERE person_id = ?1 AND tree_id = ?2", PERSON_COLUMNS),
                params![person_id, tree_id],
                Self::row_to_person,
            )
            .optional()?;
        Ok(person)
    }

    /// Alla personer i ett träd
    pub fn find_by_tree(&self, tree_id: &str) -> StoreResult<Vec<Person>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM persons WHERE tree_id = ? ORDER BY surname, given_name",
            PERSON_COLUMNS
        ))?;

        let persons = stmt
            .query_map([tree_id], Self::row_to_person)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(persons)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT person_id FROM persons WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Räkna antal personer i trädet
    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM persons WHERE tree_id = ?",
            [tree_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_person(row: &Row) -> rusqlite::Result<Person> {
        Ok(Person {
            person_id: row.get(0)?,
            tree_id: row.get(1)?,
            given_name: row.get(2)?,
            surname: row.get(3)?,
            sex: row.get(4)?,
            birth_date: row.get(5)?,
            birth_year: row.get(6)?,
            birth_place: row.get(7)?,
            death_date: row.get(8)?,
            death_year: row.get(9)?,
            death_place: row.get(10)?,
            living: row.get(11)?,
            private: row.get(12)?,
            imported_at: row.get(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::models::Person;

    #[test]
    fn test_upsert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.persons();

        let mut person = Person::new("I1", "t1");
        person.given_name = Some("John".into());
        person.surname = Some("Doe".into());
        person.birth_year = Some(1950);
        repo.upsert(&person).unwrap();

        let found = repo.find("I1", "t1").unwrap().unwrap();
        assert_eq!(found.full_name(), "John Doe");
        assert_eq!(found.birth_year, Some(1950));
        assert!(found.imported_at.is_some());

        person.given_name = Some("Johnny".into());
        repo.upsert(&person).unwrap();
        assert_eq!(repo.count("t1").unwrap(), 1);
        assert_eq!(repo.find("I1", "t1").unwrap().unwrap().given_name.as_deref(), Some("Johnny"));
    }

    #[test]
    fn test_trees_are_separate() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.persons();

        repo.upsert(&Person::new("I1", "t1")).unwrap();
        repo.upsert(&Person::new("I1", "t2")).unwrap();

        assert_eq!(repo.count("t1").unwrap(), 1);
        assert_eq!(repo.count("t2").unwrap(), 1);
        assert!(repo.find("I1", "t3").unwrap().is_none());
        assert_eq!(repo.ids("t1").unwrap(), vec!["I1".to_string()]);
    }
}
