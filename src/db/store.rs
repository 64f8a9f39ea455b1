//! Lagringsporten som importen skriver genom
//!
//! `Database` implementerar den över SQLite. Tester kan lägga en egen
//! implementation runt databasen för att simulera fel.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::models::{
    Citation, EntityType, Event, Family, FamilyMember, Media, MediaLink, Note, NoteLink, Person,
    Repository, RepositoryLink, Source,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Databasen går inte att nå alls, importen kan inte fortsätta
    #[error("Databasen är inte tillgänglig: {0}")]
    Unavailable(String),

    /// Fel som gäller en enskild post
    #[error("Kunde inte spara: {0}")]
    Record(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::ReadOnly
                | ErrorCode::DiskFull
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied => Self::Unavailable(e.to_string()),
                _ => Self::Record(e.to_string()),
            },
            _ => Self::Record(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Record(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// En huvudrad för någon av de sex posttyperna
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRow {
    Person(Person),
    Family(Family),
    Source(Source),
    Repository(Repository),
    Note(Note),
    Media(Media),
}

impl StoreRow {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Person(_) => EntityType::Person,
            Self::Family(_) => EntityType::Family,
            Self::Source(_) => EntityType::Source,
            Self::Repository(_) => EntityType::Repository,
            Self::Note(_) => EntityType::Note,
            Self::Media(_) => EntityType::Media,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Person(p) => &p.person_id,
            Self::Family(f) => &f.family_id,
            Self::Source(s) => &s.gedcom_id,
            Self::Repository(r) => &r.gedcom_id,
            Self::Note(n) => &n.gedcom_id,
            Self::Media(m) => &m.gedcom_id,
        }
    }

    pub fn tree_id(&self) -> &str {
        match self {
            Self::Person(p) => &p.tree_id,
            Self::Family(f) => &f.tree_id,
            Self::Source(s) => &s.tree_id,
            Self::Repository(r) => &r.tree_id,
            Self::Note(n) => &n.tree_id,
            Self::Media(m) => &m.tree_id,
        }
    }

    /// Fyll tomma fält från `incoming` (sammanslagning)
    pub fn fill_missing(&mut self, incoming: &StoreRow) {
        match (self, incoming) {
            (Self::Person(a), Self::Person(b)) => a.fill_missing(b),
            (Self::Family(a), Self::Family(b)) => a.fill_missing(b),
            (Self::Source(a), Self::Source(b)) => a.fill_missing(b),
            (Self::Repository(a), Self::Repository(b)) => a.fill_missing(b),
            (Self::Note(a), Self::Note(b)) => {
                if a.text.trim().is_empty() {
                    a.text.clone_from(&b.text);
                }
            }
            (Self::Media(a), Self::Media(b)) => a.fill_missing(b),
            _ => {}
        }
    }
}

/// Lagring för importerade poster
pub trait ImportStore {
    fn begin(&self) -> StoreResult<()>;
    fn commit(&self) -> StoreResult<()>;
    fn rollback(&self) -> StoreResult<()>;

    /// INSERT ... ON CONFLICT DO UPDATE på (id, tree_id)
    fn upsert(&self, row: &StoreRow) -> StoreResult<()>;
    fn find(&self, entity_type: EntityType, id: &str, tree_id: &str) -> StoreResult<Option<StoreRow>>;
    fn exists(&self, entity_type: EntityType, id: &str, tree_id: &str) -> StoreResult<bool> {
        Ok(self.find(entity_type, id, tree_id)?.is_some())
    }
    /// Alla id:n av en typ i trädet (för förskjutning av nya id:n)
    fn ids(&self, entity_type: EntityType, tree_id: &str) -> StoreResult<Vec<String>>;
    fn persons(&self, tree_id: &str) -> StoreResult<Vec<Person>>;

    /// Ta bort händelser, källhänvisningar och länkar som ägs av entiteten
    fn clear_owned(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()>;
    fn events(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Event>>;
    fn insert_event(&self, event: &Event) -> StoreResult<()>;
    fn citations(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Citation>>;
    fn insert_citation(&self, citation: &Citation) -> StoreResult<()>;
    fn link_note(&self, link: &NoteLink) -> StoreResult<()>;
    fn link_media(&self, link: &MediaLink) -> StoreResult<()>;
    fn link_repository(&self, link: &RepositoryLink) -> StoreResult<()>;

    fn family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<Vec<FamilyMember>>;
    fn clear_family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<()>;
    fn add_family_member(&self, member: &FamilyMember) -> StoreResult<()>;
    fn set_spouses(
        &self,
        family_id: &str,
        tree_id: &str,
        husband_id: Option<&str>,
        wife_id: Option<&str>,
    ) -> StoreResult<()>;

    fn load_id_mappings(&self, job_id: &str) -> StoreResult<Vec<(EntityType, String, String)>>;
    fn save_id_mapping(&self, job_id: &str, entity_type: EntityType, original: &str, mapped: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StoreError::from(busy).is_fatal());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!StoreError::from(constraint).is_fatal());

        assert!(!StoreError::from(rusqlite::Error::QueryReturnedNoRows).is_fatal());
    }

    #[test]
    fn test_row_merge() {
        let mut existing = Person::new("I1", "t1");
        existing.given_name = Some("Anna".into());
        let mut incoming = Person::new("I1", "t1");
        incoming.surname = Some("Berg".into());

        let mut row = StoreRow::Person(existing);
        row.fill_missing(&StoreRow::Person(incoming));
        match row {
            StoreRow::Person(p) => {
                assert_eq!(p.given_name.as_deref(), Some("Anna"));
                assert_eq!(p.surname.as_deref(), Some("Berg"));
            }
            _ => panic!("fel radtyp"),
        }
        assert_eq!(StoreRow::Note(Note::new("N1", "t1", "x")).entity_type(), EntityType::Note);
    }
}
