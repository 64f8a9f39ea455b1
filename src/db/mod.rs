pub mod schema;
pub mod migrations;
pub mod store;
pub mod person_repo;
pub mod family_repo;
pub mod event_repo;
pub mod source_repo;
pub mod archive_repo;
pub mod note_repo;
pub mod media_repo;
pub mod job_repo;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use archive_repo::ArchiveRepository;
pub use event_repo::EventRepository;
pub use family_repo::FamilyRepository;
pub use job_repo::JobRepository;
pub use media_repo::MediaRepository;
pub use note_repo::NoteRepository;
pub use person_repo::PersonRepository;
pub use source_repo::SourceRepository;
pub use store::{ImportStore, StoreError, StoreResult, StoreRow};

use crate::models::{
    Citation, EntityType, Event, FamilyMember, MediaLink, NoteLink, Person, RepositoryLink,
};

/// Lås anslutningen. Ett förgiftat lås betyder att databasen inte går att använda.
pub(crate) fn lock(conn: &Arc<Mutex<Connection>>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Unavailable("Databaslåset är förgiftat".to_string()))
}

/// Huvuddatabas-wrapper med thread-safe access
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Öppna eller skapa databas
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Öppna in-memory databas (för tester)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Kör databasmigrationer
    pub fn migrate(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        migrations::run_migrations(&conn)
    }

    pub fn persons(&self) -> PersonRepository {
        PersonRepository::new(Arc::clone(&self.conn))
    }

    pub fn families(&self) -> FamilyRepository {
        FamilyRepository::new(Arc::clone(&self.conn))
    }

    pub fn events(&self) -> EventRepository {
        EventRepository::new(Arc::clone(&self.conn))
    }

    pub fn sources(&self) -> SourceRepository {
        SourceRepository::new(Arc::clone(&self.conn))
    }

    pub fn archives(&self) -> ArchiveRepository {
        ArchiveRepository::new(Arc::clone(&self.conn))
    }

    pub fn notes(&self) -> NoteRepository {
        NoteRepository::new(Arc::clone(&self.conn))
    }

    pub fn media(&self) -> MediaRepository {
        MediaRepository::new(Arc::clone(&self.conn))
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(Arc::clone(&self.conn))
    }

    /// Direkt tillgång till connection (för avancerade operationer)
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = lock(&self.conn)?;
        f(&conn)
    }

    fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl ImportStore for Database {
    fn begin(&self) -> StoreResult<()> {
        self.execute_batch("BEGIN IMMEDIATE")
    }

    fn commit(&self) -> StoreResult<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&self) -> StoreResult<()> {
        self.execute_batch("ROLLBACK")
    }

    fn upsert(&self, row: &StoreRow) -> StoreResult<()> {
        match row {
            StoreRow::Person(p) => self.persons().upsert(p),
            StoreRow::Family(f) => self.families().upsert(f),
            StoreRow::Source(s) => self.sources().upsert(s),
            StoreRow::Repository(r) => self.archives().upsert(r),
            StoreRow::Note(n) => self.notes().upsert(n),
            StoreRow::Media(m) => self.media().upsert(m),
        }
    }

    fn find(&self, entity_type: EntityType, id: &str, tree_id: &str) -> StoreResult<Option<StoreRow>> {
        Ok(match entity_type {
            EntityType::Person => self.persons().find(id, tree_id)?.map(StoreRow::Person),
            EntityType::Family => self.families().find(id, tree_id)?.map(StoreRow::Family),
            EntityType::Source => self.sources().find(id, tree_id)?.map(StoreRow::Source),
            EntityType::Repository => self.archives().find(id, tree_id)?.map(StoreRow::Repository),
            EntityType::Note => self.notes().find(id, tree_id)?.map(StoreRow::Note),
            EntityType::Media => self.media().find(id, tree_id)?.map(StoreRow::Media),
        })
    }

    fn ids(&self, entity_type: EntityType, tree_id: &str) -> StoreResult<Vec<String>> {
        match entity_type {
            EntityType::Person => self.persons().ids(tree_id),
            EntityType::Family => self.families().ids(tree_id),
            EntityType::Source => self.sources().ids(tree_id),
            EntityType::Repository => self.archives().ids(tree_id),
            EntityType::Note => self.notes().ids(tree_id),
            EntityType::Media => self.media().ids(tree_id),
        }
    }

    fn persons(&self, tree_id: &str) -> StoreResult<Vec<Person>> {
        Database::persons(self).find_by_tree(tree_id)
    }

    fn clear_owned(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()> {
        self.events().delete_for(entity_type, entity_id, tree_id)?;
        self.notes().delete_links_for(entity_type, entity_id, tree_id)?;
        self.media().delete_links_for(entity_type, entity_id, tree_id)?;
        if entity_type == EntityType::Source {
            self.sources().delete_repository_links(entity_id, tree_id)?;
        }
        Ok(())
    }

    fn events(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Event>> {
        Database::events(self).find_for(entity_type, entity_id, tree_id)
    }

    fn insert_event(&self, event: &Event) -> StoreResult<()> {
        Database::events(self).insert(event).map(|_| ())
    }

    fn citations(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Citation>> {
        Database::events(self).citations_for(entity_type, entity_id, tree_id)
    }

    fn insert_citation(&self, citation: &Citation) -> StoreResult<()> {
        Database::events(self).insert_citation(citation).map(|_| ())
    }

    fn link_note(&self, link: &NoteLink) -> StoreResult<()> {
        self.notes().link(link)
    }

    fn link_media(&self, link: &MediaLink) -> StoreResult<()> {
        Database::media(self).link(link)
    }

    fn link_repository(&self, link: &RepositoryLink) -> StoreResult<()> {
        self.sources().link_repository(link)
    }

    fn family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<Vec<FamilyMember>> {
        self.families().members(family_id, tree_id)
    }

    fn clear_family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<()> {
        self.families().clear_members(family_id, tree_id)
    }

    fn add_family_member(&self, member: &FamilyMember) -> StoreResult<()> {
        self.families().add_member(member)
    }

    fn set_spouses(
        &self,
        family_id: &str,
        tree_id: &str,
        husband_id: Option<&str>,
        wife_id: Option<&str>,
    ) -> StoreResult<()> {
        self.families().set_spouses(family_id, tree_id, husband_id, wife_id)
    }

    fn load_id_mappings(&self, job_id: &str) -> StoreResult<Vec<(EntityType, String, String)>> {
        self.jobs().load_mappings(job_id)
    }

    fn save_id_mapping(&self, job_id: &str, entity_type: EntityType, original: &str, mapped: &str) -> StoreResult<()> {
        self.jobs().save_mapping(job_id, entity_type, original, mapped)
    }
}
