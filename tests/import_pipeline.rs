//! Importflödet från GEDCOM-text till databas

use std::cell::Cell;
use std::time::Duration;

use genlib_import::db::{Database, ImportStore, StoreError, StoreResult, StoreRow};
use genlib_import::gedcom::RecordKind;
use genlib_import::import::{ImportController, JobRegistry, JobRun, JobStore};
use genlib_import::models::*;

const FAMILY: &str = "\
0 HEAD
1 SOUR TEST
1 GEDC
2 VERS 5.5.1
1 CHAR UTF-8
0 @I1@ INDI
1 NAME Karl /Lind/
1 SEX M
1 BIRT
2 DATE 3 MAR 1840
2 PLAC Västerås
2 SOUR @S1@
3 PAGE s. 12
3 QUAY 3
1 DEAT
2 DATE 1901
1 FAMS @F1@
0 @I2@ INDI
1 NAME Maria /Svensson/
1 SEX F
1 BIRT
2 DATE ABT 1845
1 BURI
2 PLAC Västerås
1 FAMS @F1@
1 NOTE @N1@
0 @I3@ INDI
1 NAME Erik /Lind/
1 BIRT
2 DATE 1870
1 DEAT
2 DATE 1950
1 FAMC @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 MARR
2 DATE 1868
0 @S1@ SOUR
1 TITL Husförhörslängd
1 REPO @R1@
2 CALN AI:12
0 @R1@ REPO
1 NAME Landsarkivet
0 @N1@ NOTE Flyttade från Köping
0 TRLR
";

fn import(db: &dyn ImportStore, settings: &ImportSettings, text: &str) -> JobRun {
    let jobs = JobRegistry::new();
    let controller = ImportController::new(db, &jobs, settings);
    let job = controller.create_job("t1", "test.ged").unwrap();
    controller.run(&job.job_id, text.as_bytes()).unwrap()
}

fn persons(count: usize, living: bool) -> String {
    let year = if living { 1990 } else { 1850 };
    let mut text = String::from("0 HEAD\n1 CHAR UTF-8\n");
    for n in 1..=count {
        text.push_str(&format!(
            "0 @I{n}@ INDI\n1 NAME Person{n} /Test/\n1 BIRT\n2 DATE {year}\n"
        ));
    }
    text.push_str(&format!("0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I{count}@\n0 TRLR\n"));
    text
}

/// Lagring som släpper igenom allt till databasen men kan fördröja,
/// avbryta eller misslyckas för utvalda personer
struct TestStore<'a> {
    db: &'a Database,
    fail_person: Option<&'a str>,
    unavailable_at: Option<&'a str>,
    cancel_at: Option<(&'a str, &'a JobRegistry, &'a str)>,
    delay: Option<Duration>,
    upserts: Cell<usize>,
}

impl<'a> TestStore<'a> {
    fn new(db: &'a Database) -> Self {
        Self {
            db,
            fail_person: None,
            unavailable_at: None,
            cancel_at: None,
            delay: None,
            upserts: Cell::new(0),
        }
    }
}

impl ImportStore for TestStore<'_> {
    fn begin(&self) -> StoreResult<()> {
        self.db.begin()
    }
    fn commit(&self) -> StoreResult<()> {
        self.db.commit()
    }
    fn rollback(&self) -> StoreResult<()> {
        self.db.rollback()
    }

    fn upsert(&self, row: &StoreRow) -> StoreResult<()> {
        self.upserts.set(self.upserts.get() + 1);
        if let StoreRow::Person(person) = row {
            if self.fail_person == Some(person.person_id.as_str()) {
                return Err(StoreError::Record("simulerat fel".to_string()));
            }
            if self.unavailable_at == Some(person.person_id.as_str()) {
                return Err(StoreError::Unavailable("disken försvann".to_string()));
            }
            if let Some((person_id, jobs, job_id)) = self.cancel_at {
                if person.person_id == person_id {
                    jobs.request_cancel(job_id)?;
                }
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
        }
        self.db.upsert(row)
    }
    fn find(&self, entity_type: EntityType, id: &str, tree_id: &str) -> StoreResult<Option<StoreRow>> {
        self.db.find(entity_type, id, tree_id)
    }
    fn ids(&self, entity_type: EntityType, tree_id: &str) -> StoreResult<Vec<String>> {
        self.db.ids(entity_type, tree_id)
    }
    fn persons(&self, tree_id: &str) -> StoreResult<Vec<Person>> {
        ImportStore::persons(self.db, tree_id)
    }
    fn clear_owned(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<()> {
        self.db.clear_owned(entity_type, entity_id, tree_id)
    }
    fn events(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Event>> {
        ImportStore::events(self.db, entity_type, entity_id, tree_id)
    }
    fn insert_event(&self, event: &Event) -> StoreResult<()> {
        self.db.insert_event(event)
    }
    fn citations(&self, entity_type: EntityType, entity_id: &str, tree_id: &str) -> StoreResult<Vec<Citation>> {
        self.db.citations(entity_type, entity_id, tree_id)
    }
    fn insert_citation(&self, citation: &Citation) -> StoreResult<()> {
        self.db.insert_citation(citation)
    }
    fn link_note(&self, link: &NoteLink) -> StoreResult<()> {
        self.db.link_note(link)
    }
    fn link_media(&self, link: &MediaLink) -> StoreResult<()> {
        self.db.link_media(link)
    }
    fn link_repository(&self, link: &RepositoryLink) -> StoreResult<()> {
        self.db.link_repository(link)
    }
    fn family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<Vec<FamilyMember>> {
        self.db.family_members(family_id, tree_id)
    }
    fn clear_family_members(&self, family_id: &str, tree_id: &str) -> StoreResult<()> {
        self.db.clear_family_members(family_id, tree_id)
    }
    fn add_family_member(&self, member: &FamilyMember) -> StoreResult<()> {
        self.db.add_family_member(member)
    }
    fn set_spouses(
        &self,
        family_id: &str,
        tree_id: &str,
        husband_id: Option<&str>,
        wife_id: Option<&str>,
    ) -> StoreResult<()> {
        self.db.set_spouses(family_id, tree_id, husband_id, wife_id)
    }
    fn load_id_mappings(&self, job_id: &str) -> StoreResult<Vec<(EntityType, String, String)>> {
        self.db.load_id_mappings(job_id)
    }
    fn save_id_mapping(&self, job_id: &str, entity_type: EntityType, original: &str, mapped: &str) -> StoreResult<()> {
        self.db.save_id_mapping(job_id, entity_type, original, mapped)
    }
}

#[test]
fn test_minimal_fragment() {
    let db = Database::open_in_memory().unwrap();
    let text = "0 @I1@ INDI\n1 NAME John /Doe/\n1 BIRT\n2 DATE 1950\n";

    let run = import(&db, &ImportSettings::default(), text);
    assert!(run.is_completed(), "{:?}", run.failure);

    let person = db.persons().find("I1", "t1").unwrap().unwrap();
    assert_eq!(person.person_id, "I1");
    assert_eq!(person.tree_id, "t1");
    assert_eq!(person.given_name.as_deref(), Some("John"));
    assert_eq!(person.surname.as_deref(), Some("Doe"));
    assert_eq!(person.birth_date.as_deref(), Some("1950"));
    assert!(person.living);
}

#[test]
fn test_full_family() {
    let db = Database::open_in_memory().unwrap();
    let run = import(&db, &ImportSettings::default(), FAMILY);

    assert!(run.is_completed(), "{:?}", run.failure);
    assert_eq!(run.job.total_records, 7);
    assert_eq!(run.result.total_imported(), 7);
    assert!(run.result.errors.is_empty(), "{:?}", run.result.errors);

    let family = db.families().find("F1", "t1").unwrap().unwrap();
    assert_eq!(family.husband_id.as_deref(), Some("I1"));
    assert_eq!(family.wife_id.as_deref(), Some("I2"));
    assert_eq!(family.marriage_year, Some(1868));

    let members = db.families().members("F1", "t1").unwrap();
    assert_eq!(members.len(), 3);
    let child = members.iter().find(|m| m.role == MemberRole::Child).unwrap();
    assert_eq!(child.person_id, "I3");
    assert_eq!(child.sort_order, 1);

    let maria = db.persons().find("I2", "t1").unwrap().unwrap();
    assert!(!maria.living);

    let citations = db.events().citations_for(EntityType::Person, "I1", "t1").unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source_id, "S1");
    assert_eq!(citations[0].page.as_deref(), Some("s. 12"));
    assert_eq!(citations[0].quality, Some(3));

    let links = db.sources().repository_links("S1", "t1").unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].call_number.as_deref(), Some("AI:12"));

    assert_eq!(db.notes().linked_notes(EntityType::Person, "I2", "t1").unwrap(), vec!["N1"]);
}

#[test]
fn test_replace_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let settings = ImportSettings::default();

    import(&db, &settings, FAMILY);
    let second = import(&db, &settings, FAMILY);

    assert!(second.is_completed());
    assert_eq!(second.result.total_imported(), 0);
    assert_eq!(second.result.counts_for(&RecordKind::Individual).updated, 3);
    assert_eq!(db.persons().count("t1").unwrap(), 3);
    assert_eq!(db.families().members("F1", "t1").unwrap().len(), 3);

    let events = db.events().find_for(EntityType::Person, "I1", "t1").unwrap();
    assert_eq!(events.iter().filter(|e| e.event_type == "BIRT").count(), 1);
    assert_eq!(db.events().citations_for(EntityType::Person, "I1", "t1").unwrap().len(), 1);
}

#[test]
fn test_keep_both_doubles_records() {
    let db = Database::open_in_memory().unwrap();
    let settings = ImportSettings {
        duplicate_policy: DuplicatePolicy::KeepBoth,
        ..Default::default()
    };

    import(&db, &settings, FAMILY);
    let second = import(&db, &settings, FAMILY);

    assert!(second.is_completed());
    assert_eq!(second.result.counts_for(&RecordKind::Individual).imported, 3);
    assert_eq!(db.persons().count("t1").unwrap(), 6);
    assert_eq!(db.families().count("t1").unwrap(), 2);
    assert!(db.persons().find("I1", "t1").unwrap().is_some());
}

#[test]
fn test_record_error_without_transaction_continues() {
    let db = Database::open_in_memory().unwrap();
    let mut store = TestStore::new(&db);
    store.fail_person = Some("I2");

    let run = import(&store, &ImportSettings::default(), FAMILY);

    assert!(run.is_completed());
    assert_eq!(run.result.errors.len(), 1);
    assert!(run.result.errors[0].contains("I2"));
    assert_eq!(run.result.counts_for(&RecordKind::Individual).errors, 1);
    assert!(db.persons().find("I1", "t1").unwrap().is_some());
    assert!(db.persons().find("I2", "t1").unwrap().is_none());
}

#[test]
fn test_record_error_in_transaction_rolls_back() {
    let db = Database::open_in_memory().unwrap();
    let mut store = TestStore::new(&db);
    store.fail_person = Some("I2");
    let settings = ImportSettings {
        use_transactions: true,
        ..Default::default()
    };

    let run = import(&store, &settings, FAMILY);

    assert_eq!(run.job.status, JobStatus::Failed);
    assert!(run.failure.is_some());
    assert!(!run.result.partial);
    assert_eq!(db.persons().count("t1").unwrap(), 0);
    assert!(store.upserts.get() >= 2);
}

#[test]
fn test_unavailable_store_keeps_rows_before_failure() {
    let db = Database::open_in_memory().unwrap();
    let mut store = TestStore::new(&db);
    store.unavailable_at = Some("I5");

    let run = import(&store, &ImportSettings::default(), &persons(10, false));

    assert_eq!(run.job.status, JobStatus::Failed);
    assert!(matches!(
        run.failure,
        Some(genlib_import::ImportError::Store(StoreError::Unavailable(_)))
    ));
    assert!(run.result.partial);
    assert!(run.result.errors.is_empty());
    assert_eq!(db.persons().count("t1").unwrap(), 4);
    assert!(db.persons().find("I4", "t1").unwrap().is_some());
    assert!(db.persons().find("I5", "t1").unwrap().is_none());
}

#[test]
fn test_unavailable_store_in_transaction_keeps_nothing() {
    let db = Database::open_in_memory().unwrap();
    let mut store = TestStore::new(&db);
    store.unavailable_at = Some("I5");
    let settings = ImportSettings {
        use_transactions: true,
        ..Default::default()
    };

    let run = import(&store, &settings, &persons(10, false));

    assert_eq!(run.job.status, JobStatus::Failed);
    assert!(matches!(
        run.failure,
        Some(genlib_import::ImportError::Store(StoreError::Unavailable(_)))
    ));
    assert!(!run.result.partial);
    assert_eq!(db.persons().count("t1").unwrap(), 0);
}

#[test]
fn test_standard_matching_keeps_ids_on_reimport() {
    let db = Database::open_in_memory().unwrap();
    let settings = ImportSettings {
        duplicate_policy: DuplicatePolicy::Replace,
        match_strategy: MatchStrategy::Standard,
        ..Default::default()
    };
    let text = "0 HEAD\n0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n0 @I2@ INDI\n1 NAME John /Smith/\n1 SEX F\n0 TRLR\n";

    import(&db, &settings, text);
    let second = import(&db, &settings, text);

    assert!(second.is_completed());
    assert_eq!(db.persons().count("t1").unwrap(), 2);
    let i1 = db.persons().find("I1", "t1").unwrap().unwrap();
    let i2 = db.persons().find("I2", "t1").unwrap().unwrap();
    assert_eq!(i1.sex.as_deref(), Some("M"));
    assert_eq!(i2.sex.as_deref(), Some("F"));
}

#[test]
fn test_orphan_reference_warned_once() {
    let db = Database::open_in_memory().unwrap();
    let text = "0 HEAD\n0 @I1@ INDI\n1 NAME Anna //\n0 @F1@ FAM\n1 WIFE @I1@\n1 CHIL @I9@\n0 @F2@ FAM\n1 CHIL @I9@\n0 TRLR\n";

    let run = import(&db, &ImportSettings::default(), text);

    assert!(run.is_completed());
    let orphans: Vec<&String> = run
        .result
        .warnings
        .iter()
        .filter(|w| w.contains("Föräldralös referens") && w.contains("@I9@"))
        .collect();
    assert_eq!(orphans.len(), 2, "{:?}", orphans);
    assert!(orphans.iter().any(|w| w.contains("F1")));
    assert!(orphans.iter().any(|w| w.contains("F2")));
    assert_eq!(db.families().members("F1", "t1").unwrap().len(), 1);
}

#[test]
fn test_living_persons_skipped() {
    let db = Database::open_in_memory().unwrap();
    let settings = ImportSettings {
        living_privacy: LivingPrivacy::Skip,
        ..Default::default()
    };
    let text = "0 HEAD\n0 @I1@ INDI\n1 NAME Gammal /Test/\n1 BIRT\n2 DATE 1850\n0 @I2@ INDI\n1 NAME Ung /Test/\n1 BIRT\n2 DATE 1990\n0 @F1@ FAM\n1 HUSB @I1@\n1 CHIL @I2@\n0 TRLR\n";

    let run = import(&db, &settings, text);

    assert!(run.is_completed());
    assert!(db.persons().find("I2", "t1").unwrap().is_none());
    assert_eq!(run.result.counts_for(&RecordKind::Individual).skipped, 1);
    assert!(!run.result.warnings.iter().any(|w| w.contains("Föräldralös")));

    let members = db.families().members("F1", "t1").unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].person_id, "I1");
}

#[test]
fn test_living_persons_redacted() {
    let db = Database::open_in_memory().unwrap();
    let settings = ImportSettings {
        living_privacy: LivingPrivacy::RedactDetails,
        ..Default::default()
    };
    let text = "0 HEAD\n0 @I1@ INDI\n1 NAME Ung /Test/\n1 BIRT\n2 DATE 1990\n2 PLAC Lund\n0 TRLR\n";

    import(&db, &settings, text);

    let person = db.persons().find("I1", "t1").unwrap().unwrap();
    assert_eq!(person.given_name.as_deref(), Some("Ung"));
    assert!(person.private);
    assert!(person.birth_date.is_none());
    assert!(person.birth_place.is_none());
    assert!(db.events().find_for(EntityType::Person, "I1", "t1").unwrap().is_empty());
}

#[test]
fn test_cancel_mid_run() {
    let db = Database::open_in_memory().unwrap();
    let jobs = JobRegistry::new();
    jobs.create(&ImportJob::new("j1", "t1", "test.ged")).unwrap();

    let mut store = TestStore::new(&db);
    store.cancel_at = Some(("I5", &jobs, "j1"));
    let settings = ImportSettings {
        progress_interval: 10,
        ..Default::default()
    };

    let controller = ImportController::new(&store, &jobs, &settings);
    let run = controller.run("j1", persons(30, false).as_bytes()).unwrap();

    assert_eq!(run.job.status, JobStatus::Cancelled);
    assert!(run.result.partial);
    assert_eq!(run.job.processed_records, 10);
    assert_eq!(db.persons().count("t1").unwrap(), 10);
    assert_eq!(jobs.get("j1").unwrap().unwrap().status, JobStatus::Cancelled);
}

#[test]
fn test_cancel_in_transaction_keeps_nothing() {
    let db = Database::open_in_memory().unwrap();
    let jobs = JobRegistry::new();
    jobs.create(&ImportJob::new("j1", "t1", "test.ged")).unwrap();

    let mut store = TestStore::new(&db);
    store.cancel_at = Some(("I5", &jobs, "j1"));
    let settings = ImportSettings {
        progress_interval: 10,
        use_transactions: true,
        ..Default::default()
    };

    let controller = ImportController::new(&store, &jobs, &settings);
    let run = controller.run("j1", persons(30, false).as_bytes()).unwrap();

    assert_eq!(run.job.status, JobStatus::Cancelled);
    assert!(!run.result.partial);
    assert_eq!(db.persons().count("t1").unwrap(), 0);
}

#[test]
fn test_chunked_timeout_resumes() {
    let db = Database::open_in_memory().unwrap();
    let jobs = JobRegistry::new();
    jobs.create(&ImportJob::new("j1", "t1", "test.ged")).unwrap();
    let text = persons(60, false);

    let mut store = TestStore::new(&db);
    store.delay = Some(Duration::from_millis(25));
    let settings = ImportSettings {
        execution_mode: ExecutionMode::Chunked,
        chunk_size: MIN_CHUNK_SIZE,
        timeout_seconds: 1,
        ..Default::default()
    };

    // Första blocket tar minst 1,25 s och överskrider budgeten
    let first = ImportController::new(&store, &jobs, &settings)
        .run("j1", text.as_bytes())
        .unwrap();
    assert_eq!(first.job.status, JobStatus::Queued);
    assert_eq!(first.job.processed_records, MIN_CHUNK_SIZE);
    assert_eq!(db.persons().count("t1").unwrap(), MIN_CHUNK_SIZE as i64);

    let second = ImportController::new(&db, &jobs, &settings)
        .run("j1", text.as_bytes())
        .unwrap();
    assert!(second.is_completed(), "{:?}", second.failure);
    assert_eq!(second.result.counts_for(&RecordKind::Individual).imported, 10);
    assert_eq!(db.persons().count("t1").unwrap(), 60);

    let family = db.families().find("F1", "t1").unwrap().unwrap();
    assert_eq!(family.husband_id.as_deref(), Some("I1"));
    assert_eq!(family.wife_id.as_deref(), Some("I60"));
}

#[test]
fn test_standard_timeout_fails() {
    let db = Database::open_in_memory().unwrap();
    let mut store = TestStore::new(&db);
    store.delay = Some(Duration::from_millis(30));
    let settings = ImportSettings {
        progress_interval: 40,
        timeout_seconds: 1,
        ..Default::default()
    };

    let run = import(&store, &settings, &persons(50, false));

    assert_eq!(run.job.status, JobStatus::Failed);
    assert!(matches!(run.failure, Some(genlib_import::ImportError::TimedOut(1))));
    assert!(run.result.partial);
}

#[test]
fn test_validation_errors_become_warnings() {
    let db = Database::open_in_memory().unwrap();
    let text = "0 @I1@ INDI\n1 NAME Anna /Berg/\n0 TRLR\n";

    let run = import(&db, &ImportSettings::default(), text);

    assert!(run.is_completed());
    assert!(run.result.warnings.iter().any(|w| w.starts_with("Validering:")));
    assert!(db.persons().find("I1", "t1").unwrap().is_some());
}
