/// SQL-schema för GEDCOM-import
/// Alla poster är avgränsade per träd (tree_id)

pub const SCHEMA_VERSION: i32 = 2;

pub const CREATE_TABLES: &str = r#"
-- Personer
CREATE TABLE IF NOT EXISTS persons (
    person_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    given_name TEXT,
    surname TEXT,
    sex TEXT,
    birth_date TEXT,
    birth_year INTEGER,
    birth_place TEXT,
    death_date TEXT,
    death_year INTEGER,
    death_place TEXT,
    living INTEGER NOT NULL DEFAULT 0,
    private INTEGER NOT NULL DEFAULT 0,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (person_id, tree_id)
);

CREATE INDEX IF NOT EXISTS idx_persons_surname ON persons(tree_id, surname);

-- Familjer
CREATE TABLE IF NOT EXISTS families (
    family_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    husband_id TEXT,
    wife_id TEXT,
    marriage_date TEXT,
    marriage_year INTEGER,
    marriage_place TEXT,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (family_id, tree_id)
);

CREATE TABLE IF NOT EXISTS family_members (
    family_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    person_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('husband', 'wife', 'child')),
    pedigree TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (family_id, tree_id, person_id, role)
);

CREATE INDEX IF NOT EXISTS idx_family_members_person ON family_members(tree_id, person_id);

-- Händelser och attribut
CREATE TABLE IF NOT EXISTS events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    event_date TEXT,
    event_year INTEGER,
    event_place TEXT,
    details TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(tree_id, entity_type, entity_id);

-- Källor
CREATE TABLE IF NOT EXISTS sources (
    gedcom_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    title TEXT,
    author TEXT,
    publication TEXT,
    abbreviation TEXT,
    text TEXT,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (gedcom_id, tree_id)
);

-- Arkiv
CREATE TABLE IF NOT EXISTS repositories (
    gedcom_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    name TEXT,
    address TEXT,
    city TEXT,
    state TEXT,
    postal_code TEXT,
    country TEXT,
    phone TEXT,
    email TEXT,
    website TEXT,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (gedcom_id, tree_id)
);

CREATE TABLE IF NOT EXISTS source_repositories (
    source_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    repository_id TEXT NOT NULL,
    call_number TEXT,
    PRIMARY KEY (source_id, tree_id, repository_id)
);

-- Anteckningar
CREATE TABLE IF NOT EXISTS notes (
    gedcom_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    text TEXT NOT NULL,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (gedcom_id, tree_id)
);

CREATE TABLE IF NOT EXISTS note_links (
    entity_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    note_id TEXT NOT NULL,
    PRIMARY KEY (entity_id, entity_type, tree_id, note_id)
);

-- Media
CREATE TABLE IF NOT EXISTS media (
    gedcom_id TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    file_path TEXT,
    stored_path TEXT,
    format TEXT,
    title TEXT,
    imported_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (gedcom_id, tree_id)
);

CREATE TABLE IF NOT EXISTS media_links (
    entity_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    media_id TEXT NOT NULL,
    PRIMARY KEY (entity_id, entity_type, tree_id, media_id)
);

-- Källhänvisningar
CREATE TABLE IF NOT EXISTS citations (
    citation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    tree_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    page TEXT,
    quality INTEGER,
    text TEXT,
    date TEXT
);

CREATE INDEX IF NOT EXISTS idx_citations_entity ON citations(tree_id, entity_type, entity_id);

-- Importjobb
CREATE TABLE IF NOT EXISTS import_jobs (
    job_id TEXT PRIMARY KEY,
    tree_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',
    progress REAL NOT NULL DEFAULT 0,
    processed_records INTEGER NOT NULL DEFAULT 0,
    total_records INTEGER NOT NULL DEFAULT 0,
    log TEXT NOT NULL DEFAULT '[]',
    cancel_requested INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Id-mappning per jobb (för återupptagna jobb)
CREATE TABLE IF NOT EXISTS import_id_map (
    job_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    original_id TEXT NOT NULL,
    mapped_id TEXT NOT NULL,
    PRIMARY KEY (job_id, kind, original_id)
);

-- Migrationshistorik
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
