use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::schema::{CREATE_TABLES, SCHEMA_VERSION};

/// Kör alla nödvändiga migrationer
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_current_version(conn)?;

    if current_version == 0 {
        // Ny databas - skapa allt
        info!("Skapar ny databas med schema version {}", SCHEMA_VERSION);
        initial_setup(conn)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrerar databas från version {} till {}",
            current_version, SCHEMA_VERSION
        );
        migrate_from(conn, current_version)?;
    } else {
        info!("Databas är uppdaterad (version {})", current_version);
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations')",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get(0)
    })?;

    Ok(version.unwrap_or(0))
}

fn initial_setup(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;

    conn.execute(
        "INSERT INTO schema_migrations (version) VALUES (?)",
        [SCHEMA_VERSION],
    )?;

    info!("Initial setup klar");
    Ok(())
}

fn migrate_from(conn: &Connection, from_version: i32) -> Result<()> {
    // Nya tabeller skapas direkt, kolumnändringar görs stegvis
    conn.execute_batch(CREATE_TABLES)?;

    for version in (from_version + 1)..=SCHEMA_VERSION {
        if version == 2 {
            migrate_v1_to_v2(conn)?;
        }

        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [version],
        )?;

        info!("Migrerade till version {}", version);
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|n| n == column))
}

/// Migration v1 -> v2: sekretessflagga på personer och avbrottsflagga på jobb
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    info!("Migration v2: Lägger till persons.private och import_jobs.cancel_requested");

    if !has_column(conn, "persons", "private")? {
        conn.execute_batch("ALTER TABLE persons ADD COLUMN private INTEGER NOT NULL DEFAULT 0;")?;
    }
    if !has_column(conn, "import_jobs", "cancel_requested")? {
        conn.execute_batch(
            "ALTER TABLE import_jobs ADD COLUMN cancel_requested INTEGER NOT NULL DEFAULT 0;",
        )?;
    }

    Ok(())
}
