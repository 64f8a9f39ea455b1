use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::{StoreError, StoreResult};
use crate::import::job::JobStore;
use crate::models::{EntityType, ImportJob, JobStatus};

/// Importjobb och deras id-mappningar
pub struct JobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Alla jobb för ett träd, nyast först
    pub fn find_by_tree(&self, tree_id: &str) -> StoreResult<Vec<ImportJob>> {
        let ids: Vec<String> = {
            let conn = lock(&self.conn)?;
            let mut stmt = conn.prepare(
                "SELECT job_id FROM import_jobs WHERE tree_id = ? ORDER BY created_at DESC, job_id",
            )?;
            let ids = stmt
                .query_map([tree_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            ids
        };

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.get(&id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    pub fn load_mappings(&self, job_id: &str) -> StoreResult<Vec<(EntityType, String, String)>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT kind, original_id, mapped_id FROM import_id_map WHERE job_id = ? ORDER BY kind, original_id",
        )?;
        let rows = stmt
            .query_map([job_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(kind, original, mapped)| {
                let kind = EntityType::from_db_str(&kind)
                    .ok_or_else(|| StoreError::Record(format!("Okänd typ i id-mappning: {}", kind)))?;
                Ok((kind, original, mapped))
            })
            .collect()
    }

    pub fn save_mapping(&self, job_id: &str, kind: EntityType, original: &str, mapped: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO import_id_map (job_id, kind, original_id, mapped_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(job_id, kind, original_id) DO UPDATE SET mapped_id = excluded.mapped_id",
            params![job_id, kind.as_str(), original, mapped],
        )?;
        Ok(())
    }
}

impl JobStore for JobRepository {
    fn create(&self, job: &ImportJob) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO import_jobs (job_id, tree_id, file_path, status, progress, processed_records,
                                      total_records, log, cancel_requested, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.job_id,
                job.tree_id,
                job.file_path,
                job.status.as_str(),
                job.progress,
                job.processed_records as i64,
                job.total_records as i64,
                serde_json::to_string(&job.log)?,
                job.cancel_requested,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Skriv hela jobbets tillstånd i en rad. Avbrottsflaggan skrivs aldrig
    /// tillbaka till falskt här.
    fn update(&self, job: &ImportJob) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(
            "UPDATE import_jobs SET
                status = ?2, progress = ?3, processed_records = ?4, total_records = ?5,
                log = ?6, cancel_requested = MAX(cancel_requested, ?7), updated_at = ?8
             WHERE job_id = ?1",
            params![
                job.job_id,
                job.status.as_str(),
                job.progress,
                job.processed_records as i64,
                job.total_records as i64,
                serde_json::to_string(&job.log)?,
                job.cancel_requested,
                job.updated_at,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::Record(format!("Jobb {} hittades inte", job.job_id)));
        }
        Ok(())
    }

    fn get(&self, job_id: &str) -> StoreResult<Option<ImportJob>> {
        let conn = lock(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT job_id, tree_id, file_path, status, progress, processed_records, total_records,
                        log, cancel_requested, created_at, updated_at
                 FROM import_jobs WHERE job_id = ?",
                [job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, bool>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((job_id, tree_id, file_path, status, progress, processed, total, log, cancel, created, updated)) = row
        else {
            return Ok(None);
        };

        let status = JobStatus::from_db_str(&status)
            .ok_or_else(|| StoreError::Record(format!("Okänd jobbstatus: {}", status)))?;

        Ok(Some(ImportJob {
            job_id,
            tree_id,
            file_path,
            status,
            progress,
            processed_records: processed.max(0) as usize,
            total_records: total.max(0) as usize,
            log: serde_json::from_str(&log)?,
            cancel_requested: cancel,
            created_at: created,
            updated_at: updated,
        }))
    }

    fn request_cancel(&self, job_id: &str) -> StoreResult<bool> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(
            "UPDATE import_jobs SET cancel_requested = 1, updated_at = datetime('now')
             WHERE job_id = ? AND status IN ('queued', 'processing')",
            [job_id],
        )?;
        Ok(rows > 0)
    }

    fn cancel_requested(&self, job_id: &str) -> StoreResult<bool> {
        let conn = lock(&self.conn)?;
        let flag: Option<bool> = conn
            .query_row(
                "SELECT cancel_requested FROM import_jobs WHERE job_id = ?",
                [job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_job_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.jobs();

        let mut job = ImportJob::new("job-1", "t1", "/tmp/familj.ged");
        repo.create(&job).unwrap();

        job.status = JobStatus::Processing;
        job.set_progress(50, 200);
        job.log_line("Startade");
        repo.update(&job).unwrap();

        let loaded = repo.get("job-1").unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Processing);
        assert_eq!(loaded.processed_records, 50);
        assert_eq!(loaded.progress, 25.0);
        assert_eq!(loaded.log, vec!["Startade".to_string()]);

        assert!(repo.request_cancel("job-1").unwrap());
        // En uppdatering från arbetaren får inte nollställa flaggan
        repo.update(&job).unwrap();
        assert!(repo.cancel_requested("job-1").unwrap());

        assert!(repo.get("saknas").unwrap().is_none());
        assert_eq!(repo.find_by_tree("t1").unwrap().len(), 1);
    }

    #[test]
    fn test_id_mappings() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.jobs();

        repo.save_mapping("job-1", EntityType::Person, "I1", "I101").unwrap();
        repo.save_mapping("job-1", EntityType::Family, "F1", "F51").unwrap();
        repo.save_mapping("job-2", EntityType::Person, "I1", "I1").unwrap();

        let mappings = repo.load_mappings("job-1").unwrap();
        assert_eq!(mappings.len(), 2);
        assert!(mappings.contains(&(EntityType::Person, "I1".to_string(), "I101".to_string())));
    }
}
