//! Jobbstatus som kan läsas medan importen pågår

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::db::{StoreError, StoreResult};
use crate::models::{ImportJob, JobStatus};

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Nytt jobb-id, unikt inom processen och sorterbart på tid
pub fn new_job_id() -> String {
    let n = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("import-{}-{}", Utc::now().format("%Y%m%d%H%M%S%6f"), n)
}

/// Lagring av importjobb
///
/// Varje uppdatering skriver hela jobbet på en gång så att den som läser
/// aldrig ser ett halvskrivet tillstånd.
pub trait JobStore {
    fn create(&self, job: &ImportJob) -> StoreResult<()>;
    fn update(&self, job: &ImportJob) -> StoreResult<()>;
    fn get(&self, job_id: &str) -> StoreResult<Option<ImportJob>>;
    /// Begär avbrott. Falskt om jobbet inte finns eller redan är avslutat.
    fn request_cancel(&self, job_id: &str) -> StoreResult<bool>;
    fn cancel_requested(&self, job_id: &str) -> StoreResult<bool>;
}

/// Jobbregister i minnet
///
/// Används när databasen är låst av importens egen transaktion och i tester.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, ImportJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_jobs<T>(&self, f: impl FnOnce(&mut HashMap<String, ImportJob>) -> T) -> StoreResult<T> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| StoreError::Unavailable("Jobbregistrets lås är förgiftat".to_string()))?;
        Ok(f(&mut jobs))
    }

    pub fn all(&self) -> StoreResult<Vec<ImportJob>> {
        self.with_jobs(|jobs| {
            let mut all: Vec<ImportJob> = jobs.values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
            all
        })
    }
}

impl JobStore for JobRegistry {
    fn create(&self, job: &ImportJob) -> StoreResult<()> {
        self.with_jobs(|jobs| {
            if jobs.contains_key(&job.job_id) {
                return Err(StoreError::Record(format!("Jobb {} finns redan", job.job_id)));
            }
            jobs.insert(job.job_id.clone(), job.clone());
            Ok(())
        })?
    }

    fn update(&self, job: &ImportJob) -> StoreResult<()> {
        self.with_jobs(|jobs| match jobs.get_mut(&job.job_id) {
            Some(current) => {
                let cancel = current.cancel_requested || job.cancel_requested;
                *current = job.clone();
                current.cancel_requested = cancel;
                Ok(())
            }
            None => Err(StoreError::Record(format!("Jobb {} hittades inte", job.job_id))),
        })?
    }

    fn get(&self, job_id: &str) -> StoreResult<Option<ImportJob>> {
        self.with_jobs(|jobs| jobs.get(job_id).cloned())
    }

    fn request_cancel(&self, job_id: &str) -> StoreResult<bool> {
        self.with_jobs(|jobs| match jobs.get_mut(job_id) {
            Some(job) if matches!(job.status, JobStatus::Queued | JobStatus::Processing) => {
                job.cancel_requested = true;
                job.touch();
                true
            }
            _ => false,
        })
    }

    fn cancel_requested(&self, job_id: &str) -> StoreResult<bool> {
        self.with_jobs(|jobs| jobs.get(job_id).map(|j| j.cancel_requested).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keeps_cancel_flag() {
        let registry = JobRegistry::new();
        let mut job = ImportJob::new("j1", "t1", "fil.ged");
        registry.create(&job).unwrap();
        assert!(registry.create(&job).is_err());

        assert!(registry.request_cancel("j1").unwrap());
        job.status = JobStatus::Processing;
        registry.update(&job).unwrap();
        assert!(registry.cancel_requested("j1").unwrap());
        assert_eq!(registry.get("j1").unwrap().unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert!(a.starts_with("import-"));
    }

    #[test]
    fn test_cancel_finished_job() {
        let registry = JobRegistry::new();
        let mut job = ImportJob::new("j1", "t1", "fil.ged");
        job.status = JobStatus::Completed;
        registry.create(&job).unwrap();

        assert!(!registry.request_cancel("j1").unwrap());
        assert!(!registry.request_cancel("saknas").unwrap());
        assert_eq!(registry.all().unwrap().len(), 1);
    }
}
