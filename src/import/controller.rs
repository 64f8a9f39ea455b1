//! Importjobbets körning
//!
//! Jobbet går från queued till processing och avslutas som completed, failed
//! eller cancelled. I blockläge kan det gå tillbaka till queued när
//! tidsbudgeten tar slut och återupptas senare från samma post.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::db::ImportStore;
use crate::gedcom::{decode, validate, ImportRecord, RecordAssembler, RecordKind, ValidationReport};
use crate::models::{ExecutionMode, ImportJob, ImportSettings, JobStatus};
use crate::services::MediaStorage;

use super::context::ImportContext;
use super::dispatch::{DispatchOutcome, DispatcherRegistry, RecordDispatcher};
use super::error::ImportError;
use super::job::{new_job_id, JobStore};
use super::result::ImportResult;

/// Utfallet av en körning
#[derive(Debug)]
pub struct JobRun {
    pub job: ImportJob,
    pub result: ImportResult,
    /// Felet som avslutade jobbet, om det misslyckades
    pub failure: Option<ImportError>,
}

impl JobRun {
    pub fn is_completed(&self) -> bool {
        self.job.status == JobStatus::Completed
    }
}

/// Varför genomgången av posterna slutade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Finished,
    Cancelled,
    TimedOut,
}

/// Hade skrivningen börjat när felet inträffade?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BeforeWrite,
    Writing,
}

pub struct ImportController<'a> {
    store: &'a dyn ImportStore,
    jobs: &'a dyn JobStore,
    settings: &'a ImportSettings,
    media: Option<&'a dyn MediaStorage>,
}

impl<'a> ImportController<'a> {
    pub fn new(store: &'a dyn ImportStore, jobs: &'a dyn JobStore, settings: &'a ImportSettings) -> Self {
        Self {
            store,
            jobs,
            settings,
            media: None,
        }
    }

    pub fn with_media(mut self, media: &'a dyn MediaStorage) -> Self {
        self.media = Some(media);
        self
    }

    /// Skapa ett nytt jobb i kö
    pub fn create_job(&self, tree_id: &str, file_path: &str) -> Result<ImportJob, ImportError> {
        let job = ImportJob::new(new_job_id(), tree_id, file_path);
        self.jobs.create(&job)?;
        info!("Importjobb {} skapat för träd {}", job.job_id, tree_id);
        Ok(job)
    }

    pub fn request_cancel(&self, job_id: &str) -> Result<bool, ImportError> {
        Ok(self.jobs.request_cancel(job_id)?)
    }

    /// Kör bara valideringspasset
    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<ValidationReport, ImportError> {
        let decoded = decode(bytes, self.settings.declared_encoding.as_deref())?;
        Ok(validate(&decoded.text))
    }

    /// Läs filen och kör jobbet
    pub fn run_file(&self, job_id: &str, path: &Path) -> Result<JobRun, ImportError> {
        match std::fs::read(path) {
            Ok(bytes) => self.run(job_id, &bytes),
            Err(e) => {
                let job = self.load_queued(job_id)?;
                self.fail(job, ImportResult::new(), ImportError::Io(e), Phase::BeforeWrite)
            }
        }
    }

    /// Kör eller återuppta ett jobb i kö
    ///
    /// `Err` betyder att jobbet inte kunde köras alls. Fel under körningen
    /// avslutar jobbet som failed och finns i `JobRun::failure`.
    pub fn run(&self, job_id: &str, bytes: &[u8]) -> Result<JobRun, ImportError> {
        let mut job = self.load_queued(job_id)?;

        if self.jobs.cancel_requested(job_id)? {
            self.transition(&mut job, JobStatus::Cancelled, "Avbruten innan start")?;
            return Ok(JobRun {
                job,
                result: ImportResult::new(),
                failure: None,
            });
        }

        let resume_from = job.processed_records;
        let message = if resume_from > 0 {
            format!("Återupptar efter {} poster", resume_from)
        } else {
            "Import startad".to_string()
        };
        self.transition(&mut job, JobStatus::Processing, &message)?;
        info!("Jobb {}: {}", job.job_id, message);
        let started = Instant::now();

        let decoded = match decode(bytes, self.settings.declared_encoding.as_deref()) {
            Ok(decoded) => decoded,
            Err(e) => return self.fail(job, ImportResult::new(), e.into(), Phase::BeforeWrite),
        };
        debug!("Teckenkodning {} ({:?})", decoded.encoding.encoding, decoded.encoding.source);

        let report = validate(&decoded.text);
        if !report.has_header && report.dispatchable_records() == 0 {
            let error = ImportError::Internal("Filen innehåller inga GEDCOM-poster".to_string());
            return self.fail(job, ImportResult::new(), error, Phase::BeforeWrite);
        }
        job.total_records = report.dispatchable_records();

        let mut ctx = ImportContext::new(&job.job_id, &job.tree_id, self.settings, self.store, &report);
        if let Some(media) = self.media {
            ctx = ctx.with_media(media);
        }
        if decoded.had_errors {
            ctx.result.warn(format!(
                "Tecken som inte kunde avkodas som {} ersattes",
                decoded.encoding.encoding
            ));
        }
        for error in &report.errors {
            ctx.result.warn(format!("Validering: {}", error));
        }
        ctx.result.warnings.extend(report.warnings.iter().cloned());

        match ctx.ids.load(self.store) {
            Ok(0) => {}
            Ok(n) => debug!("{} id-mappningar laddade", n),
            Err(e) => return self.fail(job, ctx.result, e.into(), Phase::BeforeWrite),
        }

        if self.settings.use_transactions {
            if let Err(e) = self.store.begin() {
                return self.fail(job, ctx.result, e.into(), Phase::BeforeWrite);
            }
        }

        let mut registry = DispatcherRegistry::standard();
        let outcome = self
            .dispatch_all(&mut job, &decoded.text, &mut ctx, &mut registry, started)
            .and_then(|stop| {
                if stop == Stop::Finished {
                    registry.finalize_all(&mut ctx)?;
                    ctx.resolve_references()?;
                }
                Ok(stop)
            });

        match outcome {
            Err(e) => self.fail(job, ctx.result, e, Phase::Writing),
            Ok(Stop::Finished) => self.complete(job, ctx.result),
            Ok(Stop::Cancelled) => self.cancel(job, ctx.result),
            Ok(Stop::TimedOut) => self.time_out(job, ctx.result),
        }
    }

    fn load_queued(&self, job_id: &str) -> Result<ImportJob, ImportError> {
        let job = self
            .jobs
            .get(job_id)?
            .ok_or_else(|| ImportError::JobNotFound(job_id.to_string()))?;

        if job.status != JobStatus::Queued {
            return Err(ImportError::InvalidState {
                job_id: job_id.to_string(),
                status: job.status.to_string(),
            });
        }
        Ok(job)
    }

    fn transition(&self, job: &mut ImportJob, next: JobStatus, message: &str) -> Result<(), ImportError> {
        if !job.status.can_transition_to(next) {
            return Err(ImportError::InvalidState {
                job_id: job.job_id.clone(),
                status: job.status.to_string(),
            });
        }
        job.status = next;
        job.log_line(message);
        job.touch();
        self.jobs.update(job)?;
        Ok(())
    }

    fn batch_size(&self) -> usize {
        match self.settings.execution_mode {
            ExecutionMode::Chunked => self.settings.effective_chunk_size(),
            ExecutionMode::Standard => self.settings.effective_progress_interval(),
        }
    }

    fn dispatch_all(
        &self,
        job: &mut ImportJob,
        text: &str,
        ctx: &mut ImportContext<'_>,
        registry: &mut DispatcherRegistry,
        started: Instant,
    ) -> Result<Stop, ImportError> {
        let resume_from = job.processed_records;
        let total = job.total_records;
        let batch_size = self.batch_size();
        let mut disabled: HashSet<RecordKind> = HashSet::new();
        let mut position = 0;
        let mut in_batch = 0;

        for record in RecordAssembler::new(text) {
            if !record.kind.is_dispatchable() {
                continue;
            }
            position += 1;

            let enabled = self.settings.records.enabled(&record.kind);
            let Some(dispatcher) = registry.get_mut(&record.kind) else {
                continue;
            };

            if position <= resume_from {
                if enabled {
                    dispatcher.replay(&record, ctx)?;
                }
                continue;
            }

            if enabled {
                dispatch_one(dispatcher, &record, ctx)?;
            } else {
                if disabled.insert(record.kind.clone()) {
                    ctx.result.warn(format!(
                        "{} importeras inte enligt inställningarna",
                        record.kind.label()
                    ));
                }
                ctx.result.record_skipped_quietly(&record.kind);
            }

            in_batch += 1;
            if in_batch >= batch_size {
                in_batch = 0;
                job.set_progress(position, total);
                if let Some(stop) = self.checkpoint(job, started)? {
                    return Ok(stop);
                }
            }
        }

        job.set_progress(position, total);
        Ok(Stop::Finished)
    }

    /// Spara framsteg och kontrollera avbrott och tidsbudget
    fn checkpoint(&self, job: &mut ImportJob, started: Instant) -> Result<Option<Stop>, ImportError> {
        job.touch();
        self.jobs.update(job)?;

        match self.settings.execution_mode {
            ExecutionMode::Chunked => info!(
                "Jobb {}: {}/{} poster ({:.0}%)",
                job.job_id, job.processed_records, job.total_records, job.progress
            ),
            ExecutionMode::Standard => debug!(
                "Jobb {}: {}/{} poster",
                job.job_id, job.processed_records, job.total_records
            ),
        }

        if self.jobs.cancel_requested(&job.job_id)? {
            return Ok(Some(Stop::Cancelled));
        }

        let budget = self.settings.timeout_seconds;
        if budget > 0 && started.elapsed() >= Duration::from_secs(budget) {
            return Ok(Some(Stop::TimedOut));
        }
        Ok(None)
    }

    fn complete(&self, mut job: ImportJob, result: ImportResult) -> Result<JobRun, ImportError> {
        if self.settings.use_transactions {
            if let Err(e) = self.store.commit() {
                return self.fail(job, result, e.into(), Phase::Writing);
            }
        }

        job.set_progress(job.total_records, job.total_records);
        self.transition(&mut job, JobStatus::Completed, &format!("Klar: {}", result.summary()))?;
        info!("Jobb {} klart: {}", job.job_id, result.summary());

        Ok(JobRun {
            job,
            result,
            failure: None,
        })
    }

    fn cancel(&self, mut job: ImportJob, mut result: ImportResult) -> Result<JobRun, ImportError> {
        let message = if self.settings.use_transactions {
            self.rollback();
            "Avbruten, inga ändringar sparades".to_string()
        } else {
            result.partial = true;
            format!("Avbruten efter {} poster", job.processed_records)
        };

        self.transition(&mut job, JobStatus::Cancelled, &message)?;
        info!("Jobb {}: {}", job.job_id, message);

        Ok(JobRun {
            job,
            result,
            failure: None,
        })
    }

    fn time_out(&self, mut job: ImportJob, result: ImportResult) -> Result<JobRun, ImportError> {
        if self.settings.execution_mode == ExecutionMode::Standard {
            let error = ImportError::TimedOut(self.settings.timeout_seconds);
            return self.fail(job, result, error, Phase::Writing);
        }

        // Det som gjorts hittills sparas så att nästa körning kan hoppa över det
        if self.settings.use_transactions {
            if let Err(e) = self.store.commit() {
                return self.fail(job, result, e.into(), Phase::Writing);
            }
        }

        let message = format!(
            "Tidsbudgeten tog slut efter {} av {} poster, återupptas vid nästa körning",
            job.processed_records, job.total_records
        );
        self.transition(&mut job, JobStatus::Queued, &message)?;
        info!("Jobb {}: {}", job.job_id, message);

        Ok(JobRun {
            job,
            result,
            failure: None,
        })
    }

    fn fail(
        &self,
        mut job: ImportJob,
        mut result: ImportResult,
        error: ImportError,
        phase: Phase,
    ) -> Result<JobRun, ImportError> {
        if phase == Phase::Writing {
            if self.settings.use_transactions {
                self.rollback();
            } else {
                result.partial = true;
            }
        }

        warn!("Jobb {} misslyckades: {}", job.job_id, error);
        let message = format!("Misslyckades: {}", error);

        // Ett jobb i kö (t.ex. filen gick inte att läsa) går direkt till failed
        job.status = JobStatus::Failed;
        job.log_line(message);
        job.touch();
        if let Err(e) = self.jobs.update(&job) {
            warn!("Kunde inte spara jobbstatus för {}: {}", job.job_id, e);
        }

        Ok(JobRun {
            job,
            result,
            failure: Some(error),
        })
    }

    fn rollback(&self) {
        if let Err(e) = self.store.rollback() {
            warn!("Återställning misslyckades: {}", e);
        }
    }
}

/// Kör en post och räkna utfallet
fn dispatch_one(
    dispatcher: &mut dyn RecordDispatcher,
    record: &ImportRecord,
    ctx: &mut ImportContext<'_>,
) -> Result<(), ImportError> {
    match dispatcher.process(record, ctx) {
        Ok(DispatchOutcome::Imported(_)) => ctx.result.record_imported(&record.kind),
        Ok(DispatchOutcome::Updated(_)) => ctx.result.record_updated(&record.kind),
        Ok(DispatchOutcome::Skipped(reason)) => ctx
            .result
            .record_skipped(&record.kind, format!("{}: {}", record.describe(), reason)),
        Err(e) => ctx.absorb(&record.kind, &record.describe(), e)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::import::job::JobRegistry;
    use crate::models::{DuplicatePolicy, Person};

    const SMALL: &str = "0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME Anna /Berg/\n1 SEX F\n1 BIRT\n2 DATE 14 JAN 1823\n2 PLAC Uppsala\n0 @I2@ INDI\n1 NAME Per /Berg/\n1 DEAT\n2 DATE 1890\n0 @F1@ FAM\n1 HUSB @I2@\n1 WIFE @I1@\n1 MARR\n2 DATE 1845\n0 TRLR\n";

    #[test]
    fn test_complete_run() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobRegistry::new();
        let settings = ImportSettings::default();
        let controller = ImportController::new(&db, &jobs, &settings);

        let job = controller.create_job("t1", "liten.ged").unwrap();
        let run = controller.run(&job.job_id, SMALL.as_bytes()).unwrap();

        assert!(run.is_completed(), "{:?}", run.failure);
        assert_eq!(run.job.total_records, 3);
        assert_eq!(run.job.progress, 100.0);
        assert_eq!(run.result.counts_for(&RecordKind::Individual).imported, 2);
        assert_eq!(run.result.counts_for(&RecordKind::Family).imported, 1);

        let stored = jobs.get(&job.job_id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.log.iter().any(|l| l.starts_with("Klar")));

        // Ett avslutat jobb kan inte köras igen
        assert!(matches!(
            controller.run(&job.job_id, SMALL.as_bytes()),
            Err(ImportError::InvalidState { .. })
        ));
        assert!(matches!(controller.run("saknas", b""), Err(ImportError::JobNotFound(_))));
    }

    #[test]
    fn test_cancel_before_start() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobRegistry::new();
        let settings = ImportSettings::default();
        let controller = ImportController::new(&db, &jobs, &settings);

        let job = controller.create_job("t1", "liten.ged").unwrap();
        assert!(controller.request_cancel(&job.job_id).unwrap());
        let run = controller.run(&job.job_id, SMALL.as_bytes()).unwrap();

        assert_eq!(run.job.status, JobStatus::Cancelled);
        assert!(db.persons().find_by_tree("t1").unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_file_fails_job() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobRegistry::new();
        let settings = ImportSettings::default();
        let controller = ImportController::new(&db, &jobs, &settings);

        let job = controller.create_job("t1", "trasig.ged").unwrap();
        // Ingen BOM, ingen CHAR-rad och inte giltig UTF-8
        let run = controller.run(&job.job_id, b"0 HEAD\n1 SOUR X\xc3\x28\n").unwrap();

        assert_eq!(run.job.status, JobStatus::Failed);
        assert!(matches!(run.failure, Some(ImportError::Encoding(_))));
        assert!(!run.result.partial);
    }

    #[test]
    fn test_missing_file_fails_job() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobRegistry::new();
        let settings = ImportSettings::default();
        let controller = ImportController::new(&db, &jobs, &settings);

        let job = controller.create_job("t1", "saknas.ged").unwrap();
        let run = controller.run_file(&job.job_id, Path::new("/finns/inte/saknas.ged")).unwrap();
        assert_eq!(run.job.status, JobStatus::Failed);
        assert!(matches!(run.failure, Some(ImportError::Io(_))));
    }

    #[test]
    fn test_disabled_record_types_are_counted_once() {
        let db = Database::open_in_memory().unwrap();
        let jobs = JobRegistry::new();
        let mut settings = ImportSettings::default();
        settings.records.families = false;
        let controller = ImportController::new(&db, &jobs, &settings);

        let job = controller.create_job("t1", "liten.ged").unwrap();
        let run = controller.run(&job.job_id, SMALL.as_bytes()).unwrap();

        assert_eq!(run.result.counts_for(&RecordKind::Family).skipped, 1);
        assert_eq!(
            run.result.warnings.iter().filter(|w| w.contains("importeras inte")).count(),
            1
        );
        assert!(db.families().find("F1", "t1").unwrap().is_none());
    }

    #[test]
    fn test_skip_policy_keeps_existing() {
        let db = Database::open_in_memory().unwrap();
        let mut existing = Person::new("I1", "t1");
        existing.given_name = Some("Annika".into());
        db.upsert(&crate::db::StoreRow::Person(existing)).unwrap();

        let jobs = JobRegistry::new();
        let settings = ImportSettings {
            duplicate_policy: DuplicatePolicy::Skip,
            ..Default::default()
        };
        let controller = ImportController::new(&db, &jobs, &settings);
        let job = controller.create_job("t1", "liten.ged").unwrap();
        let run = controller.run(&job.job_id, SMALL.as_bytes()).unwrap();

        assert_eq!(run.result.counts_for(&RecordKind::Individual).skipped, 1);
        assert_eq!(run.result.counts_for(&RecordKind::Individual).imported, 1);
        let person = db.persons().find("I1", "t1").unwrap().unwrap();
        assert_eq!(person.given_name.as_deref(), Some("Annika"));
        assert!(db.events().find_for(crate::models::EntityType::Person, "I1", "t1").unwrap().is_empty());
    }
}
