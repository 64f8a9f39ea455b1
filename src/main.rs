//! Genlib Import - Entry Point
//!
//! Importerar en GEDCOM-fil till ett släktträd i databasen.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use genlib_import::db::Database;
use genlib_import::import::{ImportController, JobRegistry, JobRun, JobStore};
use genlib_import::models::{DuplicatePolicy, ExecutionMode, ImportSettings, JobStatus, MatchStrategy};
use genlib_import::services::LocalMediaStorage;
use genlib_import::utils::path::{display_path, gedcom_stem, get_database_path, get_media_dir};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Replace,
    Merge,
    Skip,
    KeepBoth,
    Append,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Replace => DuplicatePolicy::Replace,
            PolicyArg::Merge => DuplicatePolicy::Merge,
            PolicyArg::Skip => DuplicatePolicy::Skip,
            PolicyArg::KeepBoth => DuplicatePolicy::KeepBoth,
            PolicyArg::Append => DuplicatePolicy::AppendWithOffset,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatchArg {
    Id,
    Standard,
    Fuzzy,
}

impl From<MatchArg> for MatchStrategy {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Id => MatchStrategy::Id,
            MatchArg::Standard => MatchStrategy::Standard,
            MatchArg::Fuzzy => MatchStrategy::Fuzzy,
        }
    }
}

/// Importera en GEDCOM-fil till ett släktträd
#[derive(Debug, Parser)]
#[command(name = "genlib-import", version, about)]
struct Cli {
    /// GEDCOM-fil
    file: PathBuf,

    /// Släktträd som posterna skrivs till
    #[arg(long, default_value = "default")]
    tree: String,

    /// Databasfil (standard: programmets datakatalog)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Inställningsfil i TOML-format
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Hantering av poster som redan finns
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Matchning av befintliga personer
    #[arg(long = "match", value_enum)]
    match_strategy: Option<MatchArg>,

    /// Kör hela importen i en transaktion
    #[arg(long)]
    transactional: bool,

    /// Importera i block om N poster (kan återupptas)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tidsbudget i sekunder
    #[arg(long)]
    timeout: Option<u64>,

    /// Teckenkodning om filen saknar eller har fel CHAR-rad
    #[arg(long)]
    encoding: Option<String>,

    /// Kopiera mediafiler till mediakatalogen
    #[arg(long)]
    copy_media: bool,

    /// Återuppta ett jobb i kö
    #[arg(long, value_name = "JOBB")]
    resume: Option<String>,

    /// Validera filen utan att importera
    #[arg(long)]
    validate_only: bool,

    /// Utförligare loggning
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Result<ImportSettings> {
        let mut settings = match &self.settings {
            Some(path) => ImportSettings::load_from(path)?,
            None => ImportSettings::load(),
        };

        if let Some(policy) = self.policy {
            settings.duplicate_policy = policy.into();
        }
        if let Some(strategy) = self.match_strategy {
            settings.match_strategy = strategy.into();
        }
        if self.transactional {
            settings.use_transactions = true;
        }
        if let Some(size) = self.chunk_size {
            settings.execution_mode = ExecutionMode::Chunked;
            settings.chunk_size = size;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_seconds = timeout;
        }
        if self.encoding.is_some() {
            settings.declared_encoding = self.encoding.clone();
        }
        if self.copy_media {
            settings.copy_media_files = true;
        }
        if settings.copy_media_files && settings.media_base_dir.is_none() {
            settings.media_base_dir = self.file.parent().map(|p| p.to_path_buf());
        }
        Ok(settings)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initiera logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let settings = cli.settings()?;

    if cli.validate_only {
        let bytes = std::fs::read(&cli.file)
            .with_context(|| format!("Kunde inte läsa {}", cli.file.display()))?;
        let db = Database::open_in_memory()?;
        let jobs = JobRegistry::new();
        let report = ImportController::new(&db, &jobs, &settings).validate_bytes(&bytes)?;

        println!("{}", report.summary());
        for error in &report.errors {
            println!("  fel: {}", error);
        }
        for warning in &report.warnings {
            println!("  varning: {}", warning);
        }
        return Ok(report.is_valid());
    }

    let db_path = cli.db.clone().unwrap_or_else(get_database_path);
    let db = Database::open(&db_path)
        .with_context(|| format!("Kunde inte öppna databasen {}", display_path(&db_path)))?;
    tracing::info!("Databas: {}", display_path(&db_path));

    let target_dir = settings.media_target_dir.clone().unwrap_or_else(get_media_dir);
    let mut media = LocalMediaStorage::new(settings.media_base_dir.clone(), target_dir);
    if let Some(stem) = gedcom_stem(&cli.file) {
        media = media.with_gedcom_stem(stem);
    }

    let file_label = cli.file.display().to_string();
    let run = if settings.use_transactions {
        // Transaktionen håller databasen låst, jobbet följs i minnet
        let registry = JobRegistry::new();
        let db_jobs = db.jobs();
        let job_id = match &cli.resume {
            Some(id) => {
                let job = db_jobs
                    .get(id)?
                    .with_context(|| format!("Jobb {} hittades inte", id))?;
                registry.create(&job)?;
                id.clone()
            }
            None => {
                let controller = ImportController::new(&db, &registry, &settings);
                let job = controller.create_job(&cli.tree, &file_label)?;
                db_jobs.create(&job)?;
                job.job_id
            }
        };

        let controller = ImportController::new(&db, &registry, &settings).with_media(&media);
        let run = controller.run_file(&job_id, &cli.file)?;
        db_jobs.update(&run.job)?;
        run
    } else {
        let jobs = db.jobs();
        let controller = ImportController::new(&db, &jobs, &settings).with_media(&media);
        let job_id = match &cli.resume {
            Some(id) => id.clone(),
            None => controller.create_job(&cli.tree, &file_label)?.job_id,
        };
        controller.run_file(&job_id, &cli.file)?
    };

    report(cli, &settings, &run)
}

fn report(cli: &Cli, settings: &ImportSettings, run: &JobRun) -> Result<bool> {
    println!("Jobb {}: {}", run.job.job_id, run.job.status.label());
    println!("{}", run.result.table());

    if !run.result.warnings.is_empty() {
        println!("Varningar ({}):", run.result.warnings.len());
        for warning in &run.result.warnings {
            println!("  {}", warning);
        }
    }
    for error in &run.result.errors {
        println!("  fel: {}", error);
    }

    match run.job.status {
        JobStatus::Completed => Ok(true),
        JobStatus::Queued => {
            println!(
                "Tidsbudgeten tog slut. Fortsätt med: {}",
                resume_command(cli, settings, &run.job.job_id)
            );
            Ok(true)
        }
        JobStatus::Cancelled => Ok(false),
        JobStatus::Failed => match &run.failure {
            Some(e) => bail!("Importen misslyckades: {}", e),
            None => bail!("Importen misslyckades"),
        },
        JobStatus::Processing => Ok(false),
    }
}

/// Kommandorad som fortsätter jobbet med samma körinställningar
fn resume_command(cli: &Cli, settings: &ImportSettings, job_id: &str) -> String {
    let mut args = vec!["genlib-import".to_string(), cli.file.display().to_string()];
    if let Some(db) = &cli.db {
        args.push(format!("--db {}", db.display()));
    }
    if let Some(path) = &cli.settings {
        args.push(format!("--settings {}", path.display()));
    }
    if let Some(policy) = cli.policy.and_then(|p| p.to_possible_value()) {
        args.push(format!("--policy {}", policy.get_name()));
    }
    if let Some(strategy) = cli.match_strategy.and_then(|m| m.to_possible_value()) {
        args.push(format!("--match {}", strategy.get_name()));
    }
    if let Some(encoding) = &cli.encoding {
        args.push(format!("--encoding {}", encoding));
    }
    if cli.copy_media {
        args.push("--copy-media".to_string());
    }
    if cli.transactional {
        args.push("--transactional".to_string());
    }
    if settings.execution_mode == ExecutionMode::Chunked {
        args.push(format!("--chunk-size {}", settings.chunk_size));
    }
    if settings.timeout_seconds > 0 {
        args.push(format!("--timeout {}", settings.timeout_seconds));
    }
    args.push(format!("--resume {}", job_id));
    args.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_command_keeps_execution_options() {
        let cli = Cli::try_parse_from([
            "genlib-import",
            "familj.ged",
            "--db",
            "släkt.db",
            "--policy",
            "keep-both",
            "--chunk-size",
            "200",
            "--timeout",
            "30",
        ])
        .unwrap();
        let settings = ImportSettings {
            execution_mode: ExecutionMode::Chunked,
            chunk_size: 200,
            timeout_seconds: 30,
            ..Default::default()
        };

        assert_eq!(
            resume_command(&cli, &settings, "abc"),
            "genlib-import familj.ged --db släkt.db --policy keep-both --chunk-size 200 --timeout 30 --resume abc"
        );
    }
}
