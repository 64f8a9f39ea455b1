use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status för ett importjobb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "Väntar",
            Self::Processing => "Pågår",
            Self::Completed => "Klar",
            Self::Failed => "Misslyckades",
            Self::Cancelled => "Avbruten",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Tillåtna övergångar. Processing → Queued sker när tidsbudgeten tar
    /// slut i blockläge.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Queued, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Cancelled)
                | (Self::Processing, Self::Queued)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ett importjobb och dess framsteg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub job_id: String,
    pub tree_id: String,
    pub file_path: String,
    pub status: JobStatus,
    /// 0-100
    pub progress: f64,
    pub processed_records: usize,
    pub total_records: usize,
    pub log: Vec<String>,
    pub cancel_requested: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ImportJob {
    pub fn new(job_id: impl Into<String>, tree_id: impl Into<String>, file_path: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            job_id: job_id.into(),
            tree_id: tree_id.into(),
            file_path: file_path.into(),
            status: JobStatus::Queued,
            progress: 0.0,
            processed_records: 0,
            total_records: 0,
            log: Vec::new(),
            cancel_requested: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Sätt framsteg utifrån bearbetade poster
    pub fn set_progress(&mut self, processed: usize, total: usize) {
        self.processed_records = processed;
        self.total_records = total;
        self.progress = if total == 0 {
            0.0
        } else {
            (processed as f64 / total as f64 * 100.0).min(100.0)
        };
    }

    pub fn log_line(&mut self, message: impl Into<String>) {
        self.log.push(message.into());
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}
