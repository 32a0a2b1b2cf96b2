use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Queue-managed state of a job row. "Delayed" is not a distinct column
/// value: a pending row with `next_attempt_at` in the future counts as
/// delayed for stats purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// One queued processing attempt. The payload columns are a snapshot of
/// the document record taken at enqueue time so a worker can start
/// without a fresh record lookup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub worker_id: Option<String>,
}

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }
}

/// Payload snapshot for a fresh enqueue. Always built from a just-read
/// document record, never recycled from an earlier job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
}

impl NewJob {
    pub fn from_document(doc: &super::VaultDocument) -> Self {
        Self {
            document_id: doc.id,
            user_id: doc.user_id,
            file_path: doc.file_path.clone(),
            filename: doc.filename.clone(),
            mime_type: doc.mime_type.clone(),
            file_size: doc.file_size,
        }
    }
}

/// What the queue decided after a `fail` call: retry after a delay, or
/// give up. The worker flips the document record to failed only on
/// `Terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    Retrying { delay_secs: u64 },
    Terminal,
}

impl FailureDisposition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureDisposition::Terminal)
    }
}

/// Per-queue counters, derived at query time and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    pub waiting_count: i64,
    pub active_count: i64,
    pub delayed_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    /// Age of the oldest waiting job, when any job is waiting
    pub oldest_waiting_minutes: Option<f64>,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.waiting_count
            + self.active_count
            + self.delayed_count
            + self.completed_count
            + self.failed_count
    }
}
