use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{FailureDisposition, Job, NewJob, QueueStats};

pub const DOCUMENT_QUEUE: &str = "vault-processing";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("a live job already exists for document {0}")]
    DuplicateJob(Uuid),

    #[error("job {0} not found")]
    JobNotFound(Uuid),
}

/// Exponential backoff schedule for retried attempts. The exponent is
/// clamped so a misconfigured attempt budget cannot overflow the shift.
pub fn backoff_delay(base_secs: u64, attempt: i32) -> u64 {
    let exponent = attempt.saturating_sub(1).clamp(0, 10) as u32;
    base_secs.saturating_mul(1u64 << exponent)
}

/// Connectivity-class failures surface as BackendUnavailable to every
/// caller; nothing swallows them silently.
pub fn is_connectivity_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
    )
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity_error(&err) {
            QueueError::BackendUnavailable(err.to_string())
        } else {
            QueueError::Database(err)
        }
    }
}

/// Postgres-backed durable work queue. Job rows survive process
/// restarts; claiming is atomic so each job is delivered to exactly one
/// active consumer.
#[derive(Clone)]
pub struct QueueService {
    pool: PgPool,
    name: String,
    worker_id: String,
    max_attempts: i32,
    retry_delay_secs: u64,
}

impl QueueService {
    pub fn new(pool: PgPool, max_attempts: i32, retry_delay_secs: u64) -> Self {
        let worker_id = format!(
            "worker-{}-{}",
            hostname::get().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        Self {
            pool,
            name: DOCUMENT_QUEUE.to_string(),
            worker_id,
            max_attempts,
            retry_delay_secs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueue a processing job with a payload snapshot of the document
    /// record. Callers gate this on the document being pending; the
    /// partial unique index turns a racing duplicate into DuplicateJob.
    pub async fn enqueue(&self, job: &NewJob) -> Result<Uuid, QueueError> {
        let row = sqlx::query(
            r#"
            INSERT INTO processing_queue
                (document_id, user_id, file_path, filename, mime_type, file_size, max_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(job.document_id)
        .bind(job.user_id)
        .bind(&job.file_path)
        .bind(&job.filename)
        .bind(&job.mime_type)
        .bind(job.file_size)
        .bind(self.max_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                QueueError::DuplicateJob(job.document_id)
            }
            _ => QueueError::from(e),
        })?;

        let id: Uuid = row.get("id");
        info!(
            "Enqueued job {} for document {} on queue {}",
            id, job.document_id, self.name
        );
        Ok(id)
    }

    /// The most recent job row for a document that is still waiting or
    /// active. Used by the ingress layer for idempotent CompleteUpload.
    pub async fn find_live_job(&self, document_id: Uuid) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM processing_queue
            WHERE document_id = $1
              AND status IN ('pending', 'processing')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Claim the next eligible job atomically. Returns None when the
    /// queue is empty or every eligible row lost the race; callers poll.
    pub async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        // A couple of retries absorb claim races between workers
        for _ in 0..3 {
            let mut tx = self.pool.begin().await?;

            let job_row = sqlx::query(
                r#"
                SELECT id FROM processing_queue
                WHERE status = 'pending'
                  AND next_attempt_at <= NOW()
                  AND attempts < max_attempts
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
                "#,
            )
            .fetch_optional(&mut *tx)
            .await?;

            let job_id: Uuid = match job_row {
                Some(row) => row.get("id"),
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
            };

            let updated = sqlx::query(
                r#"
                UPDATE processing_queue
                SET status = 'processing',
                    started_at = NOW(),
                    worker_id = $1,
                    attempts = attempts + 1
                WHERE id = $2
                  AND status = 'pending'
                "#,
            )
            .bind(&self.worker_id)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() != 1 {
                tx.rollback().await?;
                warn!("Job {} was claimed by another worker, retrying", job_id);
                continue;
            }

            let job = sqlx::query_as::<_, Job>(r#"SELECT * FROM processing_queue WHERE id = $1"#)
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await?;

            tx.commit().await?;

            info!(
                "Worker {} claimed job {} for document {} (attempt {}/{})",
                self.worker_id, job.id, job.document_id, job.attempts, job.max_attempts
            );
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Mark a job completed. Idempotent: acking a job that already left
    /// the active state affects no rows and is a no-op.
    pub async fn ack(&self, job_id: Uuid) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            UPDATE processing_queue
            SET status = 'completed',
                completed_at = NOW()
            WHERE id = $1
              AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a failed attempt. With attempts left the job goes back to
    /// waiting behind an exponential backoff delay; otherwise it lands
    /// in the terminal failed state and the caller is told so.
    pub async fn fail(&self, job_id: Uuid, reason: &str) -> Result<FailureDisposition, QueueError> {
        let row = sqlx::query(
            r#"SELECT attempts, max_attempts FROM processing_queue WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QueueError::JobNotFound(job_id))?;

        let attempts: i32 = row.get("attempts");
        let max_attempts: i32 = row.get("max_attempts");

        if attempts < max_attempts {
            let delay_secs = self.backoff_delay_secs(attempts);
            sqlx::query(
                r#"
                UPDATE processing_queue
                SET status = 'pending',
                    error_message = $2,
                    started_at = NULL,
                    worker_id = NULL,
                    next_attempt_at = NOW() + make_interval(secs => $3)
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(reason)
            .bind(delay_secs as f64)
            .execute(&self.pool)
            .await?;

            warn!(
                "Job {} failed (attempt {}/{}), retrying in {}s: {}",
                job_id, attempts, max_attempts, delay_secs, reason
            );
            Ok(FailureDisposition::Retrying { delay_secs })
        } else {
            sqlx::query(
                r#"
                UPDATE processing_queue
                SET status = 'failed',
                    error_message = $2,
                    completed_at = NOW(),
                    worker_id = NULL
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(reason)
            .execute(&self.pool)
            .await?;

            warn!(
                "Job {} permanently failed after {} attempts: {}",
                job_id, attempts, reason
            );
            Ok(FailureDisposition::Terminal)
        }
    }

    /// Exponential backoff: base * 2^(attempt-1).
    pub fn backoff_delay_secs(&self, attempt: i32) -> u64 {
        backoff_delay(self.retry_delay_secs, attempt)
    }

    /// Per-queue counters in one aggregate pass; never blocks on worker
    /// availability.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending' AND next_attempt_at <= NOW()) AS waiting_count,
                COUNT(*) FILTER (WHERE status = 'processing') AS active_count,
                COUNT(*) FILTER (WHERE status = 'pending' AND next_attempt_at > NOW()) AS delayed_count,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed_count,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed_count,
                (EXTRACT(EPOCH FROM (NOW() - MIN(created_at) FILTER (WHERE status = 'pending'))) / 60.0)::double precision
                    AS oldest_waiting_minutes
            FROM processing_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            waiting_count: row.get("waiting_count"),
            active_count: row.get("active_count"),
            delayed_count: row.get("delayed_count"),
            completed_count: row.get("completed_count"),
            failed_count: row.get("failed_count"),
            oldest_waiting_minutes: row.get("oldest_waiting_minutes"),
        })
    }

    /// Lightweight reachability probe used by health reporting.
    pub async fn probe(&self) -> Result<(), QueueError> {
        sqlx::query(r#"SELECT 1 FROM processing_queue LIMIT 1"#)
            .fetch_optional(&self.pool)
            .await?;
        Ok(())
    }

    /// Return jobs stuck in processing (worker crashed mid-flight) to
    /// the waiting state. The attempt already charged at claim time
    /// stays charged.
    pub async fn recover_stale(&self, stale_minutes: i32) -> Result<i64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE processing_queue
            SET status = 'pending',
                started_at = NULL,
                worker_id = NULL,
                next_attempt_at = NOW()
            WHERE status = 'processing'
              AND started_at < NOW() - INTERVAL '1 minute' * $1
            "#,
        )
        .bind(stale_minutes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            warn!("Recovered {} stale jobs", result.rows_affected());
        }

        Ok(result.rows_affected() as i64)
    }

    /// Retention sweep for completed job rows; they are kept only long
    /// enough for stats queries.
    pub async fn cleanup_completed(&self, days_to_keep: i32) -> Result<i64, QueueError> {
        let result = sqlx::query(
            r#"
            DELETE FROM processing_queue
            WHERE status = 'completed'
              AND completed_at < NOW() - INTERVAL '1 day' * $1
            "#,
        )
        .bind(days_to_keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as i64)
    }

}
