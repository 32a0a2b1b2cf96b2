use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::models::{FailureDisposition, Job};
use crate::processing::{extract_events, ProcessingOutcome, RedactionEngine};
use crate::queue::{QueueError, QueueService};
use crate::storage::StorageService;

/// Pipeline stage a job moves through. The success path is
/// received -> extracting -> redacting -> persisting -> done; a failure
/// in any stage carries that stage into the recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStage {
    Received,
    Extracting,
    Redacting,
    Persisting,
}

impl std::fmt::Display for WorkerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerStage::Received => "received",
            WorkerStage::Extracting => "extracting",
            WorkerStage::Redacting => "redacting",
            WorkerStage::Persisting => "persisting",
        };
        write!(f, "{name}")
    }
}

/// One attempt's failure, attributed to the pipeline stage it happened
/// in. Whether it becomes a document-level failure is the queue's call.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {message}")]
pub struct ProcessingError {
    pub stage: WorkerStage,
    pub message: String,
}

impl ProcessingError {
    fn new<S: Into<String>>(stage: WorkerStage, message: S) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Drives queued jobs through the extraction/redaction pipeline and
/// writes the results back to the document record store. Job state is
/// only ever touched through the queue's ack/fail surface.
pub struct Worker {
    db: Database,
    queue: QueueService,
    storage: Arc<dyn StorageService>,
    engine: Arc<dyn RedactionEngine>,
    poll_interval: Duration,
    concurrency: usize,
}

impl Worker {
    pub fn new(
        db: Database,
        queue: QueueService,
        storage: Arc<dyn StorageService>,
        engine: Arc<dyn RedactionEngine>,
        poll_interval_secs: u64,
        concurrency: usize,
    ) -> Self {
        Self {
            db,
            queue,
            storage,
            engine,
            poll_interval: Duration::from_secs(poll_interval_secs),
            concurrency,
        }
    }

    /// Main loop: poll the queue, fan claimed jobs out to bounded
    /// concurrent tasks, and drain in-flight work before returning once
    /// shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        info!(
            "Starting worker {} with {} concurrent jobs",
            self.queue.worker_id(),
            self.concurrency
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    let permit = semaphore.clone().acquire_owned().await?;
                    let worker = self.clone();
                    tokio::spawn(async move {
                        worker.process_job(job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(QueueError::BackendUnavailable(msg)) => {
                    error!("Queue backend unreachable, backing off: {}", msg);
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    error!("Error dequeuing job: {}", e);
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        // Wait for in-flight jobs; the grace period is the supervisor's
        // problem, not ours.
        let _ = semaphore.acquire_many(self.concurrency as u32).await?;
        info!("Worker {} drained, exiting", self.queue.worker_id());
        Ok(())
    }

    /// Process one claimed job end to end.
    pub async fn process_job(&self, job: Job) {
        info!(
            "Processing job {} for document {} | File: '{}' | Type: {} | Size: {} bytes",
            job.id, job.document_id, job.filename, job.mime_type, job.file_size
        );

        // Claim the document record first: guards against a duplicate
        // enqueue racing in while this job was waiting.
        match self.db.begin_processing(job.document_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.handle_failure(
                    &job,
                    ProcessingError::new(
                        WorkerStage::Received,
                        "document is not in a processable state",
                    ),
                )
                .await;
                return;
            }
            Err(e) => {
                self.handle_failure(
                    &job,
                    ProcessingError::new(
                        WorkerStage::Received,
                        format!("could not claim document record: {e}"),
                    ),
                )
                .await;
                return;
            }
        }

        match self.run_pipeline(&job).await {
            Ok(()) => {
                if let Err(e) = self.queue.ack(job.id).await {
                    // The persisted document is already ready; a redelivery
                    // of this job will fail its claim and leave it intact.
                    warn!("Failed to ack completed job {}: {}", job.id, e);
                }
                info!(
                    "Completed job {} for document {} ('{}')",
                    job.id, job.document_id, job.filename
                );
            }
            Err(err) => self.handle_failure(&job, err).await,
        }
    }

    async fn run_pipeline(&self, job: &Job) -> Result<(), ProcessingError> {
        // Extracting: fetch the original bytes and derive text
        let bytes = self.storage.read(&job.file_path).await.map_err(|e| {
            ProcessingError::new(
                WorkerStage::Extracting,
                format!("could not fetch source object: {e}"),
            )
        })?;

        let text = self
            .engine
            .extract_text(&bytes, &job.mime_type)
            .await
            .map_err(|e| ProcessingError::new(WorkerStage::Extracting, e.to_string()))?;

        // Redacting: mask PII, then pull timeline candidates from the
        // masked text so no detected span reaches the event list
        let redaction = self
            .engine
            .redact(&text)
            .await
            .map_err(|e| ProcessingError::new(WorkerStage::Redacting, e.to_string()))?;

        let events = extract_events(&redaction.redacted_text);

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let checksum = format!("{:x}", hasher.finalize());

        let outcome = ProcessingOutcome {
            redacted_text: redaction.redacted_text,
            redaction_map: redaction.redaction_map,
            events,
        };

        // Persisting: one write carries every derived artifact
        let updated = self
            .db
            .complete_processing(job.document_id, &checksum, &outcome)
            .await
            .map_err(|e| ProcessingError::new(WorkerStage::Persisting, e.to_string()))?;

        if !updated {
            return Err(ProcessingError::new(
                WorkerStage::Persisting,
                "document left the processing state mid-flight",
            ));
        }

        Ok(())
    }

    /// Record a failed attempt with the queue. The document record only
    /// flips to failed when the queue reports the job out of retries;
    /// transient attempts stay invisible at the document level.
    async fn handle_failure(&self, job: &Job, err: ProcessingError) {
        let message = err.to_string();
        warn!(
            "Job {} for document {} failed: {}",
            job.id, job.document_id, message
        );

        match self.queue.fail(job.id, &message).await {
            Ok(FailureDisposition::Retrying { delay_secs }) => {
                info!(
                    "Job {} will be retried in {}s",
                    job.id, delay_secs
                );
            }
            Ok(FailureDisposition::Terminal) => {
                match self.db.fail_processing(job.document_id, &message).await {
                    Ok(true) => {
                        error!(
                            "Document {} permanently failed: {}",
                            job.document_id, message
                        );
                    }
                    Ok(false) => {
                        warn!(
                            "Document {} was not in a failable state after terminal job failure",
                            job.document_id
                        );
                    }
                    Err(e) => {
                        error!(
                            "Could not record terminal failure for document {}: {}",
                            job.document_id, e
                        );
                    }
                }
            }
            Err(e) => {
                error!("Failed to record failure for job {}: {}", job.id, e);
            }
        }
    }
}

/// Periodic queue maintenance: return jobs orphaned by crashed workers
/// to the waiting state and sweep completed rows past retention.
pub async fn run_maintenance(queue: QueueService, stale_minutes: i32, retention_days: i32) {
    let mut interval = tokio::time::interval(Duration::from_secs(300));
    loop {
        interval.tick().await;

        if let Err(e) = queue.recover_stale(stale_minutes).await {
            error!("Error recovering stale jobs: {}", e);
        }

        if let Err(e) = queue.cleanup_completed(retention_days).await {
            error!("Error cleaning up completed jobs: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_error_carries_stage() {
        let err = ProcessingError::new(WorkerStage::Extracting, "could not fetch source object");
        assert_eq!(
            err.to_string(),
            "extracting stage failed: could not fetch source object"
        );

        let err = ProcessingError::new(WorkerStage::Persisting, "write rejected");
        assert!(err.to_string().starts_with("persisting stage failed"));
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(WorkerStage::Received.to_string(), "received");
        assert_eq!(WorkerStage::Extracting.to_string(), "extracting");
        assert_eq!(WorkerStage::Redacting.to_string(), "redacting");
        assert_eq!(WorkerStage::Persisting.to_string(), "persisting");
    }
}
