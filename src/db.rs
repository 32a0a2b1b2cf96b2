use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewVaultDocument, VaultDocument};
use crate::processing::ProcessingOutcome;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vault_documents (
                id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                user_id UUID NOT NULL,
                filename VARCHAR(255) NOT NULL,
                file_path VARCHAR(500) NOT NULL,
                file_size BIGINT NOT NULL,
                mime_type VARCHAR(100) NOT NULL,
                checksum VARCHAR(64),
                tags TEXT[] NOT NULL DEFAULT '{}',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                processing_error TEXT,
                pii_redacted BOOLEAN NOT NULL DEFAULT FALSE,
                redaction_count INTEGER,
                redactions_by_type JSONB,
                extracted_text TEXT,
                extracted_events JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processing_queue (
                id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
                document_id UUID NOT NULL REFERENCES vault_documents(id) ON DELETE CASCADE,
                user_id UUID NOT NULL,
                file_path VARCHAR(500) NOT NULL,
                filename VARCHAR(255) NOT NULL,
                mime_type VARCHAR(100) NOT NULL,
                file_size BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                error_message TEXT,
                worker_id VARCHAR(128)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_vault_documents_user_id
               ON vault_documents(user_id)"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_vault_documents_status
               ON vault_documents(status)"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_processing_queue_dequeue
               ON processing_queue(status, next_attempt_at, created_at)"#,
        )
        .execute(&self.pool)
        .await?;

        // Backstop for the one-live-job-per-document invariant; the
        // status-gated enqueue in the ingress layer is the primary guard.
        sqlx::query(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_processing_queue_live_document
               ON processing_queue(document_id)
               WHERE status IN ('pending', 'processing')"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_document(&self, new_doc: &NewVaultDocument) -> Result<VaultDocument> {
        // Tag sets are stored deduplicated, first occurrence wins
        let mut tags: Vec<String> = Vec::new();
        for tag in &new_doc.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        let document = sqlx::query_as::<_, VaultDocument>(
            r#"
            INSERT INTO vault_documents (user_id, filename, file_path, file_size, mime_type, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_doc.user_id)
        .bind(&new_doc.filename)
        .bind(&new_doc.file_path)
        .bind(new_doc.file_size)
        .bind(&new_doc.mime_type)
        .bind(&tags)
        .fetch_one(&self.pool)
        .await?;

        Ok(document)
    }

    /// Owner-scoped lookup; foreign documents are indistinguishable from
    /// missing ones.
    pub async fn get_document(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VaultDocument>> {
        let document = sqlx::query_as::<_, VaultDocument>(
            r#"SELECT * FROM vault_documents WHERE id = $1 AND user_id = $2"#,
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    /// Unscoped lookup for worker context only.
    pub async fn get_document_unscoped(&self, document_id: Uuid) -> Result<Option<VaultDocument>> {
        let document =
            sqlx::query_as::<_, VaultDocument>(r#"SELECT * FROM vault_documents WHERE id = $1"#)
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(document)
    }

    /// Flip a claimed document into processing. Tolerates a document
    /// already in processing: with at most one live job per document,
    /// that state can only be a retry of this same job.
    pub async fn begin_processing(&self, document_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vault_documents
            SET status = 'processing',
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'processing')
            "#,
        )
        .bind(document_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the full processing outcome and flip the record to ready.
    /// All derived artifacts land in one statement so partial results are
    /// never visible.
    pub async fn complete_processing(
        &self,
        document_id: Uuid,
        checksum: &str,
        outcome: &ProcessingOutcome,
    ) -> Result<bool> {
        let redactions_by_type = serde_json::to_value(&outcome.redaction_map.by_category)?;
        let extracted_events = serde_json::to_value(&outcome.events)?;

        let result = sqlx::query(
            r#"
            UPDATE vault_documents
            SET status = 'ready',
                checksum = $2,
                pii_redacted = TRUE,
                redaction_count = $3,
                redactions_by_type = $4,
                extracted_text = $5,
                extracted_events = $6,
                processing_error = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'processing'
            "#,
        )
        .bind(document_id)
        .bind(checksum)
        .bind(outcome.redaction_map.total())
        .bind(&redactions_by_type)
        .bind(&outcome.redacted_text)
        .bind(&extracted_events)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal failure: flip processing -> failed with the captured
    /// error. Called only once the queue reports the job out of retries.
    pub async fn fail_processing(&self, document_id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vault_documents
            SET status = 'failed',
                processing_error = $2,
                pii_redacted = FALSE,
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'processing')
            "#,
        )
        .bind(document_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Owner-initiated reprocess: failed -> pending, clearing the error
    /// and every derived artifact from the failed attempt.
    pub async fn reset_for_reprocess(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vault_documents
            SET status = 'pending',
                processing_error = NULL,
                checksum = NULL,
                pii_redacted = FALSE,
                redaction_count = NULL,
                redactions_by_type = NULL,
                extracted_text = NULL,
                extracted_events = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND user_id = $2
              AND status = 'failed'
            "#,
        )
        .bind(document_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
