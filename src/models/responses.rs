use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::document::{DocumentStatus, PiiCategory};
use super::job::QueueStats;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestUploadBody {
    /// Display name of the file the client intends to upload
    pub file_name: String,
    /// Declared size in bytes, validated against the configured ceiling
    pub size_bytes: i64,
    /// Declared MIME type, validated against the allow-list
    pub mime_type: String,
    /// Free-form classification tags; duplicates are dropped
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestUploadResponse {
    /// Presigned URL the client uploads the raw bytes to
    pub upload_url: String,
    /// Identifier of the freshly created document record
    pub document_id: Uuid,
    /// Storage key the bytes land under
    pub upload_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteUploadResponse {
    /// Identifier of the live job for this document, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: DocumentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedactionStatsResponse {
    /// Total number of masked spans
    pub redaction_count: i32,
    /// Masked span count per PII category
    pub redactions_by_type: BTreeMap<PiiCategory, i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentStatusResponse {
    pub id: Uuid,
    pub filename: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
    pub pii_redacted: bool,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction_stats: Option<RedactionStatsResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueHealthResponse {
    pub backend_reachable: bool,
    pub queues: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatsResponse {
    pub health: QueueHealthResponse,
    /// Per-queue counters; only present for admin callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, QueueStats>>,
}
