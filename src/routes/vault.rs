use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ApiError,
    models::{
        CompleteUploadResponse, DocumentStatus, NewJob, NewVaultDocument, RedactionStatsResponse,
        RequestUploadBody, RequestUploadResponse, DocumentStatusResponse, VaultDocument,
    },
    queue::QueueError,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/uploads", post(request_upload))
        .route("/uploads/{id}/complete", post(complete_upload))
        .route("/documents/{id}", get(get_status))
        .route("/documents/{id}/reprocess", post(reprocess))
}

pub(crate) fn validate_upload(
    body: &RequestUploadBody,
    allowed_mime_types: &[String],
    max_file_size_bytes: i64,
) -> Result<String, ApiError> {
    if body.file_name.trim().is_empty() {
        return Err(ApiError::validation("file name must not be empty"));
    }

    if body.size_bytes <= 0 {
        return Err(ApiError::validation("declared size must be positive"));
    }

    if body.size_bytes > max_file_size_bytes {
        return Err(ApiError::payload_too_large(format!(
            "file size {} exceeds the {} byte limit",
            body.size_bytes, max_file_size_bytes
        )));
    }

    // An absent or generic declared type falls back to an extension
    // guess before hitting the allow-list.
    let declared = body.mime_type.trim().to_lowercase();
    let mime_type = if declared.is_empty() || declared == "application/octet-stream" {
        mime_guess::from_path(&body.file_name)
            .first_raw()
            .map(|m| m.to_lowercase())
            .unwrap_or(declared)
    } else {
        declared
    };

    if !allowed_mime_types.iter().any(|allowed| allowed == &mime_type) {
        return Err(ApiError::validation(format!(
            "unsupported mime type: {mime_type}"
        )));
    }

    Ok(mime_type)
}

/// Declare an upload. Validation runs before any record is created; a
/// rejected request allocates nothing.
#[utoipa::path(
    post,
    path = "/api/vault/uploads",
    tag = "vault",
    security(
        ("bearer_auth" = [])
    ),
    request_body = RequestUploadBody,
    responses(
        (status = 200, description = "Upload slot created", body = RequestUploadResponse),
        (status = 400, description = "Unsupported mime type or bad request shape"),
        (status = 413, description = "Declared size exceeds the configured ceiling"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(body): Json<RequestUploadBody>,
) -> Result<Json<RequestUploadResponse>, ApiError> {
    let mime_type = validate_upload(
        &body,
        &state.config.allowed_mime_types,
        state.config.max_file_size_bytes,
    )?;

    let upload_key = state.storage.generate_key(&body.file_name);
    let upload_url = state
        .storage
        .presign_upload(&upload_key)
        .await
        .map_err(|e| ApiError::backend_unavailable(format!("storage unavailable: {e}")))?;

    let document = state
        .db
        .create_document(&NewVaultDocument {
            user_id: auth_user.user_id,
            filename: body.file_name.clone(),
            file_path: upload_key.clone(),
            file_size: body.size_bytes,
            mime_type,
            tags: body.tags.clone(),
        })
        .await
        .map_err(|e| ApiError::internal(format!("could not create document record: {e}")))?;

    info!(
        "Created document {} for user {} ('{}')",
        document.id, auth_user.user_id, document.filename
    );

    Ok(Json(RequestUploadResponse {
        upload_url,
        document_id: document.id,
        upload_key,
    }))
}

/// Mark an upload finished and queue it for processing. Idempotent: a
/// repeat call reports the current state without enqueueing again.
#[utoipa::path(
    post,
    path = "/api/vault/uploads/{id}/complete",
    tag = "vault",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Processing queued or already underway", body = CompleteUploadResponse),
        (status = 404, description = "Document not found"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Queue backend unavailable")
    )
)]
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<CompleteUploadResponse>, ApiError> {
    let document = state
        .db
        .get_document(document_id, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let status = document
        .status()
        .ok_or_else(|| ApiError::internal("document record has an unknown status"))?;

    // Enqueue is gated on the document still being pending; every other
    // state means a job already ran or is running.
    if status != DocumentStatus::Pending {
        let live_job = state.queue.find_live_job(document_id).await?;
        return Ok(Json(CompleteUploadResponse {
            job_id: live_job.map(|j| j.id),
            status,
        }));
    }

    if let Some(job) = state.queue.find_live_job(document_id).await? {
        return Ok(Json(CompleteUploadResponse {
            job_id: Some(job.id),
            status,
        }));
    }

    let job_id = match state.queue.enqueue(&NewJob::from_document(&document)).await {
        Ok(id) => id,
        // Lost a race with a concurrent CompleteUpload; surface the job
        // that won.
        Err(QueueError::DuplicateJob(_)) => state
            .queue
            .find_live_job(document_id)
            .await?
            .map(|j| j.id)
            .ok_or_else(|| ApiError::internal("live job vanished during enqueue"))?,
        Err(e) => return Err(e.into()),
    };

    info!("Queued job {} for document {}", job_id, document_id);

    Ok(Json(CompleteUploadResponse {
        job_id: Some(job_id),
        status: DocumentStatus::Pending,
    }))
}

fn status_response(document: &VaultDocument) -> Result<DocumentStatusResponse, ApiError> {
    let status = document
        .status()
        .ok_or_else(|| ApiError::internal("document record has an unknown status"))?;

    let redaction_stats = document.redaction_map().map(|map| RedactionStatsResponse {
        redaction_count: map.total(),
        redactions_by_type: map.by_category,
    });

    Ok(DocumentStatusResponse {
        id: document.id,
        filename: document.filename.clone(),
        status,
        processing_error: document.processing_error.clone(),
        pii_redacted: document.pii_redacted,
        tags: document.tags.clone(),
        redaction_stats,
        created_at: document.created_at,
        updated_at: document.updated_at,
    })
}

#[utoipa::path(
    get,
    path = "/api/vault/documents/{id}",
    tag = "vault",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document status", body = DocumentStatusResponse),
        (status = 404, description = "Document not found or not owned by the caller"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentStatusResponse>, ApiError> {
    let document = state
        .db
        .get_document(document_id, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(status_response(&document)?))
}

/// Owner-initiated retry of a terminally failed document. The payload
/// snapshot is re-read from the record, never recycled from the failed
/// job.
#[utoipa::path(
    post,
    path = "/api/vault/documents/{id}/reprocess",
    tag = "vault",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Reprocessing queued", body = CompleteUploadResponse),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Document is not in the failed state"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Queue backend unavailable")
    )
)]
pub async fn reprocess(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<CompleteUploadResponse>, ApiError> {
    let document = state
        .db
        .get_document(document_id, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let status = document
        .status()
        .ok_or_else(|| ApiError::internal("document record has an unknown status"))?;

    if status != DocumentStatus::Failed {
        return Err(ApiError::invalid_state(format!(
            "cannot reprocess a document in the {status} state"
        )));
    }

    let reset = state
        .db
        .reset_for_reprocess(document_id, auth_user.user_id)
        .await?;
    if !reset {
        // Raced with another reprocess call
        return Err(ApiError::invalid_state(
            "document left the failed state before reprocessing began",
        ));
    }

    // Fresh payload snapshot: size, mime and path may all have changed
    // since the failed attempt.
    let document = state
        .db
        .get_document(document_id, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let job_id = state.queue.enqueue(&NewJob::from_document(&document)).await?;

    info!(
        "Reprocess queued job {} for document {}",
        job_id, document_id
    );

    Ok(Json(CompleteUploadResponse {
        job_id: Some(job_id),
        status: DocumentStatus::Pending,
    }))
}
