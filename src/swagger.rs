use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CompleteUploadResponse, DocumentStatus, DocumentStatusResponse, ExtractedEvent,
        PiiCategory, QueueHealthResponse, QueueStats, QueueStatsResponse, RedactionMap,
        RedactionStatsResponse, RequestUploadBody, RequestUploadResponse,
    },
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::vault::request_upload,
        crate::routes::vault::complete_upload,
        crate::routes::vault::get_status,
        crate::routes::vault::reprocess,
        crate::routes::queue::get_queue_stats,
    ),
    components(
        schemas(
            RequestUploadBody, RequestUploadResponse, CompleteUploadResponse,
            DocumentStatusResponse, RedactionStatsResponse, DocumentStatus,
            PiiCategory, RedactionMap, ExtractedEvent, QueueStats,
            QueueHealthResponse, QueueStatsResponse
        )
    ),
    tags(
        (name = "vault", description = "Vault document upload and processing endpoints"),
        (name = "queue", description = "Processing queue health and stats endpoints"),
    ),
    info(
        title = "Casevault API",
        version = "0.4.1",
        description = "Case document vault with asynchronous PII redaction"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
pub struct ApiDoc;

pub fn create_swagger_router() -> Router<Arc<AppState>> {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
