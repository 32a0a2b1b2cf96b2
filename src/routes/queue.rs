use axum::{extract::State, response::Json, routing::get, Router};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::{
    auth::AuthUser,
    models::QueueStatsResponse,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_queue_stats))
}

/// Queue health for every authenticated caller; the per-queue counter
/// block is admin-only.
#[utoipa::path(
    get,
    path = "/api/queue/stats",
    tag = "queue",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Queue health and, for admins, per-queue stats", body = QueueStatsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_queue_stats(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Json<QueueStatsResponse> {
    let health = state.reporter.check_health().await;

    let stats = if auth_user.is_admin() {
        let mut per_queue = BTreeMap::new();
        for (name, result) in state.reporter.collect_stats().await {
            match result {
                Ok(stats) => {
                    per_queue.insert(name, stats);
                }
                Err(e) => {
                    warn!("Could not collect stats for queue {}: {}", name, e);
                }
            }
        }
        Some(per_queue)
    } else {
        None
    };

    Json(QueueStatsResponse { health, stats })
}
