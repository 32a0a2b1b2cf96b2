use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use casevault::{
    config::Config, db::Database, health::HealthReporter, queue::QueueService,
    storage::LocalStorage, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    info!("Running schema migration");
    db.migrate().await?;

    let storage = LocalStorage::new(config.upload_path.clone());
    storage.initialize_directory_structure().await?;

    let queue = QueueService::new(
        db.get_pool().clone(),
        config.queue_max_attempts,
        config.queue_retry_delay_secs,
    );

    let reporter = Arc::new(HealthReporter::new(
        vec![queue.clone()],
        config.failed_alert_threshold,
        config.backlog_alert_threshold,
    ));

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        queue,
        storage: Arc::new(storage),
        reporter,
    });

    let app = Router::new()
        .route("/api/health", get(casevault::health_check))
        .nest("/api/vault", casevault::routes::vault::router())
        .nest("/api/queue", casevault::routes::queue::router())
        .merge(casevault::swagger::create_swagger_router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("Server starting on {}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}
