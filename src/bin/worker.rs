use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

use casevault::{
    config::Config,
    db::Database,
    processing::PatternRedactionEngine,
    queue::QueueService,
    storage::LocalStorage,
    worker::{run_maintenance, Worker},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let restart_count = std::env::var("WORKER_RESTART_COUNT").unwrap_or_default();
    if !restart_count.is_empty() && restart_count != "0" {
        info!("Worker restarted by supervisor (restart count {})", restart_count);
    }

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;

    let storage = LocalStorage::new(config.upload_path.clone());
    storage.initialize_directory_structure().await?;

    let queue = QueueService::new(
        db.get_pool().clone(),
        config.queue_max_attempts,
        config.queue_retry_delay_secs,
    );

    tokio::spawn(run_maintenance(
        queue.clone(),
        config.stale_job_minutes,
        config.completed_retention_days,
    ));

    let worker = Arc::new(Worker::new(
        db,
        queue,
        Arc::new(storage),
        Arc::new(PatternRedactionEngine::new()),
        config.worker_poll_interval_secs,
        config.worker_concurrency,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("sigint handler");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await?;

    Ok(())
}
