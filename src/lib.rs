pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod health;
pub mod models;
pub mod processing;
pub mod queue;
pub mod routes;
pub mod storage;
pub mod supervisor;
pub mod swagger;
pub mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{http::StatusCode, Json};

use config::Config;
use db::Database;
use health::HealthReporter;
use queue::QueueService;
use storage::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub queue: QueueService,
    pub storage: Arc<dyn StorageService>,
    pub reporter: Arc<HealthReporter>,
}

/// Health check endpoint for monitoring
pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({"status": "ok"})))
}
