//! Supervised worker launch: spawn the worker process and keep it alive
//! through the full supervisor state machine - bounded crash restarts
//! with a delay, memory sampling on a health tick, signal forwarding
//! and a force-kill grace period.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::error;

use casevault::config::Config;
use casevault::supervisor::{
    default_worker_command, Supervisor, SupervisorConfig, SupervisorError,
};

#[derive(Parser)]
#[command(about = "Run a vault worker under the process supervisor")]
struct Args {
    /// Path to the worker executable (defaults to the sibling `worker`
    /// binary, or $WORKER_BIN)
    #[arg(long)]
    worker_bin: Option<PathBuf>,

    /// Restart budget before giving up (defaults to MAX_RESTARTS)
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Seconds to wait between restarts (defaults to RESTART_DELAY_SECS)
    #[arg(long)]
    restart_delay_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let log_file = std::env::var("WORKER_LOG_FILE").ok().map(PathBuf::from);

    let supervisor_config = SupervisorConfig {
        worker_command: args.worker_bin.unwrap_or_else(default_worker_command),
        worker_args: Vec::new(),
        max_restarts: args.max_restarts.unwrap_or(config.max_restarts),
        restart_delay: Duration::from_secs(
            args.restart_delay_secs.unwrap_or(config.restart_delay_secs),
        ),
        shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        health_tick: Duration::from_secs(config.health_tick_secs),
        memory_warn_threshold_mb: config.memory_warn_threshold_mb,
        log_file,
    };

    let mut supervisor = Supervisor::new(supervisor_config);
    match supervisor.run().await {
        Ok(()) => Ok(()),
        Err(e @ SupervisorError::RestartsExhausted(_)) => {
            error!("Supervisor giving up: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Supervisor failed: {}", e);
            std::process::exit(1);
        }
    }
}
