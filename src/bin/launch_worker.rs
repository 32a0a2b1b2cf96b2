//! Launch one worker process, forward termination signals into it, and
//! exit with the child's exit code. The supervised variant with restart
//! handling lives in `supervise_worker`.

use std::path::PathBuf;

use clap::Parser;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use casevault::supervisor::default_worker_command;

#[derive(Parser)]
#[command(about = "Launch a single vault worker process")]
struct Args {
    /// Path to the worker executable (defaults to the sibling `worker`
    /// binary, or $WORKER_BIN)
    #[arg(long)]
    worker_bin: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let worker_bin = args.worker_bin.unwrap_or_else(default_worker_command);

    let mut child = Command::new(&worker_bin).spawn().map_err(|e| {
        error!("Could not spawn worker {:?}: {}", worker_bin, e);
        e
    })?;
    info!("Worker process started (pid {:?})", child.id());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = sigterm.recv() => forward_signal(&child, libc::SIGTERM),
            _ = sigint.recv() => forward_signal(&child, libc::SIGINT),
        }
    };

    info!("Worker exited: {}", status);
    std::process::exit(status.code().unwrap_or(1));
}

fn forward_signal(child: &tokio::process::Child, sig: i32) {
    if let Some(pid) = child.id() {
        info!("Forwarding signal {} to worker (pid {})", sig, pid);
        unsafe {
            libc::kill(pid as i32, sig);
        }
    }
}
