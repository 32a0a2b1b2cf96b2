use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use sysinfo::System;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, sleep, timeout};
use tracing::{error, info, warn};

/// Resolve the worker executable: explicit env override first, then the
/// `worker` binary sitting next to the current executable.
pub fn default_worker_command() -> PathBuf {
    if let Ok(path) = std::env::var("WORKER_BIN") {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("worker")))
        .unwrap_or_else(|| PathBuf::from("worker"))
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(std::io::Error),

    #[error("signal handler registration failed: {0}")]
    Signal(std::io::Error),

    #[error("worker restart limit reached after {0} restarts")]
    RestartsExhausted(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Restarting,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable to spawn
    pub worker_command: PathBuf,
    pub worker_args: Vec<String>,
    pub max_restarts: u32,
    pub restart_delay: Duration,
    /// How long a signalled worker gets before it is force-killed
    pub shutdown_grace: Duration,
    pub health_tick: Duration,
    pub memory_warn_threshold_mb: u64,
    /// Append-mode log sink for the worker's stdio; inherits ours when
    /// unset
    pub log_file: Option<PathBuf>,
}

/// Owns the worker's operating-system process: spawns it, restarts it
/// on crash with bounded attempts, samples memory on a fixed tick,
/// forwards termination signals, force-kills on grace expiry.
pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    restarts: u32,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: SupervisorState::Starting,
            restarts: 0,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    fn spawn_worker(&self) -> Result<Child, SupervisorError> {
        let mut command = Command::new(&self.config.worker_command);
        command
            .args(&self.config.worker_args)
            .env("WORKER_RESTART_COUNT", self.restarts.to_string());

        if let Some(log_path) = &self.config.log_file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(SupervisorError::SpawnFailed)?;
            let stderr = file.try_clone().map_err(SupervisorError::SpawnFailed)?;
            command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
        }

        command.spawn().map_err(SupervisorError::SpawnFailed)
    }

    /// Charge one restart against the budget. False means the budget is
    /// spent and the supervisor must stop.
    fn note_restart(&mut self) -> bool {
        if self.restarts >= self.config.max_restarts {
            return false;
        }
        self.restarts += 1;
        true
    }

    /// Run the full state machine until the worker exits cleanly, the
    /// restart budget is exhausted, or a termination signal arrives.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        let mut sigterm =
            signal(SignalKind::terminate()).map_err(SupervisorError::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(SupervisorError::Signal)?;
        let mut health = interval(self.config.health_tick);
        // First tick fires immediately; skip it so the sample cadence is
        // one per tick interval.
        health.reset();
        let mut sys = System::new();

        loop {
            self.state = if self.restarts == 0 {
                SupervisorState::Starting
            } else {
                SupervisorState::Restarting
            };

            let mut child = match self.spawn_worker() {
                Ok(child) => child,
                Err(e) => {
                    error!("Could not spawn worker process: {}", e);
                    if !self.note_restart() {
                        self.state = SupervisorState::Stopped;
                        return Err(SupervisorError::RestartsExhausted(self.config.max_restarts));
                    }
                    sleep(self.config.restart_delay).await;
                    continue;
                }
            };

            self.state = SupervisorState::Running;
            info!(
                "Worker process started (pid {:?}, restart count {})",
                child.id(),
                self.restarts
            );

            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    _ = sigterm.recv() => {
                        return self.shutdown_child(child, libc::SIGTERM).await;
                    }
                    _ = sigint.recv() => {
                        return self.shutdown_child(child, libc::SIGINT).await;
                    }
                    _ = health.tick() => self.sample_memory(&mut sys),
                }
            };

            match status {
                Ok(status) if status.success() => {
                    info!("Worker exited cleanly, not restarting");
                    self.state = SupervisorState::Stopped;
                    return Ok(());
                }
                Ok(status) => {
                    warn!("Worker exited abnormally: {}", status);
                }
                Err(e) => {
                    error!("Failed waiting on worker process: {}", e);
                }
            }

            if !self.note_restart() {
                self.state = SupervisorState::Stopped;
                return Err(SupervisorError::RestartsExhausted(self.config.max_restarts));
            }

            info!(
                "Restarting worker in {:?} (restart {}/{})",
                self.config.restart_delay, self.restarts, self.config.max_restarts
            );
            sleep(self.config.restart_delay).await;
        }
    }

    /// Forward the termination signal to the worker, give it the grace
    /// period, then force-kill.
    async fn shutdown_child(
        &mut self,
        mut child: Child,
        sig: i32,
    ) -> Result<(), SupervisorError> {
        if let Some(pid) = child.id() {
            info!("Forwarding signal {} to worker (pid {})", sig, pid);
            unsafe {
                libc::kill(pid as i32, sig);
            }
        }

        match timeout(self.config.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!("Worker exited within grace period: {}", status);
            }
            Ok(Err(e)) => {
                error!("Failed waiting for signalled worker: {}", e);
            }
            Err(_) => {
                warn!(
                    "Worker did not exit within {:?}, force killing",
                    self.config.shutdown_grace
                );
                if let Err(e) = child.kill().await {
                    error!("Failed to kill worker process: {}", e);
                }
            }
        }

        self.state = SupervisorState::Stopped;
        Ok(())
    }

    /// Observability only: a hot supervisor is logged, never killed.
    fn sample_memory(&self, sys: &mut System) {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return;
        };
        sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        if let Some(process) = sys.process(pid) {
            let used_mb = process.memory() / (1024 * 1024);
            if used_mb > self.config.memory_warn_threshold_mb {
                warn!(
                    "Supervisor memory usage {} MB exceeds threshold {} MB",
                    used_mb, self.config.memory_warn_threshold_mb
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(command: &str, args: &[&str]) -> SupervisorConfig {
        SupervisorConfig {
            worker_command: PathBuf::from(command),
            worker_args: args.iter().map(|s| s.to_string()).collect(),
            max_restarts: 5,
            restart_delay: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(500),
            health_tick: Duration::from_secs(3600),
            memory_warn_threshold_mb: 4096,
            log_file: None,
        }
    }

    #[tokio::test]
    async fn clean_exit_stops_without_restarting() {
        let mut supervisor = Supervisor::new(test_config("/bin/sh", &["-c", "exit 0"]));
        let result = supervisor.run().await;

        assert!(result.is_ok());
        assert_eq!(supervisor.restarts(), 0);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn crashing_worker_exhausts_exactly_max_restarts() {
        let mut supervisor = Supervisor::new(test_config("/bin/sh", &["-c", "exit 1"]));
        let result = supervisor.run().await;

        assert!(matches!(
            result,
            Err(SupervisorError::RestartsExhausted(5))
        ));
        assert_eq!(supervisor.restarts(), 5);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn unspawnable_worker_exhausts_restart_budget() {
        let mut supervisor = Supervisor::new(test_config(
            "/nonexistent/casevault-worker-binary",
            &[],
        ));
        let result = supervisor.run().await;

        assert!(matches!(
            result,
            Err(SupervisorError::RestartsExhausted(5))
        ));
        assert_eq!(supervisor.restarts(), 5);
    }

    #[tokio::test]
    async fn restart_counter_is_exported_to_child() {
        // The first spawn sees a zero restart count; a respawned child
        // sees how many restarts preceded it.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("restart_counts");
        let script = format!(
            "echo $WORKER_RESTART_COUNT >> {}; exit 1",
            marker.display()
        );
        let mut config = test_config("/bin/sh", &["-c", &script]);
        config.max_restarts = 2;

        let mut supervisor = Supervisor::new(config);
        let _ = supervisor.run().await;

        let recorded = std::fs::read_to_string(&marker).unwrap();
        let counts: Vec<&str> = recorded.lines().collect();
        assert_eq!(counts, vec!["0", "1", "2"]);
    }
}
