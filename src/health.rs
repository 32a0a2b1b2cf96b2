use std::collections::BTreeMap;

use tracing::warn;

use crate::models::{QueueHealthResponse, QueueStats};
use crate::queue::{QueueError, QueueService};

/// Read-only reporting over the registered queues. One broken queue
/// never blanks out the others; backend-level unreachability marks every
/// queue unhealthy.
pub struct HealthReporter {
    queues: Vec<QueueService>,
    failed_alert_threshold: i64,
    backlog_alert_threshold: i64,
}

impl HealthReporter {
    pub fn new(
        queues: Vec<QueueService>,
        failed_alert_threshold: i64,
        backlog_alert_threshold: i64,
    ) -> Self {
        Self {
            queues,
            failed_alert_threshold,
            backlog_alert_threshold,
        }
    }

    pub async fn check_health(&self) -> QueueHealthResponse {
        let mut backend_reachable = true;
        let mut queues = BTreeMap::new();

        for queue in &self.queues {
            let healthy = match queue.probe().await {
                Ok(()) => true,
                Err(QueueError::BackendUnavailable(msg)) => {
                    warn!("Queue backend unreachable: {}", msg);
                    backend_reachable = false;
                    false
                }
                Err(e) => {
                    warn!("Queue {} probe failed: {}", queue.name(), e);
                    false
                }
            };
            queues.insert(queue.name().to_string(), healthy);
        }

        if !backend_reachable {
            for healthy in queues.values_mut() {
                *healthy = false;
            }
        }

        QueueHealthResponse {
            backend_reachable,
            queues,
        }
    }

    /// Per-queue stats; each queue's error is captured individually.
    pub async fn collect_stats(&self) -> BTreeMap<String, Result<QueueStats, QueueError>> {
        let mut stats = BTreeMap::new();
        for queue in &self.queues {
            stats.insert(queue.name().to_string(), queue.stats().await);
        }
        stats
    }

    /// Operator-facing heuristics derived from one queue's counters.
    /// Informational only; nothing acts on these automatically.
    pub fn recommendations(&self, stats: &QueueStats) -> Vec<String> {
        let mut recommendations = Vec::new();

        if stats.failed_count >= self.failed_alert_threshold {
            recommendations.push(format!(
                "High failure rate: {} failed jobs - inspect recent processing errors",
                stats.failed_count
            ));
        }

        if stats.waiting_count >= self.backlog_alert_threshold {
            recommendations.push(format!(
                "Large backlog: {} waiting jobs - consider adding workers",
                stats.waiting_count
            ));
        }

        if stats.waiting_count > 0 && stats.active_count == 0 {
            recommendations.push(
                "No active workers: jobs are waiting but none are being processed".to_string(),
            );
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> HealthReporter {
        HealthReporter::new(Vec::new(), 10, 100)
    }

    #[test]
    fn quiet_queue_yields_no_recommendations() {
        let stats = QueueStats {
            completed_count: 42,
            ..Default::default()
        };
        assert!(reporter().recommendations(&stats).is_empty());
    }

    #[test]
    fn failed_count_at_threshold_flags_failure_rate() {
        let stats = QueueStats {
            failed_count: 10,
            ..Default::default()
        };
        let recs = reporter().recommendations(&stats);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("High failure rate"));
    }

    #[test]
    fn backlog_at_threshold_flags_backlog_and_starvation() {
        let stats = QueueStats {
            waiting_count: 100,
            active_count: 0,
            ..Default::default()
        };
        let recs = reporter().recommendations(&stats);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("Large backlog"));
        assert!(recs[1].contains("No active workers"));
    }

    #[test]
    fn waiting_jobs_with_active_workers_is_not_starvation() {
        let stats = QueueStats {
            waiting_count: 5,
            active_count: 2,
            ..Default::default()
        };
        assert!(reporter().recommendations(&stats).is_empty());
    }

    #[test]
    fn starvation_signal_needs_at_least_one_waiting_job() {
        let stats = QueueStats {
            waiting_count: 1,
            active_count: 0,
            ..Default::default()
        };
        let recs = reporter().recommendations(&stats);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("No active workers"));
    }
}
