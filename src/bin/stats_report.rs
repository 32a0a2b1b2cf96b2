//! One-shot or watch-mode report of queue health, per-queue counters
//! and the derived operator recommendations.

use clap::Parser;
use tokio::time::{interval, Duration};

use casevault::{config::Config, db::Database, health::HealthReporter, queue::QueueService};

#[derive(Parser)]
#[command(about = "Report vault queue health and statistics")]
struct Args {
    /// Keep printing the report on a fixed interval
    #[arg(long)]
    watch: bool,

    /// Seconds between reports in watch mode
    #[arg(long, default_value_t = 30)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;

    let queue = QueueService::new(
        db.get_pool().clone(),
        config.queue_max_attempts,
        config.queue_retry_delay_secs,
    );

    let reporter = HealthReporter::new(
        vec![queue],
        config.failed_alert_threshold,
        config.backlog_alert_threshold,
    );

    if args.watch {
        let mut ticker = interval(Duration::from_secs(args.interval_secs.max(1)));
        loop {
            ticker.tick().await;
            print_report(&reporter).await;
        }
    } else {
        print_report(&reporter).await;
    }

    Ok(())
}

async fn print_report(reporter: &HealthReporter) {
    let health = reporter.check_health().await;

    println!("Queue backend reachable: {}", health.backend_reachable);
    for (name, healthy) in &health.queues {
        println!("  {} healthy: {}", name, healthy);
    }

    for (name, result) in reporter.collect_stats().await {
        match result {
            Ok(stats) => {
                println!("Queue '{}':", name);
                println!("  waiting:   {}", stats.waiting_count);
                println!("  active:    {}", stats.active_count);
                println!("  delayed:   {}", stats.delayed_count);
                println!("  completed: {}", stats.completed_count);
                println!("  failed:    {}", stats.failed_count);
                println!("  total:     {}", stats.total());
                if let Some(minutes) = stats.oldest_waiting_minutes {
                    println!("  oldest waiting: {:.1} min", minutes);
                }

                for recommendation in reporter.recommendations(&stats) {
                    println!("  ! {}", recommendation);
                }
            }
            Err(e) => {
                println!("Queue '{}': stats unavailable ({})", name, e);
            }
        }
    }
}
