use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use mq_faker::clock::SimClock;
use mq_faker::config::{self, SupervisorConfig};
use mq_faker::logging;
use mq_faker::supervisor::Supervisor;
use mq_faker::topic::PublishSettings;
use mq_faker::transport::TransportBuilder;
use mq_faker::transport::config::{parse_connect_kv, parse_engine};
use mq_faker::worker::WorkerConfig;

#[derive(Parser)]
#[command(name = "mq-faker")]
#[command(about = "Publishes fabricated user-activity events to a message queue topic")]
struct Cli {
    /// Log level (EnvFilter directive)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Transport engine (mock, mqtt)
    #[arg(long, default_value = "mock")]
    engine: String,

    /// Transport connect options as KEY=VALUE (repeatable)
    #[arg(long = "connect")]
    connect: Vec<String>,

    /// Project identifier passed to the transport
    #[arg(long, default_value = config::DEFAULT_PROJECT)]
    project: String,

    /// Destination topic, created when absent
    #[arg(long, default_value = config::DEFAULT_TOPIC)]
    topic: String,

    /// Number of publish workers
    #[arg(long, default_value_t = config::DEFAULT_WORKERS)]
    workers: usize,

    /// Batch delay threshold (ms)
    #[arg(long, default_value_t = config::DEFAULT_DELAY_THRESHOLD.as_millis() as u64)]
    delay_threshold_ms: u64,

    /// Batch count threshold
    #[arg(long, default_value_t = config::DEFAULT_COUNT_THRESHOLD)]
    count_threshold: usize,

    /// Deadline per publish (ms)
    #[arg(long, default_value_t = mq_faker::worker::DEFAULT_PUBLISH_TIMEOUT.as_millis() as u64)]
    publish_timeout_ms: u64,

    /// Rate per worker (msg/s). If omitted or <= 0, runs at max speed (no delay)
    #[arg(long, allow_hyphen_values = true)]
    rate: Option<f64>,

    /// One malformed payload per this many messages (0 disables)
    #[arg(long, default_value_t = mq_faker::payload::DEFAULT_FAULT_ODDS)]
    fault_odds: u32,

    /// Snapshot interval in seconds for periodic stats output
    #[arg(long, default_value_t = config::DEFAULT_SNAPSHOT_INTERVAL.as_secs())]
    snapshot_interval: u64,

    /// On ctrl+c, stop workers between iterations and wait for in-flight publishes
    #[arg(long)]
    graceful: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let engine = parse_engine(&cli.engine).ok_or_else(|| anyhow!("unknown engine: {}", cli.engine))?;
    let mut opts = parse_connect_kv(&cli.connect);
    opts.params
        .entry("project".into())
        .or_insert_with(|| cli.project.clone());

    tracing::info!(engine = ?engine, project = %cli.project, "connecting to message queue");
    let transport = TransportBuilder::connect(engine, opts)
        .await
        .context("error connecting to message queue")?;
    transport
        .health_check()
        .await
        .context("message queue health check failed")?;
    let transport: Arc<dyn mq_faker::transport::Transport> = Arc::from(transport);

    let clock_token = CancellationToken::new();
    let (clock, clock_handle) = SimClock::start(clock_token.clone());

    let cfg = SupervisorConfig {
        topic: cli.topic,
        workers: cli.workers,
        publish_settings: PublishSettings {
            delay_threshold: Duration::from_millis(cli.delay_threshold_ms),
            count_threshold: cli.count_threshold,
        },
        worker: WorkerConfig {
            publish_timeout: Duration::from_millis(cli.publish_timeout_ms),
            rate: cli.rate.filter(|r| *r > 0.0),
            max_iterations: None,
        },
        fault_odds: cli.fault_odds,
        snapshot_interval: Duration::from_secs(cli.snapshot_interval),
        graceful: cli.graceful,
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };
    let result = Supervisor::new(transport.clone(), clock, cfg).run(shutdown).await;

    clock_token.cancel();
    clock_handle.abort();
    if let Err(e) = transport.shutdown().await {
        tracing::warn!(error = %e, "transport shutdown error");
    }
    if let Err(e) = &result {
        tracing::error!(error = ?e, "fatal error");
    }
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_config_constants() {
        let cli = Cli::try_parse_from(["mq-faker"]).unwrap();
        assert_eq!(
            Duration::from_millis(cli.delay_threshold_ms),
            config::DEFAULT_DELAY_THRESHOLD
        );
        assert_eq!(
            Duration::from_millis(cli.publish_timeout_ms),
            mq_faker::worker::DEFAULT_PUBLISH_TIMEOUT
        );
        assert_eq!(
            Duration::from_secs(cli.snapshot_interval),
            config::DEFAULT_SNAPSHOT_INTERVAL
        );
        assert_eq!(cli.workers, config::DEFAULT_WORKERS);
        assert_eq!(cli.topic, config::DEFAULT_TOPIC);
    }
}
