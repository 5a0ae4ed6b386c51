//! Worker pool supervisor: topic setup, worker lifecycle, shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::clock::SimClock;
use crate::config::SupervisorConfig;
use crate::event::{EventCatalog, EventSynthesizer};
use crate::metrics::stats::{Stats, StatsSnapshot};
use crate::payload::PayloadEncoder;
use crate::topic::Topic;
use crate::transport::Transport;
use crate::worker::PublishWorker;

const MIN_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Supervisor {
    transport: Arc<dyn Transport>,
    clock: SimClock,
    catalog: EventCatalog,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(transport: Arc<dyn Transport>, clock: SimClock, config: SupervisorConfig) -> Self {
        Self {
            transport,
            clock,
            catalog: EventCatalog::default(),
            config,
        }
    }

    /// Resolve the topic, start the workers and block until `shutdown`
    /// completes. Topic resolution failures and worker serialization failures
    /// are fatal.
    ///
    /// Unless `graceful` is set, workers are detached rather than joined:
    /// their in-flight publish may still be running when this returns.
    pub async fn run<F>(self, shutdown: F) -> Result<StatsSnapshot>
    where
        F: Future<Output = ()>,
    {
        let cfg = &self.config;
        let mut topic = Topic::resolve(self.transport.as_ref(), &cfg.topic)
            .await
            .with_context(|| format!("failed to resolve topic {}", cfg.topic))?;
        topic.publish_settings = cfg.publish_settings;
        let topic = Arc::new(topic);

        let stats = Arc::new(Stats::new()?);
        let token = CancellationToken::new();
        let synthesizer = EventSynthesizer::new(self.catalog.clone(), self.clock.clone());
        let encoder = PayloadEncoder::new(cfg.fault_odds);

        let mut workers = JoinSet::new();
        for i in 0..cfg.workers {
            tracing::info!(worker = i, "starting worker");
            let worker = PublishWorker::new(
                i,
                topic.clone(),
                synthesizer.clone(),
                encoder,
                stats.clone(),
                cfg.worker.clone(),
                token.child_token(),
            );
            workers.spawn(worker.run());
        }

        let reporter = spawn_reporter(stats.clone(), cfg.snapshot_interval);

        tracing::info!(topic = topic.name(), "producing events, ctrl+c to exit...");
        tokio::pin!(shutdown);
        let fatal = loop {
            tokio::select! {
                _ = &mut shutdown => break None,
                Some(res) = workers.join_next() => match res {
                    Ok(Ok(n)) => tracing::debug!(iterations = n, "worker finished"),
                    Ok(Err(e)) => break Some(e.context("publish worker failed")),
                    Err(e) => break Some(anyhow!("publish worker panicked: {}", e)),
                },
            }
        };
        reporter.abort();

        if let Some(e) = fatal {
            token.cancel();
            return Err(e);
        }

        tracing::info!("exiting");
        if cfg.graceful {
            token.cancel();
            let drain = cfg.worker.publish_timeout + cfg.publish_settings.delay_threshold;
            let joined = tokio::time::timeout(drain, async {
                while let Some(res) = workers.join_next().await {
                    if let Ok(Err(e)) = res {
                        tracing::error!(error = %e, "worker failed during shutdown");
                    }
                }
            })
            .await;
            if joined.is_err() {
                tracing::warn!("workers did not stop in time, abandoning them");
            }
            if let Err(e) = topic.shutdown().await {
                tracing::warn!(error = %e, "topic shutdown failed");
            }
        } else {
            workers.detach_all();
        }

        let snapshot = stats.snapshot().await;
        snapshot.log("final publish stats");
        Ok(snapshot)
    }
}

/// Log a stats snapshot every `period`, clamped to at least one second.
fn spawn_reporter(stats: Arc<Stats>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_SNAPSHOT_INTERVAL);
    tokio::spawn(async move {
        let mut t = interval(period);
        t.tick().await;
        loop {
            t.tick().await;
            stats.snapshot().await.log("publish stats");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn quick_config() -> SupervisorConfig {
        let mut cfg = SupervisorConfig::default();
        cfg.publish_settings.delay_threshold = Duration::from_millis(10);
        cfg
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_returns_control() {
        let transport = Arc::new(MockTransport::new());
        let sup = Supervisor::new(transport.clone(), SimClock::frozen_at(0), quick_config());

        let snap = sup
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(snap.published > 0);
        assert!(transport.topic_exists("pd-demo").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_stops_workers() {
        let transport = Arc::new(MockTransport::new());
        let mut cfg = quick_config();
        cfg.graceful = true;
        let sup = Supervisor::new(transport.clone(), SimClock::frozen_at(0), cfg);
        sup.run(tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();

        let count = transport.published("pd-demo").await.len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.published("pd-demo").await.len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_snapshot_interval_is_clamped() {
        let reporter = spawn_reporter(Arc::new(Stats::new().unwrap()), Duration::ZERO);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!reporter.is_finished());
        reporter.abort();
    }

    #[tokio::test]
    async fn topic_admin_failure_is_fatal() {
        let transport = Arc::new(MockTransport::new());
        transport.set_fail_admin(true);
        let sup = Supervisor::new(transport, SimClock::frozen_at(0), quick_config());
        let err = sup.run(std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("pd-demo"));
    }

    #[tokio::test(start_paused = true)]
    async fn capped_workers_leave_supervisor_waiting_for_signal() {
        let transport = Arc::new(MockTransport::new());
        let mut cfg = quick_config();
        cfg.worker.max_iterations = Some(3);
        let sup = Supervisor::new(transport.clone(), SimClock::frozen_at(0), cfg);
        let snap = sup
            .run(tokio::time::sleep(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(snap.published, 6);
        assert_eq!(transport.published("pd-demo").await.len(), 6);
    }
}
