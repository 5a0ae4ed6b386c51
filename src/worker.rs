//! Publish worker: synthesize, encode, publish with a deadline, repeat.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use crate::event::EventSynthesizer;
use crate::metrics::stats::Stats;
use crate::payload::PayloadEncoder;
use crate::rate::RateController;
use crate::topic::Topic;
use crate::transport::TransportError;

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Hard deadline for one publish, covering batching and transport.
    pub publish_timeout: Duration,
    /// Messages per second; `None` runs unthrottled.
    pub rate: Option<f64>,
    /// Stop after this many iterations; `None` runs until cancelled.
    pub max_iterations: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            rate: None,
            max_iterations: None,
        }
    }
}

pub struct PublishWorker {
    id: usize,
    topic: Arc<Topic>,
    synthesizer: EventSynthesizer,
    encoder: PayloadEncoder,
    stats: Arc<Stats>,
    config: WorkerConfig,
    token: CancellationToken,
    rng: StdRng,
}

impl PublishWorker {
    pub fn new(
        id: usize,
        topic: Arc<Topic>,
        synthesizer: EventSynthesizer,
        encoder: PayloadEncoder,
        stats: Arc<Stats>,
        config: WorkerConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            topic,
            synthesizer,
            encoder,
            stats,
            config,
            token,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replace the OS-seeded RNG with a deterministic one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Loop until cancelled or the iteration cap is hit. Publish failures are
    /// counted and logged, never retried. Returns the number of iterations.
    ///
    /// The only error is an event that fails to serialize, which callers must
    /// treat as fatal.
    pub async fn run(mut self) -> Result<u64> {
        let mut pacer = self.config.rate.and_then(RateController::new);
        let mut iterations = 0u64;
        tracing::info!(worker = self.id, topic = self.topic.name(), "worker started");

        while !self.token.is_cancelled() {
            if self.config.max_iterations.is_some_and(|max| iterations >= max) {
                break;
            }
            if let Some(p) = pacer.as_mut() {
                p.wait_for_next().await;
            }
            self.publish_once().await?;
            iterations += 1;
        }

        tracing::info!(worker = self.id, iterations, "worker stopped");
        Ok(iterations)
    }

    async fn publish_once(&mut self) -> Result<()> {
        let event = self.synthesizer.synthesize(&mut self.rng);
        let payload = self
            .encoder
            .encode(&mut self.rng, &event)
            .with_context(|| format!("worker {}: event serialization failed", self.id))?;
        if payload.is_malformed() {
            self.stats.record_malformed();
            tracing::debug!(worker = self.id, "publishing malformed payload");
        }

        let started = Instant::now();
        let pending = self.topic.publish(payload.into_bytes());
        let outcome = timeout(self.config.publish_timeout, pending.get())
            .await
            .unwrap_or(Err(TransportError::Timeout));

        match outcome {
            Ok(()) => self.stats.record_published(started.elapsed()).await,
            Err(e) => {
                self.stats.record_failure(&e);
                tracing::warn!(worker = self.id, error = %e, "publish failed");
            }
        }
        Ok(())
    }
}
