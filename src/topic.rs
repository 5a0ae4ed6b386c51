//! Process-side topic handle. Publishes are buffered into batches that are
//! flushed when either the delay or the count threshold is reached; each
//! publish resolves once its batch has been handed to the transport.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::transport::{Publisher, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishSettings {
    /// Longest a message waits in the buffer before its batch is flushed.
    pub delay_threshold: Duration,
    /// Flush as soon as this many messages are buffered.
    pub count_threshold: usize,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            delay_threshold: Duration::from_millis(10),
            count_threshold: 100,
        }
    }
}

struct Pending {
    payload: Bytes,
    done: oneshot::Sender<Result<(), TransportError>>,
}

pub struct Topic {
    name: String,
    publisher: Arc<dyn Publisher>,
    /// Read when the batcher starts on the first publish; later changes are ignored.
    pub publish_settings: PublishSettings,
    batcher: OnceLock<flume::Sender<Pending>>,
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("publish_settings", &self.publish_settings)
            .finish()
    }
}

/// Outcome of a single [`Topic::publish`], available once its batch is flushed.
pub struct PublishResult {
    rx: oneshot::Receiver<Result<(), TransportError>>,
}

impl PublishResult {
    pub async fn get(self) -> Result<(), TransportError> {
        self.rx.await.map_err(|_| TransportError::Disconnected)?
    }
}

impl Topic {
    pub fn new(name: impl Into<String>, publisher: Box<dyn Publisher>) -> Self {
        Self {
            name: name.into(),
            publisher: Arc::from(publisher),
            publish_settings: PublishSettings::default(),
            batcher: OnceLock::new(),
        }
    }

    /// Look up `name`, creating it when absent, and open a publisher on it.
    pub async fn resolve(transport: &dyn Transport, name: &str) -> Result<Self, TransportError> {
        if transport.topic_exists(name).await? {
            tracing::info!(topic = name, "topic exists");
        } else {
            tracing::info!(topic = name, "creating topic");
            transport.create_topic(name).await?;
        }
        let publisher = transport.create_publisher(name).await?;
        Ok(Self::new(name, publisher))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `payload` for the next batch. Never blocks; await the returned
    /// [`PublishResult`] to learn the outcome.
    pub fn publish(&self, payload: Bytes) -> PublishResult {
        let (done, rx) = oneshot::channel();
        let sender = self.batcher.get_or_init(|| self.spawn_batcher());
        if let Err(flume::SendError(pending)) = sender.send(Pending { payload, done }) {
            let _ = pending.done.send(Err(TransportError::Disconnected));
        }
        PublishResult { rx }
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.publisher.shutdown().await
    }

    fn spawn_batcher(&self) -> flume::Sender<Pending> {
        let (tx, rx) = flume::unbounded();
        let publisher = self.publisher.clone();
        let settings = self.publish_settings;
        let name = self.name.clone();
        tracing::debug!(
            topic = %name,
            delay_ms = settings.delay_threshold.as_millis() as u64,
            count = settings.count_threshold,
            "starting publish batcher"
        );
        tokio::spawn(run_batcher(publisher, settings, rx, name));
        tx
    }
}

async fn run_batcher(
    publisher: Arc<dyn Publisher>,
    settings: PublishSettings,
    rx: flume::Receiver<Pending>,
    topic: String,
) {
    let max = settings.count_threshold.max(1);
    let mut batch: Vec<Pending> = Vec::with_capacity(max);
    while let Ok(first) = rx.recv_async().await {
        batch.push(first);
        let deadline = Instant::now() + settings.delay_threshold;
        while batch.len() < max {
            tokio::select! {
                item = rx.recv_async() => match item {
                    Ok(p) => batch.push(p),
                    Err(_) => break,
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
        tracing::trace!(topic = %topic, size = batch.len(), "flushing batch");
        for Pending { payload, mut done } in batch.drain(..) {
            // A dropped receiver means the caller's deadline already passed.
            if done.is_closed() {
                tracing::debug!(topic = %topic, "dropping publish abandoned before flush");
                continue;
            }
            let res = tokio::select! {
                res = publisher.publish(payload) => Some(res),
                _ = done.closed() => None,
            };
            match res {
                Some(res) => {
                    let _ = done.send(res);
                }
                None => tracing::debug!(topic = %topic, "publish abandoned mid-flight"),
            }
        }
    }
    tracing::debug!(topic = %topic, "publish batcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    async fn topic_on(t: &MockTransport, name: &str, settings: PublishSettings) -> Topic {
        let mut topic = Topic::resolve(t, name).await.unwrap();
        topic.publish_settings = settings;
        topic
    }

    #[tokio::test]
    async fn resolve_creates_missing_topic() {
        let t = MockTransport::new();
        let topic = Topic::resolve(&t, "pd-demo").await.unwrap();
        assert_eq!(topic.name(), "pd-demo");
        assert!(t.topic_exists("pd-demo").await.unwrap());
    }

    #[tokio::test]
    async fn resolve_reuses_existing_topic() {
        let t = MockTransport::new();
        t.create_topic("pd-demo").await.unwrap();
        // create_topic on the mock errors for duplicates, so this proves no second create.
        Topic::resolve(&t, "pd-demo").await.unwrap();
    }

    #[tokio::test]
    async fn resolve_propagates_admin_failure() {
        let t = MockTransport::new();
        t.set_fail_admin(true);
        assert!(Topic::resolve(&t, "pd-demo").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn publish_resolves_after_delay_threshold() {
        let t = MockTransport::new();
        let settings = PublishSettings {
            delay_threshold: Duration::from_secs(1),
            count_threshold: 100,
        };
        let topic = topic_on(&t, "k", settings).await;

        let start = Instant::now();
        topic.publish(Bytes::from_static(b"one")).get().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(t.published("k").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn count_threshold_flushes_early() {
        let t = MockTransport::new();
        let settings = PublishSettings {
            delay_threshold: Duration::from_secs(60),
            count_threshold: 3,
        };
        let topic = topic_on(&t, "k", settings).await;

        let start = Instant::now();
        let results: Vec<_> = (0..3u8).map(|i| topic.publish(Bytes::from(vec![i]))).collect();
        for r in results {
            r.get().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(
            t.published("k").await,
            vec![Bytes::from(vec![0]), Bytes::from(vec![1]), Bytes::from(vec![2])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_publish_is_never_sent() {
        let t = MockTransport::new();
        let settings = PublishSettings {
            delay_threshold: Duration::from_secs(1),
            count_threshold: 100,
        };
        let topic = topic_on(&t, "k", settings).await;

        drop(topic.publish(Bytes::from_static(b"stale")));
        topic.publish(Bytes::from_static(b"fresh")).get().await.unwrap();
        assert_eq!(t.published("k").await, vec![Bytes::from_static(b"fresh")]);
    }

    #[tokio::test]
    async fn publish_error_reaches_caller() {
        let t = MockTransport::new();
        let topic = topic_on(&t, "k", PublishSettings::default()).await;
        t.set_fail_publish(true);
        let res = topic.publish(Bytes::from_static(b"x")).get().await;
        assert!(matches!(res, Err(TransportError::Publish(_))));
    }
}
