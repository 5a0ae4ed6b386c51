//! In-memory transport (feature `transport-mock`). Records every published
//! payload per topic so tests and dry runs can inspect traffic.
//!
//! Connect options:
//! - `topics`: comma-separated topics that already exist
//! - `publish_latency_ms`: artificial delay before each publish completes
//! - `fail_publish`: `true` to reject every publish
//! - `fail_admin`: `true` to fail existence checks and topic creation

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::transport::{ConnectOptions, Publisher, Transport, TransportError};

type TopicLog = Arc<Mutex<Vec<Bytes>>>;

#[derive(Default)]
pub struct MockTransport {
    topics: Mutex<HashMap<String, TopicLog>>,
    publish_latency: Duration,
    fail_publish: Arc<AtomicBool>,
    fail_admin: AtomicBool,
}

pub async fn connect(opts: ConnectOptions) -> Result<Box<dyn Transport>, TransportError> {
    let mut transport = MockTransport::new();
    if let Some(ms) = opts.get("publish_latency_ms") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| TransportError::Connect(format!("invalid publish_latency_ms: {ms}")))?;
        transport = transport.with_publish_latency(Duration::from_millis(ms));
    }
    if let Some(list) = opts.get("topics") {
        for t in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            transport.create_topic(t).await?;
        }
    }
    transport.set_fail_publish(opts.get("fail_publish") == Some("true"));
    transport.set_fail_admin(opts.get("fail_admin") == Some("true"));
    Ok(Box::new(transport))
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publish_latency(mut self, latency: Duration) -> Self {
        self.publish_latency = latency;
        self
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_admin(&self, fail: bool) {
        self.fail_admin.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of everything published to `topic` so far.
    pub async fn published(&self, topic: &str) -> Vec<Bytes> {
        let log = self.topics.lock().await.get(topic).cloned();
        match log {
            Some(log) => log.lock().await.clone(),
            None => Vec::new(),
        }
    }

    fn check_admin(&self) -> Result<(), TransportError> {
        if self.fail_admin.load(Ordering::SeqCst) {
            return Err(TransportError::Topic("mock admin failure".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn topic_exists(&self, topic: &str) -> Result<bool, TransportError> {
        self.check_admin()?;
        Ok(self.topics.lock().await.contains_key(topic))
    }

    async fn create_topic(&self, topic: &str) -> Result<(), TransportError> {
        self.check_admin()?;
        let mut topics = self.topics.lock().await;
        if topics.contains_key(topic) {
            return Err(TransportError::Topic(format!("{topic} already exists")));
        }
        topics.insert(topic.to_string(), TopicLog::default());
        Ok(())
    }

    async fn create_publisher(&self, topic: &str) -> Result<Box<dyn Publisher>, TransportError> {
        let log = self
            .topics
            .lock()
            .await
            .get(topic)
            .cloned()
            .ok_or_else(|| TransportError::Topic(format!("{topic} does not exist")))?;
        Ok(Box::new(MockPublisher {
            log,
            latency: self.publish_latency,
            fail: self.fail_publish.clone(),
        }))
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.check_admin()
    }
}

struct MockPublisher {
    log: TopicLog,
    latency: Duration,
    fail: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("mock publish rejected".into()));
        }
        self.log.lock().await.push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_publish_records() {
        let t = MockTransport::new();
        assert!(!t.topic_exists("k1").await.unwrap());
        t.create_topic("k1").await.unwrap();
        assert!(t.topic_exists("k1").await.unwrap());

        let p = t.create_publisher("k1").await.unwrap();
        p.publish(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(t.published("k1").await, vec![Bytes::from_static(b"hello")]);
        assert!(t.published("other").await.is_empty());
    }

    #[tokio::test]
    async fn publisher_for_missing_topic_fails() {
        let t = MockTransport::new();
        assert!(matches!(
            t.create_publisher("nope").await,
            Err(TransportError::Topic(_))
        ));
    }

    #[tokio::test]
    async fn failure_switches() {
        let t = MockTransport::new();
        t.create_topic("k").await.unwrap();
        let p = t.create_publisher("k").await.unwrap();
        t.set_fail_publish(true);
        assert!(p.publish(Bytes::new()).await.is_err());
        t.set_fail_admin(true);
        assert!(t.topic_exists("k").await.is_err());
    }

    #[tokio::test]
    async fn connect_options_preseed_topics() {
        let mut opts = ConnectOptions::default();
        opts.params.insert("topics".into(), "a, b".into());
        let t = connect(opts).await.unwrap();
        assert!(t.topic_exists("a").await.unwrap());
        assert!(t.topic_exists("b").await.unwrap());
        assert!(!t.topic_exists("c").await.unwrap());
    }
}
