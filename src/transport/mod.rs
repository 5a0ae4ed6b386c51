//! Transport abstraction: trait, types, and builder factory.

pub mod config;
#[cfg(any(test, feature = "transport-mock"))]
pub mod mock;
#[cfg(feature = "transport-mqtt")]
pub mod mqtt;

use std::collections::BTreeMap;

use bytes::Bytes;

#[derive(Clone, Debug, PartialEq)]
pub enum Engine {
    Mqtt,
    #[cfg(any(test, feature = "transport-mock"))]
    Mock,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    pub params: BTreeMap<String, String>,
}

impl ConnectOptions {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("publish: {0}")]
    Publish(String),
    #[error("topic: {0}")]
    Topic(String),
    #[error("timeout")]
    Timeout,
    #[error("disconnected")]
    Disconnected,
}

/// Broker connection: topic administration plus publisher factory.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn topic_exists(&self, topic: &str) -> Result<bool, TransportError>;
    async fn create_topic(&self, topic: &str) -> Result<(), TransportError>;
    // Pre-declare publisher for high-throughput publish on the same topic.
    async fn create_publisher(&self, topic: &str) -> Result<Box<dyn Publisher>, TransportError>;
    async fn shutdown(&self) -> Result<(), TransportError>;
    async fn health_check(&self) -> Result<(), TransportError>;
}

/// Must tolerate concurrent `publish` calls.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: Bytes) -> Result<(), TransportError>;
    async fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct TransportBuilder;

impl TransportBuilder {
    pub async fn connect(
        engine: Engine,
        opts: ConnectOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match engine {
            Engine::Mqtt => {
                #[cfg(feature = "transport-mqtt")]
                {
                    crate::transport::mqtt::connect(opts).await
                }
                #[cfg(not(feature = "transport-mqtt"))]
                {
                    let _ = opts;
                    Err(TransportError::Connect("mqtt feature disabled".into()))
                }
            }
            #[cfg(any(test, feature = "transport-mock"))]
            Engine::Mock => crate::transport::mock::connect(opts).await,
        }
    }
}
