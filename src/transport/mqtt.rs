//! MQTT adapter (feature `transport-mqtt`), using rumqttc (async).
//!
//! MQTT topics are implicit: a topic "exists" as soon as the broker accepts
//! a connection, and creating one is a no-op. The existence check therefore
//! doubles as a connectivity probe.
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;

use crate::transport::{ConnectOptions, Publisher, Transport, TransportError};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MqttTransport {
    host: String,
    port: u16,
    keep_alive: Duration,
    qos: QoS,
    client_prefix: String,
}

pub async fn connect(opts: ConnectOptions) -> Result<Box<dyn Transport>, TransportError> {
    let host = opts.get("host").unwrap_or("127.0.0.1").to_string();
    let port: u16 = match opts.get("port") {
        Some(p) => p
            .parse()
            .map_err(|_| TransportError::Connect(format!("invalid port: {p}")))?,
        None => 1883,
    };
    let qos = match opts.get("qos").unwrap_or("0") {
        "0" => QoS::AtMostOnce,
        "1" => QoS::AtLeastOnce,
        "2" => QoS::ExactlyOnce,
        other => return Err(TransportError::Connect(format!("invalid qos: {other}"))),
    };
    // The project id namespaces client ids on a shared broker.
    let client_prefix = opts.get("project").unwrap_or("mqf").to_string();
    Ok(Box::new(MqttTransport {
        host,
        port,
        keep_alive: Duration::from_secs(30),
        qos,
        client_prefix,
    }))
}

impl MqttTransport {
    fn options(&self, role: &str) -> MqttOptions {
        let id = format!("{}-{}-{}", self.client_prefix, role, uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(id, self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options
    }

    async fn probe(&self) -> Result<(), TransportError> {
        let (client, mut eventloop) = AsyncClient::new(self.options("probe"), 10);
        let wait_ack = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }
        };
        let res = tokio::time::timeout(PROBE_TIMEOUT, wait_ack)
            .await
            .map_err(|_| TransportError::Timeout)?;
        let _ = client.disconnect().await;
        res
    }
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    async fn topic_exists(&self, _topic: &str) -> Result<bool, TransportError> {
        self.probe().await?;
        Ok(true)
    }

    async fn create_topic(&self, _topic: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn create_publisher(&self, topic: &str) -> Result<Box<dyn Publisher>, TransportError> {
        // Dedicated client + background poller for publisher
        let (client, mut eventloop) = AsyncClient::new(self.options("pub"), 100);
        let poller = tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    tracing::warn!(error = %e, "mqtt publisher connection error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        Ok(Box::new(MqttPublisher {
            client,
            topic: topic.to_string(),
            qos: self.qos,
            poller,
        }))
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.probe().await
    }
}

struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    poller: JoinHandle<()>,
}

#[async_trait::async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(&self.topic, self.qos, false, payload.to_vec())
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        let _ = self.client.disconnect().await;
        self.poller.abort();
        Ok(())
    }
}
