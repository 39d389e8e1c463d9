//! Broker connection management.
//!
//! A service owns exactly one MQTT connection, identified at the broker by
//! the service's logical name. The connection is established once at
//! construction and released once at shutdown. Inbound publishes are
//! forwarded as a stream of [`InboundMessage`] values to the dispatch loop.

use crate::config::BrokerConfig;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delivery guarantee requested from the broker for a publish or subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryGuarantee {
    /// Fire and forget
    AtMostOnce,
    /// Acknowledged, may duplicate
    AtLeastOnce,
    /// Four-way handshake, no duplicates
    ExactlyOnce,
}

impl DeliveryGuarantee {
    pub(crate) fn qos(self) -> QoS {
        match self {
            Self::AtMostOnce => QoS::AtMostOnce,
            Self::AtLeastOnce => QoS::AtLeastOnce,
            Self::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// An inbound `(topic, bytes)` event delivered by the broker
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was published under
    pub topic: String,
    /// Raw message payload
    pub payload: Vec<u8>,
}

/// Seam between the service core and the broker client.
///
/// Production services run over [`MqttLink`]; tests and custom transports
/// supply their own implementation via [`Service::with_link`].
///
/// [`Service::with_link`]: crate::service::Service::with_link
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Send bytes to the broker under the given topic.
    ///
    /// Retained messages are redelivered by the broker to new subscribers
    /// immediately on subscribe. Fails with [`ServiceError::Publish`] once
    /// the connection is gone.
    async fn publish_raw(
        &self,
        topic: &str,
        payload: Vec<u8>,
        guarantee: DeliveryGuarantee,
        retain: bool,
    ) -> Result<()>;

    /// Register interest in a topic at the broker.
    ///
    /// Fails with [`ServiceError::Subscribe`] once the connection is gone.
    async fn subscribe_raw(&self, topic: &str, guarantee: DeliveryGuarantee) -> Result<()>;

    /// Release the broker connection.
    async fn disconnect(&self) -> Result<()>;
}

/// The single MQTT connection a service owns
pub struct MqttLink {
    client: AsyncClient,
}

impl MqttLink {
    /// Connect to the configured broker under the given client identifier.
    ///
    /// Blocks until the broker acknowledges the session, so a failure here
    /// is observed before any handler registration happens. Returns the
    /// link together with the receiving end of the inbound message stream.
    pub async fn connect(
        config: &BrokerConfig,
        client_id: &str,
    ) -> Result<(Self, mpsc::Receiver<InboundMessage>)> {
        let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, mut event_loop) = AsyncClient::new(options, config.channel_capacity);
        wait_for_connack(&mut event_loop).await?;
        info!(client_id, host = %config.host, port = config.port, "connected to broker");

        let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity);
        tokio::spawn(drive_event_loop(event_loop, inbound_tx));

        Ok((Self { client }, inbound_rx))
    }
}

#[async_trait]
impl BrokerLink for MqttLink {
    async fn publish_raw(
        &self,
        topic: &str,
        payload: Vec<u8>,
        guarantee: DeliveryGuarantee,
        retain: bool,
    ) -> Result<()> {
        self.client
            .publish(topic, guarantee.qos(), retain, payload)
            .await
            .map_err(|e| ServiceError::publish(e.to_string()))
    }

    async fn subscribe_raw(&self, topic: &str, guarantee: DeliveryGuarantee) -> Result<()> {
        self.client
            .subscribe(topic, guarantee.qos())
            .await
            .map_err(|e| ServiceError::subscribe(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ServiceError::connection(e.to_string()))
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<()> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(ServiceError::connection(format!(
                    "broker refused connection: {:?}",
                    ack.code
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(ServiceError::connection(e.to_string())),
        }
    }
}

/// Drive the MQTT event loop, forwarding inbound publishes to the dispatch
/// loop. Runs until the connection ends or the receiving side is dropped.
async fn drive_event_loop(mut event_loop: EventLoop, inbound_tx: mpsc::Sender<InboundMessage>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if inbound_tx.send(message).await.is_err() {
                    debug!("dispatch loop dropped, stopping event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                info!("broker closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                // A client-requested disconnect also surfaces here.
                warn!(error = %e, "connection event loop ended");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_guarantee_maps_to_qos() {
        assert_eq!(DeliveryGuarantee::AtMostOnce.qos(), QoS::AtMostOnce);
        assert_eq!(DeliveryGuarantee::AtLeastOnce.qos(), QoS::AtLeastOnce);
        assert_eq!(DeliveryGuarantee::ExactlyOnce.qos(), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_connect_fails_on_unreachable_broker() {
        let config = BrokerConfig {
            host: "127.0.0.1".to_owned(),
            // Reserved port, nothing listens here.
            port: 1,
            keep_alive_secs: 5,
            channel_capacity: 8,
        };

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            MqttLink::connect(&config, "link-test"),
        )
        .await
        .expect("connect attempt should fail promptly");

        assert!(matches!(result, Err(ServiceError::Connection(_))));
    }
}
