//! Forwarding Bridge
//!
//! The translation core: datagram payloads become MQTT publishes on the
//! configured topic, and messages delivered on the subscribed topic become
//! datagram writes to the configured destination. Pure policy - the bridge
//! owns no sockets and no tasks; the listener loop and the MQTT event loop
//! each call into it from their own task.
//!
//! Both directions are best-effort: a failed publish or write is logged and
//! the next event is served. Delivery results for publishes arrive
//! asynchronously in the MQTT event loop and are only logged there.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use rumqttc::QoS;
use tracing::{error, info};

use crate::config::Config;
use crate::mqtt::{qos_level, InboundHandler, MqttError, MqttPublisher};
use crate::transport::DatagramSender;


/// Bidirectional datagram/MQTT translation core.
pub struct ForwardingBridge {
    publisher: Arc<dyn MqttPublisher>,
    sender: DatagramSender,
    pub_topic: String,
    pub_qos: QoS,
    send_to: String,
    log_data: bool,
}

impl ForwardingBridge {
    /// Compose the bridge from validated configuration and its collaborators.
    pub fn new(
        config: &Config,
        publisher: Arc<dyn MqttPublisher>,
        sender: DatagramSender,
    ) -> Result<Self, MqttError> {
        Ok(Self {
            publisher,
            sender,
            pub_topic: config.mqtt.publish.topic.clone(),
            pub_qos: qos_level(config.mqtt.publish.qos)?,
            send_to: config.send_to.clone(),
            log_data: config.log_data,
        })
    }

    /// Forward one datagram payload to the publish topic.
    ///
    /// The payload is already an independent copy of the listener's receive
    /// buffer. Empty payloads are ignored. Fire-and-forget: a queueing
    /// failure is logged and the packet dropped.
    pub async fn on_packet(&self, payload: Bytes) {
        if payload.is_empty() {
            return;
        }

        if self.log_data {
            info!(
                "publishing data to topic [{}]: {}",
                self.pub_topic,
                BASE64.encode(&payload)
            );
        }

        if let Err(e) = self
            .publisher
            .publish(&self.pub_topic, self.pub_qos, payload)
            .await
        {
            error!("failed to publish message to topic [{}]: {}", self.pub_topic, e);
        }
    }
}

#[async_trait]
impl InboundHandler for ForwardingBridge {
    /// Forward one subscribed message to the send_to destination.
    ///
    /// Topic routing is the capability's responsibility; the bridge trusts
    /// the dispatch. Each message is an independent, best-effort delivery.
    async fn on_message(&self, _topic: &str, payload: Bytes) {
        if self.log_data {
            info!(
                "sending data to send_to [{}]: {}",
                self.send_to,
                BASE64.encode(&payload)
            );
        }

        if let Err(e) = self.sender.write(&payload).await {
            error!("failed to send message to send_to [{}]: {}", self.send_to, e);
        }
    }
}
