//! MQTT Client Capability
//!
//! The protocol engine itself (handshake, keepalive, wire encoding) is the
//! `rumqttc` crate; this module owns the narrow seam the bridge talks
//! through: the QoS mapping, the publish trait, the inbound-message
//! handler trait, and the client wrapper that drives the event loop.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;

mod client;

pub use client::MqttClient;

/// Error type for MQTT capability operations
#[derive(Debug)]
pub enum MqttError {
    /// Configured QoS integer outside 0..=2
    InvalidQos(u8),
    /// Broker address or TLS material could not be turned into client options
    Options(String),
    /// Client request could not be queued
    Client(String),
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttError::InvalidQos(qos) => write!(f, "invalid qos level: {}", qos),
            MqttError::Options(msg) => write!(f, "invalid mqtt options: {}", msg),
            MqttError::Client(msg) => write!(f, "mqtt client error: {}", msg),
        }
    }
}

impl std::error::Error for MqttError {}

/// Connection status of the MQTT client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttStatus {
    /// Not connected
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and operational
    Connected,
    /// Connection failed, backing off before retry
    Backoff,
}

/// Map a configured QoS integer to a protocol level.
///
/// Rejecting anything outside 0..=2 happens at startup; an invalid level is
/// never discovered mid-operation.
pub fn qos_level(qos: u8) -> Result<QoS, MqttError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Publish seam the forwarding bridge depends on.
///
/// Publishing is fire-and-forget from the caller's perspective: an `Ok`
/// means the request was queued, and delivery results surface as events in
/// the client's own loop where they are only logged.
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish(&self, topic: &str, qos: QoS, payload: Bytes) -> Result<(), MqttError>;
}

/// Handler for messages delivered on the subscribed topic.
///
/// Invoked only from the client's event-loop task, so deliveries arrive
/// serialized in delivery order.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn on_message(&self, topic: &str, payload: Bytes);
}
