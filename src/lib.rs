//! mqfwd - Datagram to MQTT forwarding bridge
//!
//! Bridges a datagram transport (UDP or Unix datagram socket) and an MQTT
//! publish/subscribe channel: packets received on the bound socket are
//! published to a configured topic, and messages arriving on a subscribed
//! topic are written as datagrams to a configured destination.

pub mod bridge;
pub mod config;
pub mod mqtt;
pub mod transport;

pub use bridge::ForwardingBridge;
pub use config::{Config, ConfigError};
pub use mqtt::{qos_level, InboundHandler, MqttClient, MqttError, MqttPublisher, MqttStatus};
pub use transport::{DatagramListener, DatagramSender, Endpoint, TransportError};
