//! MQTT Client Configuration
//!
//! Configuration structures for the connection to the remote broker.

use serde::Deserialize;

/// MQTT client configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker address (`tcp://host:port` or `ssl://host:port`)
    pub broker: String,

    /// TLS material (enables TLS regardless of broker scheme)
    pub tls: Option<TlsConfig>,

    /// Parameters for the CONNECT packet sent to the broker
    pub connect_packet: Option<ConnectPacketConfig>,

    /// Topic to subscribe; matching messages are written to `send_to`
    pub sub: TopicConfig,

    /// Topic to publish packets received on the listen socket
    #[serde(rename = "pub")]
    pub publish: TopicConfig,
}

/// A topic plus its QoS level
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic name
    pub topic: String,
    /// QoS level (0, 1, or 2)
    pub qos: u8,
}

/// TLS configuration for the broker connection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Path to CA certificate file (PEM format)
    pub ca_file: Option<String>,

    /// Path to client certificate file (PEM format)
    pub cert_file: Option<String>,

    /// Path to client private key file (PEM format)
    pub key_file: Option<String>,
}

/// Optional CONNECT packet parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectPacketConfig {
    /// Username for authentication (empty disables credentials)
    pub username: String,

    /// Password for authentication
    pub password: String,

    /// Client ID (empty generates `mqfwd-<pid>`)
    pub client_id: String,

    /// Use clean session (no session persistence on the broker)
    pub clean_session: bool,

    /// Keep-alive interval in seconds
    pub keepalive: u16,
}

fn default_keepalive() -> u16 {
    60
}

impl Default for ConnectPacketConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            clean_session: true,
            keepalive: default_keepalive(),
        }
    }
}
